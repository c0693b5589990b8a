use crate::{
    connection::{ConnectionLifecycle, Teardown},
    dispatcher::CommandDispatcher,
    error::{ArmError, TransportError},
    joints::JointModel,
    observer::{Event, Observer, Observers},
    sequence::{Preset, SequenceRunner},
    transport::TransportPort,
    types::{CommandToken, ConnectionState, JointState, SequenceState, Severity},
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// One control session with one arm.
///
/// Owns the joint model, the connection state machine, the dispatcher and the sequence runner.
/// UI code holds an `Arc<Controller<_>>`, subscribes observers, and calls the action methods;
/// it never mutates state directly.
pub struct Controller<T> {
    joints: Arc<Mutex<JointModel>>,
    connection: Arc<ConnectionLifecycle<T>>,
    dispatcher: Arc<CommandDispatcher<T>>,
    sequences: SequenceRunner<T>,
    observers: Arc<Observers>,
}

impl<T: TransportPort> Controller<T> {
    pub fn new() -> Arc<Self> {
        let joints = Arc::new(Mutex::new(JointModel::new()));
        let connection = Arc::new(ConnectionLifecycle::new());
        let observers = Arc::new(Observers::new());
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&connection),
            Arc::clone(&joints),
            Arc::clone(&observers),
        ));
        let sequences = SequenceRunner::new(
            Arc::clone(&dispatcher),
            Arc::clone(&joints),
            Arc::clone(&observers),
        );

        Arc::new(Controller {
            joints,
            connection,
            dispatcher,
            sequences,
            observers,
        })
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.observers.subscribe(observer);
    }

    pub fn joints(&self) -> JointState {
        self.joints.lock().snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn running_sequence(&self) -> Option<Preset> {
        self.sequences.running()
    }

    /// Connects using `handshake`, which performs discovery and pairing and yields a live
    /// transport.
    pub async fn connect<F>(self: &Arc<Self>, handshake: F) -> Result<(), ArmError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let epoch = self.connection.begin_connecting().inspect_err(|e| {
            self.observers.log(e.to_string(), Severity::Warning);
        })?;
        self.observers.emit(Event::ConnectionChanged(ConnectionState::Connecting));
        self.observers.log("Connecting...", Severity::Info);

        let transport = match handshake.await {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                self.observers.log(format!("Connection failed: {e}"), Severity::Error);
                self.teardown();
                return Err(e.into());
            }
        };

        // Fires immediately if the link is already gone, which abandons this attempt below.
        let session = Arc::downgrade(self);
        transport.on_disconnected(Box::new(move || {
            if let Some(controller) = session.upgrade() {
                controller.connection_lost(epoch);
            }
        }));

        if let Err(transport) = self.connection.established(epoch, Arc::clone(&transport)) {
            self.observers.log("Connection abandoned", Severity::Warning);
            if let Err(e) = transport.close().await {
                self.observers.log(format!("Failed to close link: {e}"), Severity::Warning);
            }
            return Err(ArmError::NotConnected);
        }

        self.observers.emit(Event::ConnectionChanged(ConnectionState::Connected));
        self.observers.log("Connected", Severity::Success);
        Ok(())
    }

    /// User-initiated disconnect. Safe to call in any state.
    pub async fn disconnect(&self) {
        if let Teardown::Closed(Some(transport)) = self.teardown() {
            if let Err(e) = transport.close().await {
                self.observers.log(format!("Failed to close link: {e}"), Severity::Warning);
            }
        }
    }

    pub async fn dispatch(&self, token: CommandToken) -> Result<(), ArmError> {
        self.dispatcher.dispatch(token).await
    }

    /// Dispatches raw keyboard input; anything outside the token alphabet is rejected.
    pub async fn dispatch_key(&self, key: char) -> Result<(), ArmError> {
        self.dispatcher.dispatch_char(key).await
    }

    pub async fn run(&self, preset: Preset) -> Result<SequenceState, ArmError> {
        self.sequences.run(preset).await
    }

    pub fn cancel_sequence(&self) -> bool {
        let cancelled = self.sequences.cancel();
        if !cancelled {
            self.observers.log("No sequence is running", Severity::Warning);
        }
        cancelled
    }

    /// Puts the joint model back at the initial pose without moving the arm.
    pub fn reset(&self) {
        self.joints.lock().reset();
        self.publish_joints();
    }

    fn connection_lost(&self, epoch: u64) {
        if self.connection.lost(epoch).is_closed() {
            self.observers.log("Connection lost", Severity::Error);
            self.after_disconnect();
        }
    }

    fn teardown(&self) -> Teardown<T> {
        let previous = self.connection.disconnected();
        if previous.is_closed() {
            self.after_disconnect();
        }
        previous
    }

    fn after_disconnect(&self) {
        if self.sequences.cancel() {
            self.observers.log("Sequence cancelled by disconnect", Severity::Warning);
        }
        self.joints.lock().reset();
        self.publish_joints();
        self.observers.emit(Event::ConnectionChanged(ConnectionState::Disconnected));
        self.observers.log("Disconnected", Severity::Info);
    }

    fn publish_joints(&self) {
        let state = self.joints();
        for (joint, angle) in state.iter() {
            self.observers.emit(Event::JointChanged { joint, angle });
        }
    }
}
