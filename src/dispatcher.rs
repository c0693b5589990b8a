use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::ConnectionLifecycle;
use crate::error::ArmError;
use crate::joints::JointModel;
use crate::observer::{Event, Observers};
use crate::translator::CommandTranslator;
use crate::transport::TransportPort;
use crate::types::{CommandToken, Severity};

/// Serializes commands onto the transport.
///
/// Concurrent callers are queued in submission order on a single write lane; a second send is
/// never started before the first has resolved. The joint model is updated only after the
/// transport accepts the write.
pub struct CommandDispatcher<T> {
    lane: tokio::sync::Mutex<()>,
    connection: Arc<ConnectionLifecycle<T>>,
    joints: Arc<Mutex<JointModel>>,
    observers: Arc<Observers>,
}

impl<T: TransportPort> CommandDispatcher<T> {
    pub fn new(
        connection: Arc<ConnectionLifecycle<T>>,
        joints: Arc<Mutex<JointModel>>,
        observers: Arc<Observers>,
    ) -> Self {
        CommandDispatcher {
            lane: tokio::sync::Mutex::new(()),
            connection,
            joints,
            observers,
        }
    }

    /// Resolves raw input (a key press, say) and dispatches it.
    pub async fn dispatch_char(&self, c: char) -> Result<(), ArmError> {
        let (token, _) = CommandTranslator::resolve(c).inspect_err(|e| {
            self.observers.log(e.to_string(), Severity::Warning);
        })?;
        self.dispatch(token).await
    }

    pub async fn dispatch(&self, token: CommandToken) -> Result<(), ArmError> {
        // Fail fast without queueing when there is no link.
        if let Err(e) = self.connection.link() {
            self.observers.log(format!("Cannot send {token}: {e}"), Severity::Error);
            return Err(e);
        }

        let _lane = self.lane.lock().await;

        // The link may have gone while we were queued.
        let (transport, epoch) = self.connection.link().inspect_err(|e| {
            self.observers.log(format!("Cannot send {token}: {e}"), Severity::Error);
        })?;

        if let Err(e) = transport.send(token).await {
            self.observers.log(format!("Failed to send {token}: {e}"), Severity::Error);
            return Err(e.into());
        }

        let joint = token.motion().joint;
        let angle = {
            // A disconnect bumps the epoch before it takes this lock to reset.
            let mut joints = self.joints.lock();
            if self.connection.epoch() != epoch {
                None
            } else {
                Some(joints.apply(token))
            }
        };
        let Some(angle) = angle else {
            self.observers.log(
                format!("Link dropped while sending {token}, joint state was reset"),
                Severity::Warning,
            );
            return Ok(());
        };

        log::debug!("Sent {token}, {joint} -> {angle}");
        self.observers.emit(Event::JointChanged { joint, angle });
        Ok(())
    }
}
