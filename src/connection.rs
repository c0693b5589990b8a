use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ArmError;
use crate::transport::TransportPort;
use crate::types::ConnectionState;

struct Inner<T> {
    state: ConnectionState,
    // Bumped on every connect attempt and every disconnect, so stale callbacks can be ignored.
    epoch: u64,
    transport: Option<Arc<T>>,
}

/// Outcome of moving to Disconnected.
pub enum Teardown<T> {
    /// Already disconnected; nothing to undo.
    Unchanged,
    /// Left Connecting or Connected. Carries the transport if one was live.
    Closed(Option<Arc<T>>),
}

impl<T> Teardown<T> {
    pub fn is_closed(&self) -> bool {
        matches!(self, Teardown::Closed(_))
    }
}

/// Owns the connection state machine and the live transport.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`. The controller layers the side
/// effects of a disconnect (cancel, reset, notify) on top of [`ConnectionLifecycle::disconnected`].
pub struct ConnectionLifecycle<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: TransportPort> ConnectionLifecycle<T> {
    pub fn new() -> Self {
        ConnectionLifecycle {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                epoch: 0,
                transport: None,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Disconnected -> Connecting. Returns the epoch of the new attempt.
    pub fn begin_connecting(&self) -> Result<u64, ArmError> {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Disconnected {
            return Err(ArmError::AlreadyConnected(inner.state));
        }
        inner.state = ConnectionState::Connecting;
        inner.epoch += 1;
        Ok(inner.epoch)
    }

    /// Connecting -> Connected, provided the attempt `epoch` was not abandoned meanwhile.
    /// Hands the transport back if it was.
    pub fn established(&self, epoch: u64, transport: Arc<T>) -> Result<(), Arc<T>> {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.state != ConnectionState::Connecting {
            return Err(transport);
        }
        inner.state = ConnectionState::Connected;
        inner.transport = Some(transport);
        Ok(())
    }

    /// Moves to Disconnected.
    pub fn disconnected(&self) -> Teardown<T> {
        Self::close(&mut self.inner.lock())
    }

    /// Like [`Self::disconnected`], but only if `epoch` is still current.
    pub fn lost(&self, epoch: u64) -> Teardown<T> {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return Teardown::Unchanged;
        }
        Self::close(&mut inner)
    }

    fn close(inner: &mut Inner<T>) -> Teardown<T> {
        if inner.state == ConnectionState::Disconnected {
            return Teardown::Unchanged;
        }
        inner.state = ConnectionState::Disconnected;
        inner.epoch += 1;
        Teardown::Closed(inner.transport.take())
    }

    /// The live transport and its epoch, or `NotConnected`.
    pub fn link(&self) -> Result<(Arc<T>, u64), ArmError> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.transport) {
            (ConnectionState::Connected, Some(transport)) => Ok((Arc::clone(transport), inner.epoch)),
            _ => Err(ArmError::NotConnected),
        }
    }
}

impl<T: TransportPort> Default for ConnectionLifecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedTransport;
    use tokio::time::Duration;

    fn sim() -> Arc<SimulatedTransport> {
        Arc::new(SimulatedTransport::new(Duration::ZERO))
    }

    #[test]
    fn full_cycle() {
        let lifecycle = ConnectionLifecycle::new();
        assert!(matches!(lifecycle.link(), Err(ArmError::NotConnected)));

        let epoch = lifecycle.begin_connecting().unwrap();
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
        assert!(lifecycle.link().is_err());

        assert!(lifecycle.established(epoch, sim()).is_ok());
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
        assert!(lifecycle.link().is_ok());

        assert!(matches!(lifecycle.disconnected(), Teardown::Closed(Some(_))));
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert!(matches!(lifecycle.disconnected(), Teardown::Unchanged));
    }

    #[test]
    fn only_one_attempt_at_a_time() {
        let lifecycle = ConnectionLifecycle::<SimulatedTransport>::new();
        lifecycle.begin_connecting().unwrap();
        assert!(matches!(
            lifecycle.begin_connecting(),
            Err(ArmError::AlreadyConnected(ConnectionState::Connecting))
        ));
    }

    #[test]
    fn abandoned_attempt_returns_transport() {
        let lifecycle = ConnectionLifecycle::new();
        let epoch = lifecycle.begin_connecting().unwrap();
        assert!(matches!(lifecycle.disconnected(), Teardown::Closed(None)));
        assert!(lifecycle.established(epoch, sim()).is_err());
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn stale_loss_is_ignored() {
        let lifecycle = ConnectionLifecycle::new();
        let first = lifecycle.begin_connecting().unwrap();
        assert!(lifecycle.established(first, sim()).is_ok());
        lifecycle.disconnected();

        let second = lifecycle.begin_connecting().unwrap();
        assert!(lifecycle.established(second, sim()).is_ok());
        assert!(!lifecycle.lost(first).is_closed());
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
        assert!(lifecycle.lost(second).is_closed());
    }
}
