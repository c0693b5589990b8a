//! In-memory stand-in for the arm.
//!
//! Records every token it receives, counts overlapping sends, and can be told to reject
//! writes or to drop the link. Handles are cheap clones sharing one device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Duration;

use crate::error::TransportError;
use crate::transport::{DisconnectListener, LinkState, TransportPort};
use crate::types::CommandToken;

struct SimulatedArm {
    link: LinkState,
    latency: Duration,
    sent: Mutex<Vec<CommandToken>>,
    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    fail_next: AtomicUsize,
    ack_after_loss: AtomicBool,
}

#[derive(Clone)]
pub struct SimulatedTransport {
    arm: Arc<SimulatedArm>,
}

impl SimulatedTransport {
    /// A connected simulator whose writes take `latency` to acknowledge.
    pub fn new(latency: Duration) -> Self {
        SimulatedTransport {
            arm: Arc::new(SimulatedArm {
                link: LinkState::new(),
                latency,
                sent: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                overlaps: AtomicUsize::new(0),
                fail_next: AtomicUsize::new(0),
                ack_after_loss: AtomicBool::new(false),
            }),
        }
    }

    /// Tokens the arm has accepted, in arrival order.
    pub fn sent(&self) -> Vec<CommandToken> {
        self.arm.sent.lock().clone()
    }

    /// Number of sends that started while another was still outstanding.
    pub fn overlaps(&self) -> usize {
        self.arm.overlaps.load(Ordering::SeqCst)
    }

    /// Rejects the next `count` writes.
    pub fn fail_next(&self, count: usize) {
        self.arm.fail_next.store(count, Ordering::SeqCst);
    }

    /// Acknowledges writes that were already in flight when the link dropped.
    pub fn ack_after_loss(&self, on: bool) {
        self.arm.ack_after_loss.store(on, Ordering::SeqCst);
    }

    /// Simulates the arm going out of range.
    pub fn drop_link(&self) {
        log::debug!("Simulated link dropped");
        self.arm.link.lost();
    }
}

impl TransportPort for SimulatedTransport {
    async fn send(&self, token: CommandToken) -> Result<(), TransportError> {
        if !self.arm.link.is_connected() {
            return Err(TransportError::Disconnected);
        }

        if self.arm.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.arm.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.arm.latency.is_zero() {
            tokio::time::sleep(self.arm.latency).await;
        }
        self.arm.in_flight.fetch_sub(1, Ordering::SeqCst);

        let rejected = self
            .arm
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(TransportError::WriteRejected(format!("simulated failure on {token}")));
        }
        if !self.arm.link.is_connected() && !self.arm.ack_after_loss.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }

        self.arm.sent.lock().push(token);
        Ok(())
    }

    fn on_disconnected(&self, listener: DisconnectListener) {
        self.arm.link.register(listener);
    }

    fn is_connected(&self) -> bool {
        self.arm.link.is_connected()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.arm.link.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn records_tokens_in_order() {
        let sim = SimulatedTransport::new(Duration::from_millis(5));
        sim.send(CommandToken::A).await.unwrap();
        sim.send(CommandToken::J).await.unwrap();
        assert_eq!(sim.sent(), vec![CommandToken::A, CommandToken::J]);
        assert_eq!(sim.overlaps(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_overlapping_sends() {
        let sim = SimulatedTransport::new(Duration::from_millis(5));
        let (a, b) = tokio::join!(sim.send(CommandToken::A), sim.send(CommandToken::B));
        a.unwrap();
        b.unwrap();
        assert_eq!(sim.overlaps(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_not_recorded() {
        let sim = SimulatedTransport::new(Duration::ZERO);
        sim.fail_next(1);
        assert!(matches!(
            sim.send(CommandToken::C).await,
            Err(TransportError::WriteRejected(_))
        ));
        sim.send(CommandToken::D).await.unwrap();
        assert_eq!(sim.sent(), vec![CommandToken::D]);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_write_can_be_acked_after_loss() {
        let sim = SimulatedTransport::new(Duration::from_millis(20));
        sim.ack_after_loss(true);
        let write = tokio::spawn({
            let sim = sim.clone();
            async move { sim.send(CommandToken::E).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        sim.drop_link();
        write.await.unwrap().unwrap();
        assert_eq!(sim.sent(), vec![CommandToken::E]);
        assert!(matches!(
            sim.send(CommandToken::F).await,
            Err(TransportError::Disconnected)
        ));
    }

    #[test]
    fn listener_fires_once_on_drop() {
        let sim = SimulatedTransport::new(Duration::ZERO);
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        sim.on_disconnected(Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        sim.drop_link();
        sim.drop_link();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!sim.is_connected());
    }

    #[test]
    fn late_listener_fires_immediately() {
        let sim = SimulatedTransport::new(Duration::ZERO);
        sim.drop_link();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        sim.on_disconnected(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(fired.load(Ordering::SeqCst));
    }
}
