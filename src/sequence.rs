//! Named multi-step maneuvers.
//!
//! A run goes `Running -> {Completed, Cancelled, Failed}`. Only one preset may run at a time;
//! starting another while one is running is rejected with [`ArmError::Busy`]. Between
//! repetitions the runner sleeps on the tokio clock, and each sleep is a cancellation point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use strum_macros::{Display, EnumIter, EnumString};
use tokio::sync::watch;
use tokio::time::Duration;

use crate::dispatcher::CommandDispatcher;
use crate::error::ArmError;
use crate::joints::JointModel;
use crate::observer::{Event, Observers};
use crate::transport::TransportPort;
use crate::types::{CommandToken, Joint, SequenceState, Severity};
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Step {
    pub token: CommandToken,
    pub repeat: u32,
    pub delay: Duration,
}

const fn step(token: CommandToken, repeat: u32, delay_ms: u64) -> Step {
    Step {
        token,
        repeat,
        delay: Duration::from_millis(delay_ms),
    }
}

const HOME: &[Step] = &[
    step(CommandToken::D, 9, 150),
    step(CommandToken::F, 9, 150),
    step(CommandToken::H, 9, 150),
    step(CommandToken::J, 9, 150),
];

const GRAB: &[Step] = &[
    step(CommandToken::I, 3, 200),
    step(CommandToken::E, 4, 200),
    step(CommandToken::J, 6, 200),
    step(CommandToken::F, 4, 200),
];

const REACH: &[Step] = &[
    step(CommandToken::C, 5, 200),
    step(CommandToken::E, 5, 200),
    step(CommandToken::G, 3, 200),
];

#[derive(Debug, Display, EnumString, EnumIter, Clone, Copy, Eq, PartialEq, Hash)]
#[strum(ascii_case_insensitive)]
pub enum Preset {
    Home,
    Grab,
    Reach,
    /// Runs Home's steps under its own name.
    Reset,
}

impl Preset {
    pub fn steps(self) -> &'static [Step] {
        match self {
            Preset::Home | Preset::Reset => HOME,
            Preset::Grab => GRAB,
            Preset::Reach => REACH,
        }
    }

    /// Whether the joint model is snapped back to the initial pose after the last step.
    pub fn ends_at_home(self) -> bool {
        matches!(self, Preset::Home | Preset::Reset)
    }

    pub fn dispatch_count(self) -> u32 {
        self.steps().iter().map(|s| s.repeat).sum()
    }
}

struct Active {
    preset: Preset,
    id: u64,
    cancel: watch::Sender<bool>,
}

pub struct SequenceRunner<T> {
    dispatcher: Arc<CommandDispatcher<T>>,
    joints: Arc<Mutex<JointModel>>,
    observers: Arc<Observers>,
    active: Mutex<Option<Active>>,
    next_id: AtomicU64,
}

/// Clears the active slot when a run ends. If the run's future is dropped before it reached a
/// terminal state, observers are told it was cancelled.
struct RunGuard<'a> {
    active: &'a Mutex<Option<Active>>,
    observers: &'a Observers,
    preset: Preset,
    id: u64,
    finished: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        release(self.active, self.id);
        if !self.finished {
            let preset = self.preset;
            self.observers.log(format!("{preset} abandoned"), Severity::Warning);
            self.observers.emit(Event::SequenceChanged {
                preset,
                state: SequenceState::Cancelled,
            });
        }
    }
}

fn release(active: &Mutex<Option<Active>>, id: u64) {
    let mut active = active.lock();
    if active.as_ref().is_some_and(|a| a.id == id) {
        *active = None;
    }
}

impl<T: TransportPort> SequenceRunner<T> {
    pub fn new(
        dispatcher: Arc<CommandDispatcher<T>>,
        joints: Arc<Mutex<JointModel>>,
        observers: Arc<Observers>,
    ) -> Self {
        SequenceRunner {
            dispatcher,
            joints,
            observers,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn running(&self) -> Option<Preset> {
        self.active.lock().as_ref().map(|a| a.preset)
    }

    /// Asks the running sequence to stop at its next suspension point. Returns `false` if
    /// nothing was running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(active) => {
                active.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Runs `preset` to completion, cancellation or failure.
    ///
    /// Returns the terminal state, or the error that failed the run. Joint changes made by
    /// steps that were sent before a failure are kept.
    pub async fn run(&self, preset: Preset) -> Result<SequenceState, ArmError> {
        let (id, mut cancelled) = match self.claim(preset) {
            Ok(claimed) => claimed,
            Err(running) => {
                let e = ArmError::Busy(preset);
                self.observers.log(format!("{e} ({running})"), Severity::Warning);
                return Err(e);
            }
        };
        let mut guard = RunGuard {
            active: &self.active,
            observers: &self.observers,
            preset,
            id,
            finished: false,
        };

        self.transition(preset, SequenceState::Running);

        for step in preset.steps() {
            for _ in 0..step.repeat {
                if *cancelled.borrow() {
                    return Ok(self.finish(&mut guard, SequenceState::Cancelled));
                }
                if let Err(e) = self.dispatcher.dispatch(step.token).await {
                    self.observers.log(format!("{preset} failed: {e}"), Severity::Error);
                    self.finish(&mut guard, SequenceState::Failed);
                    return Err(e);
                }
                if *cancelled.borrow_and_update() {
                    return Ok(self.finish(&mut guard, SequenceState::Cancelled));
                }
                tokio::select! {
                    _ = tokio::time::sleep(step.delay) => {}
                    _ = cancelled.changed() => {}
                }
            }
        }

        if *cancelled.borrow() {
            return Ok(self.finish(&mut guard, SequenceState::Cancelled));
        }

        if preset.ends_at_home() {
            self.joints.lock().reset();
            for joint in Joint::iter() {
                self.observers.emit(Event::JointChanged {
                    joint,
                    angle: joint.initial(),
                });
            }
        }

        self.observers.log(format!("{preset} complete"), Severity::Success);
        Ok(self.finish(&mut guard, SequenceState::Completed))
    }

    /// Takes the single running slot, or reports who holds it.
    fn claim(&self, preset: Preset) -> Result<(u64, watch::Receiver<bool>), Preset> {
        let mut active = self.active.lock();
        if let Some(running) = active.as_ref() {
            return Err(running.preset);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(false);
        *active = Some(Active {
            preset,
            id,
            cancel: tx,
        });
        Ok((id, rx))
    }

    /// Frees the slot before announcing the terminal state, so observers may start another run.
    fn finish(&self, guard: &mut RunGuard<'_>, state: SequenceState) -> SequenceState {
        guard.finished = true;
        release(&self.active, guard.id);
        self.transition(guard.preset, state)
    }

    fn transition(&self, preset: Preset, state: SequenceState) -> SequenceState {
        log::debug!("{preset}: {state}");
        self.observers.emit(Event::SequenceChanged { preset, state });
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn presets_parse_by_name() {
        assert_eq!(Preset::from_str("grab").unwrap(), Preset::Grab);
        assert_eq!(Preset::from_str("Reach").unwrap(), Preset::Reach);
        assert_eq!(Preset::from_str("RESET").unwrap(), Preset::Reset);
        assert!(Preset::from_str("wave").is_err());
    }

    #[test]
    fn reset_is_home_under_another_name() {
        assert_eq!(Preset::Reset.steps(), Preset::Home.steps());
        assert!(Preset::Reset.ends_at_home());
        assert!(!Preset::Grab.ends_at_home());
        assert_eq!(Preset::Reset.to_string(), "Reset");
    }

    #[test]
    fn every_preset_moves_the_arm() {
        for preset in Preset::iter() {
            assert!(preset.dispatch_count() > 0, "{preset}");
            assert!(preset.steps().iter().all(|s| !s.delay.is_zero()));
        }
    }
}
