use crate::constants::*;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

#[derive(Debug, EnumIter, Display, Clone, Copy, Eq, PartialEq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Joint {
    Base = 0,
    Shoulder = 1,
    Elbow = 2,
    Wrist = 3,
    Gripper = 4,
}

impl Joint {
    pub const COUNT: usize = 5;

    /// Inclusive `(min, max)` angle in degrees.
    pub fn range(self) -> (i32, i32) {
        match self {
            Joint::Base => BASE_RANGE,
            Joint::Shoulder => SHOULDER_RANGE,
            Joint::Elbow => ELBOW_RANGE,
            Joint::Wrist => WRIST_RANGE,
            Joint::Gripper => GRIPPER_RANGE,
        }
    }

    pub fn initial(self) -> i32 {
        match self {
            Joint::Base => BASE_INITIAL,
            Joint::Shoulder => SHOULDER_INITIAL,
            Joint::Elbow => ELBOW_INITIAL,
            Joint::Wrist => WRIST_INITIAL,
            Joint::Gripper => GRIPPER_INITIAL,
        }
    }

    pub fn clamp(self, angle: i32) -> i32 {
        let (min, max) = self.range();
        angle.clamp(min, max)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn signum(self) -> i32 {
        match self {
            Direction::Increase => 1,
            Direction::Decrease => -1,
        }
    }
}

/// One-byte command understood by the arm firmware.
#[derive(Debug, EnumIter, Display, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CommandToken {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl CommandToken {
    /// The byte written to the transport.
    pub fn as_byte(self) -> u8 {
        b'A' + self as u8
    }

    pub fn as_char(self) -> char {
        self.as_byte() as char
    }
}

/// Snapshot of every joint angle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct JointState {
    angles: [i32; Joint::COUNT],
}

impl JointState {
    pub fn initial() -> Self {
        let mut angles = [0; Joint::COUNT];
        for joint in Joint::iter() {
            angles[joint as usize] = joint.initial();
        }
        JointState { angles }
    }

    pub fn get(&self, joint: Joint) -> i32 {
        self.angles[joint as usize]
    }

    pub(crate) fn set(&mut self, joint: Joint, angle: i32) {
        self.angles[joint as usize] = joint.clamp(angle);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, i32)> + '_ {
        Joint::iter().map(move |joint| (joint, self.get(joint)))
    }
}

impl Default for JointState {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
pub enum SequenceState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn level(self) -> log::Level {
        match self {
            Severity::Info | Severity::Success => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_pose_matches_table() {
        let state = JointState::initial();
        assert_eq!(state.get(Joint::Base), 90);
        assert_eq!(state.get(Joint::Shoulder), 130);
        assert_eq!(state.get(Joint::Elbow), 90);
        assert_eq!(state.get(Joint::Wrist), 90);
        assert_eq!(state.get(Joint::Gripper), 90);
    }

    #[test]
    fn initial_pose_is_within_bounds() {
        for joint in Joint::iter() {
            let (min, max) = joint.range();
            assert!((min..=max).contains(&joint.initial()), "{joint}");
        }
    }

    #[test]
    fn tokens_are_consecutive_ascii() {
        let bytes: Vec<u8> = CommandToken::iter().map(CommandToken::as_byte).collect();
        assert_eq!(bytes, b"ABCDEFGHIJ".to_vec());
    }
}
