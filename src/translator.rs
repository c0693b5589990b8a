//! Static mapping from wire tokens to joint motions.

use crate::constants::STEP_DEGREES;
use crate::error::ArmError;
use crate::types::{CommandToken, Direction, Joint};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Motion {
    pub joint: Joint,
    pub direction: Direction,
    pub step: i32,
}

impl Motion {
    /// Signed change in degrees.
    pub fn delta(&self) -> i32 {
        self.direction.signum() * self.step
    }
}

impl CommandToken {
    pub fn motion(self) -> Motion {
        use CommandToken::*;
        use Direction::*;

        let (joint, direction) = match self {
            A => (Joint::Base, Increase),
            B => (Joint::Base, Decrease),
            C => (Joint::Shoulder, Increase),
            D => (Joint::Shoulder, Decrease),
            E => (Joint::Elbow, Increase),
            F => (Joint::Elbow, Decrease),
            G => (Joint::Wrist, Increase),
            H => (Joint::Wrist, Decrease),
            I => (Joint::Gripper, Increase),
            J => (Joint::Gripper, Decrease),
        };
        Motion {
            joint,
            direction,
            step: STEP_DEGREES,
        }
    }
}

impl TryFrom<char> for CommandToken {
    type Error = ArmError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        use CommandToken::*;

        Ok(match c {
            'A' => A,
            'B' => B,
            'C' => C,
            'D' => D,
            'E' => E,
            'F' => F,
            'G' => G,
            'H' => H,
            'I' => I,
            'J' => J,
            other => return Err(ArmError::InvalidToken(other)),
        })
    }
}

impl TryFrom<u8> for CommandToken {
    type Error = ArmError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        CommandToken::try_from(b as char)
    }
}

pub struct CommandTranslator;

impl CommandTranslator {
    /// Resolves raw input to a token and its motion. Only the ten upper-case tokens are accepted.
    pub fn resolve(c: char) -> Result<(CommandToken, Motion), ArmError> {
        let token = CommandToken::try_from(c)?;
        Ok((token, token.motion()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_token_resolves() {
        let expected = [
            ('A', Joint::Base, Direction::Increase),
            ('B', Joint::Base, Direction::Decrease),
            ('C', Joint::Shoulder, Direction::Increase),
            ('D', Joint::Shoulder, Direction::Decrease),
            ('E', Joint::Elbow, Direction::Increase),
            ('F', Joint::Elbow, Direction::Decrease),
            ('G', Joint::Wrist, Direction::Increase),
            ('H', Joint::Wrist, Direction::Decrease),
            ('I', Joint::Gripper, Direction::Increase),
            ('J', Joint::Gripper, Direction::Decrease),
        ];
        for (c, joint, direction) in expected {
            let (token, motion) = CommandTranslator::resolve(c).unwrap();
            assert_eq!(token.as_char(), c);
            assert_eq!(motion.joint, joint);
            assert_eq!(motion.direction, direction);
            assert_eq!(motion.step, 10);
        }
    }

    #[test]
    fn each_joint_has_one_token_per_direction() {
        let motions: Vec<Motion> = CommandToken::iter().map(CommandToken::motion).collect();
        for m in &motions {
            let twins = motions
                .iter()
                .filter(|o| o.joint == m.joint && o.direction == m.direction)
                .count();
            assert_eq!(twins, 1);
        }
    }

    #[test]
    fn stray_input_is_rejected() {
        for c in ['Z', 'a', 'j', '1', ' ', 'K', '\n'] {
            assert!(matches!(
                CommandTranslator::resolve(c),
                Err(ArmError::InvalidToken(x)) if x == c
            ));
        }
    }

    #[test]
    fn bytes_resolve_like_chars() {
        assert_eq!(CommandToken::try_from(b'E').unwrap(), CommandToken::E);
        assert!(CommandToken::try_from(0xffu8).is_err());
    }
}
