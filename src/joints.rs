use crate::types::{CommandToken, Joint, JointState};

/// Local mirror of the arm's joint angles.
///
/// Angles are clamped to each joint's range on every update, so the model never reports a pose
/// the arm cannot reach. The model does not publish changes itself; the caller emits
/// `Event::JointChanged` after releasing whatever lock guards the model.
#[derive(Debug, Default)]
pub struct JointModel {
    state: JointState,
}

impl JointModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, joint: Joint) -> i32 {
        self.state.get(joint)
    }

    pub fn snapshot(&self) -> JointState {
        self.state
    }

    /// Moves the token's joint one step and returns the new, clamped angle.
    pub fn apply(&mut self, token: CommandToken) -> i32 {
        let motion = token.motion();
        let angle = motion.joint.clamp(self.get(motion.joint) + motion.delta());
        self.state.set(motion.joint, angle);
        angle
    }

    pub fn reset(&mut self) {
        self.state = JointState::initial();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use strum::IntoEnumIterator;

    #[test]
    fn base_stops_at_zero() {
        let mut model = JointModel::new();
        for _ in 0..100 {
            model.apply(CommandToken::B);
        }
        assert_eq!(model.get(Joint::Base), 0);
        assert_eq!(model.apply(CommandToken::B), 0);
    }

    #[test]
    fn shoulder_uses_its_own_bounds() {
        let mut model = JointModel::new();
        assert_eq!(model.apply(CommandToken::D), 120);
        assert_eq!(model.apply(CommandToken::D), 120);
        for _ in 0..20 {
            model.apply(CommandToken::C);
        }
        assert_eq!(model.get(Joint::Shoulder), 210);
    }

    #[test]
    fn apply_touches_only_one_joint() {
        let mut model = JointModel::new();
        model.apply(CommandToken::G);
        let state = model.snapshot();
        assert_eq!(state.get(Joint::Wrist), 100);
        for (joint, angle) in state.iter().filter(|(j, _)| *j != Joint::Wrist) {
            assert_eq!(angle, joint.initial());
        }
    }

    #[test]
    fn reset_restores_initial_pose() {
        let mut model = JointModel::new();
        for token in CommandToken::iter() {
            model.apply(token);
            model.apply(token);
        }
        model.apply(CommandToken::A);
        model.reset();
        assert_eq!(model.snapshot(), JointState::initial());
    }

    fn token() -> impl Strategy<Value = CommandToken> {
        (0usize..10).prop_map(|i| CommandToken::iter().nth(i).unwrap())
    }

    proptest! {
        #[test]
        fn angles_stay_in_range(tokens in prop::collection::vec(token(), 0..400)) {
            let mut model = JointModel::new();
            for token in tokens {
                let angle = model.apply(token);
                let (min, max) = token.motion().joint.range();
                prop_assert!((min..=max).contains(&angle));
                for (joint, angle) in model.snapshot().iter() {
                    let (min, max) = joint.range();
                    prop_assert!((min..=max).contains(&angle));
                }
            }
        }
    }
}
