use std::time::Duration;
use uuid::Uuid;

// Serial-over-BLE module (HM-10 style)
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe000001000800000805f9b34fb);
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ffe100001000800000805f9b34fb);
pub const DEFAULT_NAME_PREFIX: &str = "HMSoft";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

// Every token moves its joint by this many degrees
pub const STEP_DEGREES: i32 = 10;

// Joint bounds and start-up pose, degrees
pub const BASE_RANGE: (i32, i32) = (0, 180);
pub const SHOULDER_RANGE: (i32, i32) = (120, 210);
pub const ELBOW_RANGE: (i32, i32) = (0, 180);
pub const WRIST_RANGE: (i32, i32) = (0, 180);
pub const GRIPPER_RANGE: (i32, i32) = (0, 180);

pub const BASE_INITIAL: i32 = 90;
pub const SHOULDER_INITIAL: i32 = 130;
pub const ELBOW_INITIAL: i32 = 90;
pub const WRIST_INITIAL: i32 = 90;
pub const GRIPPER_INITIAL: i32 = 90;
