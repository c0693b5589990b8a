mod constants;
mod types;
mod error;
mod translator;
mod joints;
mod observer;
mod transport;
mod simulator;
mod connection;
mod dispatcher;
mod sequence;
mod controller;

pub use controller::Controller;
pub use types::{CommandToken, ConnectionState, Direction, Joint, JointState, SequenceState, Severity};
pub use error::{ArmError, TransportError};
pub use translator::{CommandTranslator, Motion};
pub use joints::JointModel;
pub use observer::{Event, Observer, Observers};
pub use transport::{BleConfig, BleTransport, DisconnectListener, TransportPort};
pub use simulator::SimulatedTransport;
pub use connection::{ConnectionLifecycle, Teardown};
pub use dispatcher::CommandDispatcher;
pub use sequence::{Preset, SequenceRunner, Step};

// Re-export commonly used items
pub use constants::{CHARACTERISTIC_UUID, SERVICE_UUID, STEP_DEGREES};
