use crate::sequence::Preset;
use crate::types::ConnectionState;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("link to the arm is down")]
    Disconnected,

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("no arm found")]
    NoDeviceFound,

    #[error("serial characteristic not found")]
    CharacteristicNotFound,

    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("not connected")]
    NotConnected,

    #[error("invalid command token {0:?}")]
    InvalidToken(char),

    #[error("sequence {0} rejected, another sequence is running")]
    Busy(Preset),

    #[error("cannot connect, connection is {0}")]
    AlreadyConnected(ConnectionState),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
