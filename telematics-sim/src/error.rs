use thiserror::Error;

/// Failure taxonomy shared by the simulator and the relay.
#[derive(Debug, Error)]
pub enum TelematicsError {
    /// Registry and state store disagree; a configuration bug, never expected at runtime.
    #[error("unknown vehicle '{0}'")]
    UnknownVehicle(String),

    /// Inbound broker payload is not a valid reading document.
    #[error("invalid reading payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// One message could not be handed to the broker.
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("broker connection lost: {0}")]
    BrokerConnectionLost(String),

    /// No reading has been produced yet for this vehicle.
    #[error("vehicle '{0}' not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, TelematicsError>;
