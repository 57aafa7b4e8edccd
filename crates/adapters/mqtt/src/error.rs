//! MQTT adapter error types.

use boneio_domain::error::BoneIoError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The configuration cannot be used to build a client.
    #[error("invalid MQTT configuration: {0}")]
    InvalidConfig(&'static str),

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),

    /// The request queue stayed full for the whole shutdown grace period.
    #[error("MQTT shutdown did not complete within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

impl MqttError {
    /// Convert into a [`BoneIoError::Bus`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> BoneIoError {
        BoneIoError::Bus(Box::new(self))
    }
}

impl From<MqttError> for BoneIoError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
