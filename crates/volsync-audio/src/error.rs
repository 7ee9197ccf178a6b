use crate::provider::DeviceFlow;

/// Errors reported by audio providers.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No device with this id exists for the flow.
    #[error("device {id} ({flow}) not found")]
    DeviceNotFound { id: i32, flow: DeviceFlow },

    /// The provider cannot reach the audio subsystem.
    #[error("audio provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The audio subsystem rejected an operation.
    #[error("audio operation failed: {0}")]
    OperationFailed(String),
}

/// Errors from [`ControlPointGroup`](crate::ControlPointGroup) membership changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    /// A member with this id is already in the group.
    #[error("member id {0} already present in group")]
    DuplicateMemberId(i32),

    /// The group's last member ended. An ended group never refills.
    #[error("group has ended")]
    Ended,

    /// The group was disposed and cannot take new members.
    #[error("group has been disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, AudioError>;
