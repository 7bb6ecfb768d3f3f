use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommunicationError {
    #[error("endpoint id must not be empty")]
    InvalidEndpointId,
    #[error("cannot wait for a response without a message id")]
    MissingResponseId,
    #[error("command set {0} is already registered")]
    CommandSetAlreadyRegistered(String),
    #[error("notification set {0} is already registered")]
    NotificationSetAlreadyRegistered(String),
    #[error("unknown command set: {0}")]
    UnknownCommandSet(String),
    #[error("command set {command_set} has no member {member}({parameters})")]
    UnknownCommandMember {
        command_set: String,
        member: String,
        parameters: String,
    },
    #[error("unknown notification: {0}")]
    UnknownNotification(String),
    #[error("unknown channel type: {0}")]
    UnknownChannelType(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("upload canceled")]
    UploadCanceled,
    #[error("response was canceled")]
    ResponseCanceled,
    #[error("timed out waiting for a response")]
    ResponseTimedOut,
}
