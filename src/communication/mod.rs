//! Endpoint-to-endpoint messaging.
//!
//! Endpoints exchange immutable [`CommunicationMessage`]s. Incoming messages go
//! through a [`MessageHandler`]: responses complete the [`ResponseFuture`] of the
//! request they answer, everything else reaches the processor registered for its
//! kind. Processors talk back through an injected [`SendMessages`] and never
//! let an error escape to the dispatch loop.

pub mod error;
pub mod handler;
pub mod ids;
pub mod invocation;
pub mod messages;
pub mod processors;
pub mod registry;
pub mod remote;
pub mod transport;
pub mod uploads;

pub use error::CommunicationError;
pub use handler::{MessageFilter, MessageHandler, ResponseFuture};
pub use ids::{EndpointId, MessageId, UploadToken};
pub use invocation::{
    CommandOutcome, CommandResult, CommandTask, InvocationParameter, MethodInvocation,
};
pub use messages::{
    CommunicationMessage, EventRegistration, MessageBody, MessageKind, SerializedType,
    StreamTransferInformation,
};
pub use processors::{
    CommandInformationRequestProcessAction, CommandInvokedProcessAction,
    DataDownloadProcessAction, EndpointConnectProcessAction, EndpointDisconnectProcessAction,
    MessageProcessAction, NewCommandRegisteredProcessAction,
    NewNotificationRegisteredProcessAction, NotificationInformationRequestProcessAction,
    NotificationRaisedProcessAction, RegisterForNotificationProcessAction, ReplySender,
    UnknownMessageTypeProcessAction, UnregisterFromNotificationProcessAction,
};
pub use registry::{
    Broadcaster, CommandCollection, CommandSet, LocalCommandSet, LocalNotificationCollection,
    MethodSignature,
};
pub use remote::{RemoteAvailability, RemoteCommandHub, RemoteNotificationHub};
pub use transport::{
    CancellationToken, ConnectionSink, EndpointAddress, KnownEndpoints, NotificationSink,
    RegistrationSink, SendMessages, UploadData,
};
pub use uploads::WaitingUploads;
