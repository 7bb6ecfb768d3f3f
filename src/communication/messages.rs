//! The message vocabulary exchanged between endpoints.
//!
//! Every message is a [`CommunicationMessage`] envelope (identity, correlation,
//! origin) around one [`MessageBody`] variant. Messages are immutable once built.

use crate::communication::{EndpointId, MessageId, MethodInvocation, UploadToken};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Describes a command or notification set offered by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SerializedType {
    pub name: String,
    /// Command names or event names, depending on what the type describes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

impl SerializedType {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Names one event of one notification set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventRegistration {
    pub notification_set: String,
    pub event_name: String,
}

impl EventRegistration {
    pub fn new(notification_set: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            notification_set: notification_set.into(),
            event_name: event_name.into(),
        }
    }
}

impl fmt::Display for EventRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.notification_set, self.event_name)
    }
}

/// Where and how the receiving side of a data transfer can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTransferInformation {
    pub channel_type: String,
    pub address: String,
    #[serde(default)]
    pub start_position: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    EndpointConnect,
    EndpointDisconnect,
    CommandInformationRequest,
    NotificationInformationRequest,
    EndpointProxyTypesResponse,
    CommandInvoked,
    CommandInvokedResponse,
    NewCommandRegistered,
    NewNotificationRegistered,
    RegisterForNotification,
    UnregisterFromNotification,
    NotificationRaised,
    Success,
    Failure,
    UnknownMessageType,
    DataDownloadRequest,
}

impl MessageKind {
    /// The wire spelling, as used in the `type` tag of a message body.
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::EndpointConnect => "endpoint_connect",
            MessageKind::EndpointDisconnect => "endpoint_disconnect",
            MessageKind::CommandInformationRequest => "command_information_request",
            MessageKind::NotificationInformationRequest => "notification_information_request",
            MessageKind::EndpointProxyTypesResponse => "endpoint_proxy_types_response",
            MessageKind::CommandInvoked => "command_invoked",
            MessageKind::CommandInvokedResponse => "command_invoked_response",
            MessageKind::NewCommandRegistered => "new_command_registered",
            MessageKind::NewNotificationRegistered => "new_notification_registered",
            MessageKind::RegisterForNotification => "register_for_notification",
            MessageKind::UnregisterFromNotification => "unregister_from_notification",
            MessageKind::NotificationRaised => "notification_raised",
            MessageKind::Success => "success",
            MessageKind::Failure => "failure",
            MessageKind::UnknownMessageType => "unknown_message_type",
            MessageKind::DataDownloadRequest => "data_download_request",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// The sender opened a channel of `channel_type` reachable at `address`.
    EndpointConnect {
        channel_type: String,
        address: String,
    },
    EndpointDisconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        closing_channel_type: Option<String>,
    },
    CommandInformationRequest,
    NotificationInformationRequest,
    EndpointProxyTypesResponse {
        proxy_types: Vec<SerializedType>,
    },
    CommandInvoked {
        invocation: MethodInvocation,
    },
    CommandInvokedResponse {
        result: serde_json::Value,
    },
    NewCommandRegistered {
        command: SerializedType,
    },
    NewNotificationRegistered {
        notification: SerializedType,
    },
    RegisterForNotification {
        registration: EventRegistration,
    },
    UnregisterFromNotification {
        registration: EventRegistration,
    },
    NotificationRaised {
        registration: EventRegistration,
        arguments: serde_json::Value,
    },
    Success,
    /// Carries no detail: error text stays on the endpoint that failed.
    Failure,
    UnknownMessageType,
    DataDownloadRequest {
        token: UploadToken,
        transfer: StreamTransferInformation,
    },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::EndpointConnect { .. } => MessageKind::EndpointConnect,
            MessageBody::EndpointDisconnect { .. } => MessageKind::EndpointDisconnect,
            MessageBody::CommandInformationRequest => MessageKind::CommandInformationRequest,
            MessageBody::NotificationInformationRequest => {
                MessageKind::NotificationInformationRequest
            }
            MessageBody::EndpointProxyTypesResponse { .. } => {
                MessageKind::EndpointProxyTypesResponse
            }
            MessageBody::CommandInvoked { .. } => MessageKind::CommandInvoked,
            MessageBody::CommandInvokedResponse { .. } => MessageKind::CommandInvokedResponse,
            MessageBody::NewCommandRegistered { .. } => MessageKind::NewCommandRegistered,
            MessageBody::NewNotificationRegistered { .. } => MessageKind::NewNotificationRegistered,
            MessageBody::RegisterForNotification { .. } => MessageKind::RegisterForNotification,
            MessageBody::UnregisterFromNotification { .. } => {
                MessageKind::UnregisterFromNotification
            }
            MessageBody::NotificationRaised { .. } => MessageKind::NotificationRaised,
            MessageBody::Success => MessageKind::Success,
            MessageBody::Failure => MessageKind::Failure,
            MessageBody::UnknownMessageType => MessageKind::UnknownMessageType,
            MessageBody::DataDownloadRequest { .. } => MessageKind::DataDownloadRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationMessage {
    id: MessageId,
    #[serde(default)]
    in_response_to: MessageId,
    origin: EndpointId,
    body: MessageBody,
}

impl CommunicationMessage {
    /// An unsolicited message from `origin`.
    pub fn new(origin: EndpointId, body: MessageBody) -> Self {
        Self::response(origin, MessageId::NONE, body)
    }

    /// A message from `origin` answering the message `in_response_to`.
    pub fn response(origin: EndpointId, in_response_to: MessageId, body: MessageBody) -> Self {
        Self {
            id: MessageId::new(),
            in_response_to,
            origin,
            body,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn in_response_to(&self) -> MessageId {
        self.in_response_to
    }

    pub fn origin(&self) -> &EndpointId {
        &self.origin
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn is_response(&self) -> bool {
        !self.in_response_to.is_none()
    }
}

impl fmt::Display for CommunicationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} from {}", self.kind(), self.id, self.origin)
    }
}
