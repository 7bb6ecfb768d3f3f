use super::{MessageProcessAction, ReplySender, accepts};
use crate::communication::{
    CommunicationError, CommunicationMessage, ConnectionSink, MessageBody, MessageKind,
};
use crate::core::config::CommunicationConfig;
use std::sync::Arc;

/// Records a remote endpoint that announced one of the known channel types.
///
/// Nothing is sent back on success.
pub struct EndpointConnectProcessAction {
    channel_types: Vec<String>,
    sink: Arc<dyn ConnectionSink>,
    replies: ReplySender,
}

impl EndpointConnectProcessAction {
    pub fn new(
        channel_types: impl IntoIterator<Item = impl Into<String>>,
        sink: Arc<dyn ConnectionSink>,
        replies: ReplySender,
    ) -> Self {
        Self {
            channel_types: channel_types.into_iter().map(Into::into).collect(),
            sink,
            replies,
        }
    }

    /// Accepts the channel types listed under `[communication]`.
    pub fn from_config(
        config: &CommunicationConfig,
        sink: Arc<dyn ConnectionSink>,
        replies: ReplySender,
    ) -> Self {
        Self::new(config.channel_types.iter().cloned(), sink, replies)
    }
}

impl MessageProcessAction for EndpointConnectProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::EndpointConnect)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let MessageBody::EndpointConnect {
            channel_type,
            address,
        } = message.body()
        else {
            return;
        };

        match self.channel_types.iter().find(|known| *known == channel_type) {
            Some(known) => self.sink.endpoint_connected(message.origin(), address, known),
            None => self.replies.fail(
                message,
                &CommunicationError::UnknownChannelType(channel_type.clone()),
            ),
        }
    }
}

pub struct EndpointDisconnectProcessAction {
    sink: Arc<dyn ConnectionSink>,
}

impl EndpointDisconnectProcessAction {
    pub fn new(sink: Arc<dyn ConnectionSink>) -> Self {
        Self { sink }
    }
}

impl MessageProcessAction for EndpointDisconnectProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::EndpointDisconnect)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        self.sink.endpoint_disconnected(message.origin());
    }
}
