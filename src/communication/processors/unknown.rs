use super::{MessageProcessAction, ReplySender};
use crate::communication::{CommunicationMessage, MessageBody, MessageKind};
use crate::core::logging::LogSeverity;

/// Last-chance handler telling the sender its message was not understood.
///
/// An incoming `UnknownMessageType` is dropped, otherwise two endpoints that
/// both lack a handler would answer each other forever.
pub struct UnknownMessageTypeProcessAction {
    replies: ReplySender,
}

impl UnknownMessageTypeProcessAction {
    pub fn new(replies: ReplySender) -> Self {
        Self { replies }
    }
}

impl MessageProcessAction for UnknownMessageTypeProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        None
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if message.kind() == MessageKind::UnknownMessageType {
            return;
        }
        self.replies.log(
            LogSeverity::Debug,
            &format!("No processor for {message}, replying unknown message type"),
        );
        self.replies
            .reply_or_fail(message, MessageBody::UnknownMessageType);
    }
}
