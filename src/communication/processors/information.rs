use super::{MessageProcessAction, ReplySender, accepts};
use crate::communication::{
    CommandCollection, CommunicationMessage, LocalNotificationCollection, MessageBody, MessageKind,
};
use std::sync::Arc;

/// Answers with the command sets this endpoint offers.
pub struct CommandInformationRequestProcessAction {
    commands: Arc<CommandCollection>,
    replies: ReplySender,
}

impl CommandInformationRequestProcessAction {
    pub fn new(commands: Arc<CommandCollection>, replies: ReplySender) -> Self {
        Self { commands, replies }
    }
}

impl MessageProcessAction for CommandInformationRequestProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::CommandInformationRequest)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let proxy_types = self.commands.serialized_types();
        self.replies
            .reply_or_fail(message, MessageBody::EndpointProxyTypesResponse { proxy_types });
    }
}

/// Answers with the notification sets this endpoint offers.
pub struct NotificationInformationRequestProcessAction {
    notifications: Arc<LocalNotificationCollection>,
    replies: ReplySender,
}

impl NotificationInformationRequestProcessAction {
    pub fn new(notifications: Arc<LocalNotificationCollection>, replies: ReplySender) -> Self {
        Self {
            notifications,
            replies,
        }
    }
}

impl MessageProcessAction for NotificationInformationRequestProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::NotificationInformationRequest)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let proxy_types = self.notifications.serialized_types();
        self.replies
            .reply_or_fail(message, MessageBody::EndpointProxyTypesResponse { proxy_types });
    }
}
