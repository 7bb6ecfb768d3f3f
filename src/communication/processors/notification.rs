use super::{MessageProcessAction, ReplySender, accepts};
use crate::communication::{
    CommunicationMessage, LocalNotificationCollection, MessageBody, MessageKind, NotificationSink,
};
use std::sync::Arc;

/// Adds the sender as a listener for one local event.
pub struct RegisterForNotificationProcessAction {
    notifications: Arc<LocalNotificationCollection>,
    replies: ReplySender,
}

impl RegisterForNotificationProcessAction {
    pub fn new(notifications: Arc<LocalNotificationCollection>, replies: ReplySender) -> Self {
        Self {
            notifications,
            replies,
        }
    }
}

impl MessageProcessAction for RegisterForNotificationProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::RegisterForNotification)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let MessageBody::RegisterForNotification { registration } = message.body() else {
            return;
        };
        match self
            .notifications
            .register_for_notification(message.origin(), registration)
        {
            Ok(()) => self.replies.reply_or_fail(message, MessageBody::Success),
            Err(e) => self.replies.fail(message, &e),
        }
    }
}

pub struct UnregisterFromNotificationProcessAction {
    notifications: Arc<LocalNotificationCollection>,
    replies: ReplySender,
}

impl UnregisterFromNotificationProcessAction {
    pub fn new(notifications: Arc<LocalNotificationCollection>, replies: ReplySender) -> Self {
        Self {
            notifications,
            replies,
        }
    }
}

impl MessageProcessAction for UnregisterFromNotificationProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::UnregisterFromNotification)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let MessageBody::UnregisterFromNotification { registration } = message.body() else {
            return;
        };
        match self
            .notifications
            .unregister_from_notification(message.origin(), registration)
        {
            Ok(()) => self.replies.reply_or_fail(message, MessageBody::Success),
            Err(e) => self.replies.fail(message, &e),
        }
    }
}

/// Hands events raised by remote endpoints to local subscribers.
pub struct NotificationRaisedProcessAction {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationRaisedProcessAction {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }
}

impl MessageProcessAction for NotificationRaisedProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::NotificationRaised)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        if let MessageBody::NotificationRaised {
            registration,
            arguments,
        } = message.body()
        {
            self.sink
                .notification_raised(message.origin(), registration, arguments);
        }
    }
}
