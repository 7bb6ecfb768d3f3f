use super::{MessageProcessAction, accepts};
use crate::communication::{CommunicationMessage, MessageBody, MessageKind, RegistrationSink};
use std::sync::Arc;

pub struct NewCommandRegisteredProcessAction {
    sink: Arc<dyn RegistrationSink>,
}

impl NewCommandRegisteredProcessAction {
    pub fn new(sink: Arc<dyn RegistrationSink>) -> Self {
        Self { sink }
    }
}

impl MessageProcessAction for NewCommandRegisteredProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::NewCommandRegistered)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        if let MessageBody::NewCommandRegistered { command } = message.body() {
            self.sink.remote_command_registered(message.origin(), command);
        }
    }
}

pub struct NewNotificationRegisteredProcessAction {
    sink: Arc<dyn RegistrationSink>,
}

impl NewNotificationRegisteredProcessAction {
    pub fn new(sink: Arc<dyn RegistrationSink>) -> Self {
        Self { sink }
    }
}

impl MessageProcessAction for NewNotificationRegisteredProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::NewNotificationRegistered)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        if let MessageBody::NewNotificationRegistered { notification } = message.body() {
            self.sink
                .remote_notification_registered(message.origin(), notification);
        }
    }
}
