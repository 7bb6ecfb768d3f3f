//! Actions run for incoming messages, one per message kind.
//!
//! Processors never propagate errors to the dispatch loop: a failure is logged
//! and turned into a [`MessageBody::Failure`] reply to the sender. If sending that
//! reply fails as well, the second error is logged and dropped.

mod command_invoked;
mod data_download;
mod endpoint;
mod information;
mod notification;
mod registration;
mod unknown;

pub use command_invoked::CommandInvokedProcessAction;
pub use data_download::DataDownloadProcessAction;
pub use endpoint::{EndpointConnectProcessAction, EndpointDisconnectProcessAction};
pub use information::{
    CommandInformationRequestProcessAction, NotificationInformationRequestProcessAction,
};
pub use notification::{
    NotificationRaisedProcessAction, RegisterForNotificationProcessAction,
    UnregisterFromNotificationProcessAction,
};
pub use registration::{NewCommandRegisteredProcessAction, NewNotificationRegisteredProcessAction};
pub use unknown::UnknownMessageTypeProcessAction;

use crate::communication::{
    CommunicationError, CommunicationMessage, EndpointId, MessageBody, MessageKind, SendMessages,
};
use crate::core::logging::{LogSeverity, Logger};
use std::fmt;
use std::sync::Arc;

pub trait MessageProcessAction: Send + Sync {
    /// The kind this action handles. `None` accepts any message and marks the
    /// action as a last-chance handler.
    fn message_type_to_process(&self) -> Option<MessageKind>;

    fn invoke(&self, message: &CommunicationMessage);
}

/// Checks the message kind before an action touches it.
///
/// A mismatch is a wiring bug: debug builds panic, release builds skip the message.
pub(crate) fn accepts(action: &dyn MessageProcessAction, message: &CommunicationMessage) -> bool {
    let accepted = action
        .message_type_to_process()
        .is_none_or(|kind| kind == message.kind());
    debug_assert!(
        accepted,
        "{:?} delivered to a processor for {:?}",
        message.kind(),
        action.message_type_to_process()
    );
    accepted
}

/// Sends replies from the local endpoint and reports processing failures.
#[derive(Clone)]
pub struct ReplySender {
    local: EndpointId,
    sender: Arc<dyn SendMessages>,
    logger: Logger,
}

impl ReplySender {
    pub fn new(local: EndpointId, sender: Arc<dyn SendMessages>, logger: Logger) -> Self {
        Self {
            local,
            sender,
            logger,
        }
    }

    pub fn local(&self) -> &EndpointId {
        &self.local
    }

    pub fn log(&self, severity: LogSeverity, text: &str) {
        (self.logger)(severity, text)
    }

    /// Sends `body` to the origin of `to`, correlated with its id.
    pub fn reply(&self, to: &CommunicationMessage, body: MessageBody) -> Result<(), CommunicationError> {
        let response = CommunicationMessage::response(self.local.clone(), to.id(), body);
        self.sender.send(to.origin(), response)
    }

    pub fn reply_or_fail(&self, to: &CommunicationMessage, body: MessageBody) {
        if let Err(e) = self.reply(to, body) {
            self.fail(to, &e);
        }
    }

    /// Logs `reason` and answers `to` with a failure.
    pub fn fail(&self, to: &CommunicationMessage, reason: &dyn fmt::Display) {
        self.log(
            LogSeverity::Error,
            &format!("Error while processing {to}: {reason}"),
        );
        self.send_failure(to);
    }

    pub fn send_failure(&self, to: &CommunicationMessage) {
        if let Err(e) = self.reply(to, MessageBody::Failure) {
            self.log(
                LogSeverity::Error,
                &format!("Error while trying to send process failure: {e}"),
            );
        }
    }
}
