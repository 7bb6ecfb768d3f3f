use super::{MessageProcessAction, ReplySender, accepts};
use crate::communication::{
    CommandCollection, CommandOutcome, CommandResult, CommunicationError, CommunicationMessage,
    MessageBody, MessageKind,
};
use crate::core::logging::LogSeverity;
use std::sync::Arc;

/// Runs a member of a local command set and reports how it finished.
///
/// The reply is sent from whichever thread completes the command: `Success` for
/// [`CommandResult::Ack`], `CommandInvokedResponse` for a value, and `Failure` when
/// the command faults or is canceled.
pub struct CommandInvokedProcessAction {
    commands: Arc<CommandCollection>,
    replies: ReplySender,
}

impl CommandInvokedProcessAction {
    pub fn new(commands: Arc<CommandCollection>, replies: ReplySender) -> Self {
        Self { commands, replies }
    }
}

impl MessageProcessAction for CommandInvokedProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::CommandInvoked)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let MessageBody::CommandInvoked { invocation } = message.body() else {
            return;
        };

        self.replies.log(
            LogSeverity::Trace,
            &format!(
                "Received request to execute command: {}.{}",
                invocation.command_set, invocation.member_name
            ),
        );

        let Some(set) = self.commands.command_set(&invocation.command_set) else {
            self.replies.fail(
                message,
                &CommunicationError::UnknownCommandSet(invocation.command_set.clone()),
            );
            return;
        };

        let task = match set.invoke(&invocation.member_name, &invocation.parameters) {
            Ok(task) => task,
            Err(e) => {
                self.replies.fail(message, &e);
                return;
            }
        };

        let replies = self.replies.clone();
        let request = message.clone();
        task.on_complete(move |outcome| match outcome {
            CommandOutcome::Completed(CommandResult::Ack) => {
                replies.reply_or_fail(&request, MessageBody::Success)
            }
            CommandOutcome::Completed(CommandResult::Value(result)) => replies.reply_or_fail(
                &request,
                MessageBody::CommandInvokedResponse {
                    result: result.clone(),
                },
            ),
            CommandOutcome::Faulted(reason) => replies.fail(&request, reason),
            CommandOutcome::Canceled => replies.fail(&request, &"command was canceled"),
        });
    }
}
