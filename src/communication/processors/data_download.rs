use super::{MessageProcessAction, ReplySender, accepts};
use crate::communication::{
    CancellationToken, CommunicationMessage, MessageBody, MessageKind, UploadData, WaitingUploads,
};
use crate::communication::UploadToken;
use crate::core::logging::LogSeverity;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Streams a registered file to the endpoint that asked for it.
///
/// Blocks the dispatch thread until the upload finishes. A failed upload puts
/// the token back so the download can be retried. Every upload gets its own
/// cancellation token, so canceling one never poisons the next.
pub struct DataDownloadProcessAction {
    uploads: Arc<WaitingUploads>,
    uploader: Arc<dyn UploadData>,
    running: Mutex<FxHashMap<UploadToken, CancellationToken>>,
    replies: ReplySender,
}

impl DataDownloadProcessAction {
    pub fn new(
        uploads: Arc<WaitingUploads>,
        uploader: Arc<dyn UploadData>,
        replies: ReplySender,
    ) -> Self {
        Self {
            uploads,
            uploader,
            running: Mutex::default(),
            replies,
        }
    }

    fn running(&self) -> MutexGuard<'_, FxHashMap<UploadToken, CancellationToken>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels the uploads in flight and returns how many were signalled.
    pub fn cancel_running_uploads(&self) -> usize {
        let running = self.running();
        for cancel in running.values() {
            cancel.cancel();
        }
        running.len()
    }

    pub fn running_uploads(&self) -> usize {
        self.running().len()
    }
}

impl MessageProcessAction for DataDownloadProcessAction {
    fn message_type_to_process(&self) -> Option<MessageKind> {
        Some(MessageKind::DataDownloadRequest)
    }

    fn invoke(&self, message: &CommunicationMessage) {
        if !accepts(self, message) {
            return;
        }
        let MessageBody::DataDownloadRequest { token, transfer } = message.body() else {
            return;
        };

        let Some(path) = self.uploads.deregister(token) else {
            self.replies.log(
                LogSeverity::Warning,
                &format!("No upload registered for token {token} requested by {}", message.origin()),
            );
            self.replies.send_failure(message);
            return;
        };

        let cancel = CancellationToken::new();
        self.running().insert(*token, cancel.clone());
        let uploaded = self.uploader.upload(&path, transfer, &cancel);
        self.running().remove(token);

        match uploaded {
            Ok(()) => self.replies.reply_or_fail(message, MessageBody::Success),
            Err(e) => {
                self.uploads.reregister(*token, &path);
                self.replies.fail(message, &e);
            }
        }
    }
}
