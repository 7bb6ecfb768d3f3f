//! Files waiting to be pulled by a remote endpoint.

use crate::communication::UploadToken;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maps upload tokens to the files they release.
///
/// A token is handed out once per registration. Taking it with [`Self::deregister`]
/// starts the single transfer it allows; a failed transfer can put it back with
/// [`Self::reregister`].
#[derive(Debug, Default)]
pub struct WaitingUploads {
    uploads: Mutex<FxHashMap<UploadToken, PathBuf>>,
}

impl WaitingUploads {
    pub fn new() -> Self {
        Self::default()
    }

    fn uploads(&self) -> MutexGuard<'_, FxHashMap<UploadToken, PathBuf>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, path: impl AsRef<Path>) -> UploadToken {
        let token = UploadToken::new();
        self.uploads().insert(token, path.as_ref().to_path_buf());
        token
    }

    pub fn has_registration(&self, token: &UploadToken) -> bool {
        self.uploads().contains_key(token)
    }

    /// Removes the registration and returns its file.
    pub fn deregister(&self, token: &UploadToken) -> Option<PathBuf> {
        self.uploads().remove(token)
    }

    /// Puts a registration back after a failed transfer.
    ///
    /// Returns `false` and keeps the existing entry if `token` is registered already.
    pub fn reregister(&self, token: UploadToken, path: impl AsRef<Path>) -> bool {
        let mut uploads = self.uploads();
        if uploads.contains_key(&token) {
            return false;
        }
        uploads.insert(token, path.as_ref().to_path_buf());
        true
    }

    pub fn len(&self) -> usize {
        self.uploads().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads().is_empty()
    }
}
