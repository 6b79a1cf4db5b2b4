//! One upload request: an image on a storage, sent through an [`Uploader`].

use super::{UploadReport, Uploader};
use crate::clock::Clock;
use crate::error::Result;
use crate::port::Port;
use crate::source::{Storage, TftSource};

/// A single-file upload.
///
/// The image is opened when the session runs and released when `run`
/// returns, whatever the outcome.
#[derive(Debug)]
pub struct UploadSession<S: Storage> {
    storage: S,
    file_name: String,
}

impl<S: Storage> UploadSession<S> {
    /// Prepare an upload of `file_name` from `storage`.
    pub fn new(storage: S, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
        }
    }

    /// File this session uploads.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Validate the image and open it.
    pub fn open_source(&mut self) -> Result<TftSource<S::Reader>> {
        TftSource::open(&mut self.storage, &self.file_name)
    }

    /// Validate the image, then detect, negotiate and transfer.
    pub fn run<P, C, F>(&mut self, uploader: &mut Uploader<P, C>, progress: F) -> Result<UploadReport>
    where
        P: Port,
        C: Clock,
        F: FnMut(usize, usize),
    {
        let mut source = self.open_source()?;
        uploader.upload(&mut source, progress)
    }
}
