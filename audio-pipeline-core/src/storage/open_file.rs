use std::sync::Arc;

use crate::models::error::FileServiceError;
use crate::traits::file_service::{FileHandle, FileService, OpenMode};

/// An open file-service handle that is closed exactly once.
///
/// Explicit [`close`](Self::close) reports the close result; dropping the
/// guard on an early-return path closes the handle and only logs a failure.
pub struct OpenFile {
    fs: Arc<dyn FileService>,
    handle: Option<FileHandle>,
    name: String,
}

impl OpenFile {
    pub fn open(fs: Arc<dyn FileService>, name: &str, mode: OpenMode) -> Result<Self, FileServiceError> {
        let handle = fs.open(name, mode)?;
        Ok(Self {
            fs,
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize, FileServiceError> {
        self.fs.read(self.handle()?, buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize, FileServiceError> {
        self.fs.write(self.handle()?, buf)
    }

    pub fn sync(&self) -> Result<(), FileServiceError> {
        self.fs.sync(self.handle()?)
    }

    pub fn close(mut self) -> Result<(), FileServiceError> {
        match self.handle.take() {
            Some(handle) => self.fs.close(handle),
            None => Ok(()),
        }
    }

    fn handle(&self) -> Result<FileHandle, FileServiceError> {
        self.handle.ok_or(FileServiceError::BadHandle)
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.fs.close(handle) {
                log::warn!("failed to close '{}': {}", self.name, e);
            }
        }
    }
}
