use serde::{Deserialize, Serialize};

use crate::models::error::FileServiceError;

/// Opaque handle returned by [`FileService::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create or truncate, exclusive to the caller until closed.
    Write,
}

/// One directory entry as reported by [`FileService::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Block-storage capability consumed by the storage writer and reader.
///
/// Implemented by:
/// - `MemoryFileService` (tests, in this crate)
/// - `DirFileService` (host directory backend)
///
/// Every call may fail and none is retried by the pipeline. `read` and
/// `write` report how many bytes actually moved; a short count is a valid
/// answer, not an error. A zero-byte read means end of file.
pub trait FileService: Send + Sync {
    /// Whether the volume is mounted and accepting operations.
    fn is_ready(&self) -> bool;

    fn open(&self, name: &str, mode: OpenMode) -> Result<FileHandle, FileServiceError>;

    fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<usize, FileServiceError>;

    fn write(&self, handle: FileHandle, buf: &[u8]) -> Result<usize, FileServiceError>;

    /// Request durability for everything written through `handle`.
    fn sync(&self, handle: FileHandle) -> Result<(), FileServiceError>;

    fn close(&self, handle: FileHandle) -> Result<(), FileServiceError>;

    fn remove(&self, name: &str) -> Result<(), FileServiceError>;

    fn exists(&self, name: &str) -> bool;

    /// Files on the volume, in no particular order.
    fn list(&self) -> Result<Vec<FileEntry>, FileServiceError>;
}
