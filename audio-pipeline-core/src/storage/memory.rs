use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::models::error::FileServiceError;
use crate::traits::file_service::{FileEntry, FileHandle, FileService, OpenMode};

/// In-memory [`FileService`] with fault injection.
///
/// Useful for tests and for running the pipeline without a volume. Faults:
/// - `set_ready(false)`: the volume reports not ready and refuses opens
/// - `set_write_budget(Some(n))`: only `n` more bytes are accepted, after
///   which writes come back short
/// - `set_fail_sync(true)` / `set_fail_close(true)`
#[derive(Default)]
pub struct MemoryFileService {
    inner: Mutex<Inner>,
}

struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    handles: HashMap<u32, OpenEntry>,
    next_handle: u32,
    ready: bool,
    write_budget: Option<usize>,
    fail_sync: bool,
    fail_close: bool,
    max_read: Option<usize>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            handles: HashMap::new(),
            next_handle: 1,
            ready: true,
            write_budget: None,
            fail_sync: false,
            fail_close: false,
            max_read: None,
        }
    }
}

struct OpenEntry {
    name: String,
    mode: OpenMode,
    position: usize,
}

impl MemoryFileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` as `name`, replacing any existing file.
    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.inner.lock().files.insert(name.to_string(), bytes);
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().files.get(name).cloned()
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.inner.lock().handles.len()
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.lock().ready = ready;
    }

    pub fn set_write_budget(&self, budget: Option<usize>) {
        self.inner.lock().write_budget = budget;
    }

    pub fn set_fail_sync(&self, fail: bool) {
        self.inner.lock().fail_sync = fail;
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.inner.lock().fail_close = fail;
    }

    /// Cap the bytes returned by a single read call.
    pub fn set_max_read(&self, max: Option<usize>) {
        self.inner.lock().max_read = max;
    }
}

impl FileService for MemoryFileService {
    fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    fn open(&self, name: &str, mode: OpenMode) -> Result<FileHandle, FileServiceError> {
        let mut inner = self.inner.lock();
        if !inner.ready {
            return Err(FileServiceError::NotReady);
        }
        if name.is_empty() || name.contains('/') {
            return Err(FileServiceError::InvalidName(name.to_string()));
        }
        match mode {
            OpenMode::Read if !inner.files.contains_key(name) => {
                return Err(FileServiceError::NotFound(name.to_string()));
            }
            OpenMode::Read => {}
            OpenMode::Write => {
                inner.files.insert(name.to_string(), Vec::new());
            }
        }

        let id = inner.next_handle;
        inner.next_handle += 1;
        inner.handles.insert(
            id,
            OpenEntry {
                name: name.to_string(),
                mode,
                position: 0,
            },
        );
        Ok(FileHandle(id))
    }

    fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<usize, FileServiceError> {
        let mut inner = self.inner.lock();
        let max_read = inner.max_read;
        let Inner { files, handles, .. } = &mut *inner;

        let entry = handles.get_mut(&handle.0).ok_or(FileServiceError::BadHandle)?;
        if entry.mode != OpenMode::Read {
            return Err(FileServiceError::BadHandle);
        }
        let data = files
            .get(&entry.name)
            .ok_or_else(|| FileServiceError::NotFound(entry.name.clone()))?;

        let available = data.len().saturating_sub(entry.position);
        if available == 0 {
            return Ok(0);
        }
        let count = buf.len().min(available).min(max_read.unwrap_or(usize::MAX));
        buf[..count].copy_from_slice(&data[entry.position..entry.position + count]);
        entry.position += count;
        Ok(count)
    }

    fn write(&self, handle: FileHandle, buf: &[u8]) -> Result<usize, FileServiceError> {
        let mut inner = self.inner.lock();
        let count = inner.write_budget.map_or(buf.len(), |budget| budget.min(buf.len()));
        if let Some(budget) = inner.write_budget.as_mut() {
            *budget -= count;
        }

        let Inner { files, handles, .. } = &mut *inner;
        let entry = handles.get_mut(&handle.0).ok_or(FileServiceError::BadHandle)?;
        if entry.mode != OpenMode::Write {
            return Err(FileServiceError::BadHandle);
        }
        let data = files
            .get_mut(&entry.name)
            .ok_or_else(|| FileServiceError::NotFound(entry.name.clone()))?;
        data.extend_from_slice(&buf[..count]);
        entry.position += count;
        Ok(count)
    }

    fn sync(&self, handle: FileHandle) -> Result<(), FileServiceError> {
        let inner = self.inner.lock();
        if !inner.handles.contains_key(&handle.0) {
            return Err(FileServiceError::BadHandle);
        }
        if inner.fail_sync {
            return Err(FileServiceError::Io("sync failed".into()));
        }
        Ok(())
    }

    fn close(&self, handle: FileHandle) -> Result<(), FileServiceError> {
        let mut inner = self.inner.lock();
        inner.handles.remove(&handle.0).ok_or(FileServiceError::BadHandle)?;
        if inner.fail_close {
            return Err(FileServiceError::Io("close failed".into()));
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), FileServiceError> {
        let mut inner = self.inner.lock();
        if !inner.ready {
            return Err(FileServiceError::NotReady);
        }
        inner
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FileServiceError::NotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.lock().files.contains_key(name)
    }

    fn list(&self) -> Result<Vec<FileEntry>, FileServiceError> {
        let inner = self.inner.lock();
        if !inner.ready {
            return Err(FileServiceError::NotReady);
        }
        Ok(inner
            .files
            .iter()
            .map(|(name, data)| FileEntry {
                name: name.clone(),
                size: data.len() as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let fs = MemoryFileService::new();
        let handle = fs.open("a.wav", OpenMode::Write).unwrap();
        assert_eq!(fs.write(handle, b"hello").unwrap(), 5);
        fs.close(handle).unwrap();

        let handle = fs.open("a.wav", OpenMode::Read).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(handle, &mut buf).unwrap(), 5);
        assert_eq!(fs.read(handle, &mut buf).unwrap(), 0);
        fs.close(handle).unwrap();
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn write_budget_produces_short_writes() {
        let fs = MemoryFileService::new();
        fs.set_write_budget(Some(3));
        let handle = fs.open("a.wav", OpenMode::Write).unwrap();
        assert_eq!(fs.write(handle, b"hello").unwrap(), 3);
        assert_eq!(fs.write(handle, b"hello").unwrap(), 0);
        assert_eq!(fs.contents("a.wav").unwrap(), b"hel");
    }

    #[test]
    fn not_ready_refuses_open() {
        let fs = MemoryFileService::new();
        fs.set_ready(false);
        assert_eq!(fs.open("a.wav", OpenMode::Write), Err(FileServiceError::NotReady));
    }

    #[test]
    fn missing_file_is_not_found() {
        let fs = MemoryFileService::new();
        assert!(matches!(fs.open("nope.wav", OpenMode::Read), Err(FileServiceError::NotFound(_))));
        assert!(matches!(fs.remove("nope.wav"), Err(FileServiceError::NotFound(_))));
    }

    #[test]
    fn stale_handle_is_rejected() {
        let fs = MemoryFileService::new();
        let handle = fs.open("a.wav", OpenMode::Write).unwrap();
        fs.close(handle).unwrap();
        assert_eq!(fs.close(handle), Err(FileServiceError::BadHandle));
    }
}
