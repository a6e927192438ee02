//! Directory-backed file service.
//!
//! Every file lives directly under one root directory. Names may carry a
//! `"<volume>:"` prefix naming this service's volume; any other prefix, and
//! any path separator, is rejected.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use audio_pipeline_core::{FileEntry, FileHandle, FileService, FileServiceError, OpenMode};
use parking_lot::Mutex;

struct OpenEntry {
    mode: OpenMode,
    file: Arc<Mutex<File>>,
}

pub struct DirFileService {
    root: PathBuf,
    volume: Option<String>,
    handles: Mutex<HashMap<u32, OpenEntry>>,
    next_handle: Mutex<u32>,
}

impl DirFileService {
    /// Serve files from `root`, which must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            volume: None,
            handles: Mutex::new(HashMap::new()),
            next_handle: Mutex::new(1),
        }
    }

    /// Accept names prefixed with `"<volume>:"` as well as bare names.
    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, FileServiceError> {
        let bare = match name.split_once(':') {
            None => name,
            Some((volume, rest)) if self.volume.as_deref() == Some(volume) => rest,
            Some(_) => return Err(FileServiceError::InvalidName(name.to_string())),
        };
        if bare.is_empty() || bare == "." || bare == ".." || bare.contains(['/', '\\', ':']) {
            return Err(FileServiceError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(bare))
    }

    fn entry(&self, handle: FileHandle, mode: OpenMode) -> Result<Arc<Mutex<File>>, FileServiceError> {
        match self.handles.lock().get(&handle.0) {
            Some(entry) if entry.mode == mode => Ok(Arc::clone(&entry.file)),
            _ => Err(FileServiceError::BadHandle),
        }
    }
}

fn io_error(name: &str, error: std::io::Error) -> FileServiceError {
    match error.kind() {
        ErrorKind::NotFound => FileServiceError::NotFound(name.to_string()),
        _ => FileServiceError::Io(format!("{}: {}", name, error)),
    }
}

impl FileService for DirFileService {
    fn is_ready(&self) -> bool {
        self.root.is_dir()
    }

    fn open(&self, name: &str, mode: OpenMode) -> Result<FileHandle, FileServiceError> {
        if !self.is_ready() {
            return Err(FileServiceError::NotReady);
        }
        let path = self.resolve(name)?;
        let file = match mode {
            OpenMode::Read => File::open(&path),
            OpenMode::Write => OpenOptions::new().write(true).create(true).truncate(true).open(&path),
        }
        .map_err(|e| io_error(name, e))?;

        let id = {
            let mut next = self.next_handle.lock();
            let id = *next;
            *next = next.wrapping_add(1).max(1);
            id
        };
        self.handles.lock().insert(
            id,
            OpenEntry {
                mode,
                file: Arc::new(Mutex::new(file)),
            },
        );
        log::trace!("opened {} as handle {} ({:?})", path.display(), id, mode);
        Ok(FileHandle(id))
    }

    fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<usize, FileServiceError> {
        let file = self.entry(handle, OpenMode::Read)?;
        let mut file = file.lock();
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FileServiceError::Io(e.to_string())),
            }
        }
    }

    fn write(&self, handle: FileHandle, buf: &[u8]) -> Result<usize, FileServiceError> {
        let file = self.entry(handle, OpenMode::Write)?;
        let mut file = file.lock();
        loop {
            match file.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FileServiceError::Io(e.to_string())),
            }
        }
    }

    fn sync(&self, handle: FileHandle) -> Result<(), FileServiceError> {
        let file = self.entry(handle, OpenMode::Write)?;
        let file = file.lock();
        file.sync_all().map_err(|e| FileServiceError::Io(e.to_string()))
    }

    fn close(&self, handle: FileHandle) -> Result<(), FileServiceError> {
        self.handles
            .lock()
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(FileServiceError::BadHandle)
    }

    fn remove(&self, name: &str) -> Result<(), FileServiceError> {
        if !self.is_ready() {
            return Err(FileServiceError::NotReady);
        }
        let path = self.resolve(name)?;
        fs::remove_file(&path).map_err(|e| io_error(name, e))
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|path| path.is_file()).unwrap_or(false)
    }

    fn list(&self) -> Result<Vec<FileEntry>, FileServiceError> {
        if !self.is_ready() {
            return Err(FileServiceError::NotReady);
        }
        let entries = fs::read_dir(&self.root).map_err(|e| FileServiceError::Io(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FileServiceError::Io(e.to_string()))?;
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            match entry.file_name().into_string() {
                Ok(name) => files.push(FileEntry {
                    name,
                    size: metadata.len(),
                }),
                Err(name) => log::debug!("skipping non UTF-8 file name {:?}", name),
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (tempfile::TempDir, DirFileService) {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFileService::new(dir.path()).with_volume("sd");
        (dir, fs)
    }

    #[test]
    fn write_then_read_back() {
        let (_dir, fs) = service();
        let handle = fs.open("a.wav", OpenMode::Write).unwrap();
        assert_eq!(fs.write(handle, b"hello").unwrap(), 5);
        fs.sync(handle).unwrap();
        fs.close(handle).unwrap();

        let handle = fs.open("sd:a.wav", OpenMode::Read).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(handle, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(fs.read(handle, &mut buf).unwrap(), 0);
        fs.close(handle).unwrap();
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn rejects_paths_and_foreign_volumes() {
        let (_dir, fs) = service();
        for name in ["../x.wav", "a/b.wav", "a\\b.wav", "usb:a.wav", "sd:", ""] {
            assert!(
                matches!(fs.open(name, OpenMode::Write), Err(FileServiceError::InvalidName(_))),
                "{}",
                name
            );
        }
        assert!(!fs.exists("../etc"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, fs) = service();
        assert_eq!(
            fs.open("nope.wav", OpenMode::Read),
            Err(FileServiceError::NotFound("nope.wav".into()))
        );
        assert_eq!(fs.remove("nope.wav"), Err(FileServiceError::NotFound("nope.wav".into())));
    }

    #[test]
    fn handles_are_mode_checked() {
        let (_dir, fs) = service();
        let handle = fs.open("a.wav", OpenMode::Write).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read(handle, &mut buf), Err(FileServiceError::BadHandle));
        fs.close(handle).unwrap();
        assert_eq!(fs.close(handle), Err(FileServiceError::BadHandle));
    }

    #[test]
    fn lists_only_regular_files() {
        let (dir, fs) = service();
        std::fs::write(dir.path().join("a.wav"), [0u8; 12]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let listed = fs.list().unwrap();
        assert_eq!(
            listed,
            vec![FileEntry {
                name: "a.wav".into(),
                size: 12
            }]
        );
        assert!(fs.exists("sd:a.wav"));
        fs.remove("a.wav").unwrap();
        assert!(!fs.exists("a.wav"));
    }

    #[test]
    fn missing_root_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFileService::new(dir.path().join("absent"));
        assert!(!fs.is_ready());
        assert_eq!(fs.open("a.wav", OpenMode::Write), Err(FileServiceError::NotReady));
        assert_eq!(fs.list(), Err(FileServiceError::NotReady));
    }
}
