//! TFT image sources on removable storage.
//!
//! A [`Storage`] is whatever holds the image (an SD card mount, a
//! directory, an in-memory store). [`TftSource`] is an opened image plus
//! the count of bytes the display has not acknowledged yet.

use crate::error::{Error, Result};
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Storage holding TFT images, addressed by file name.
pub trait Storage {
    /// Sequential reader over one stored file.
    type Reader: Read;

    /// Bring the storage up (mount check, card init, ...).
    fn init(&mut self) -> Result<()>;

    /// Whether `name` exists on the storage.
    fn exists(&self, name: &str) -> bool;

    /// Open `name` for sequential reading, returning the reader and its size.
    fn open(&self, name: &str) -> Result<(Self::Reader, u64)>;
}

/// Directory-rooted storage, typically the mount point of a memory card.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Split a file path into its parent directory storage and file name.
    pub fn for_file(path: &Path) -> Result<(Self, String)> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::SourceUnavailable(format!("invalid file name: {}", path.display()))
            })?
            .to_string();
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((Self::new(root), name))
    }
}

impl Storage for FsStorage {
    type Reader = BufReader<File>;

    fn init(&mut self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::SourceUnavailable(format!(
                "storage not available at {}",
                self.root.display()
            )))
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn open(&self, name: &str) -> Result<(Self::Reader, u64)> {
        let file = File::open(self.root.join(name))?;
        let size = file.metadata()?.len();
        Ok((BufReader::new(file), size))
    }
}

/// An opened TFT image.
#[derive(Debug)]
pub struct TftSource<R> {
    reader: R,
    name: String,
    size: u32,
    remaining: u32,
}

impl<R: Read> TftSource<R> {
    /// Validate and open `name` on `storage`.
    ///
    /// Fails with [`Error::SourceUnavailable`] when the storage cannot be
    /// initialized, the file does not exist, is empty, or is larger than
    /// the display's 32-bit size field.
    pub fn open<S>(storage: &mut S, name: &str) -> Result<Self>
    where
        S: Storage<Reader = R>,
    {
        debug!("Checking TFT file {name}");
        storage
            .init()
            .map_err(|e| Error::SourceUnavailable(format!("storage init failed: {e}")))?;

        if !storage.exists(name) {
            return Err(Error::SourceUnavailable(format!("{name} does not exist")));
        }

        let (reader, size) = storage
            .open(name)
            .map_err(|e| Error::SourceUnavailable(format!("cannot open {name}: {e}")))?;
        let source = Self::from_reader(reader, name, size)?;
        info!("TFT file {name} is {size} bytes");
        Ok(source)
    }

    /// Wrap an already opened reader of `size` bytes.
    pub fn from_reader(reader: R, name: impl Into<String>, size: u64) -> Result<Self> {
        let name = name.into();
        if size == 0 {
            return Err(Error::SourceUnavailable(format!("{name} is empty")));
        }
        let size = u32::try_from(size).map_err(|_| {
            Error::SourceUnavailable(format!("{name} is too large ({size} bytes)"))
        })?;

        Ok(Self {
            reader,
            name,
            size,
            remaining: size,
        })
    }

    /// File name the source was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total image size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Bytes not yet acknowledged by the display.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Fill `buf` with the next bytes of the image.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Record `len` bytes as acknowledged.
    pub(crate) fn consume(&mut self, len: u32) {
        self.remaining = self.remaining.saturating_sub(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_open_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ui.tft"), vec![0xAB; 5000]).unwrap();

        let mut storage = FsStorage::new(dir.path());
        let mut source = TftSource::open(&mut storage, "ui.tft").unwrap();
        assert_eq!(source.size(), 5000);
        assert_eq!(source.remaining(), 5000);
        assert_eq!(source.name(), "ui.tft");

        let mut buf = [0u8; 16];
        source.read_block(&mut buf).unwrap();
        assert_eq!(buf, [0xAB; 16]);
        // Reading does not count as sent
        assert_eq!(source.remaining(), 5000);
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FsStorage::new(dir.path());
        let err = TftSource::open(&mut storage, "missing.tft").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[test]
    fn test_storage_init_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FsStorage::new(dir.path().join("not-mounted"));
        let err = TftSource::open(&mut storage, "ui.tft").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(ref m) if m.contains("storage")));
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = TftSource::from_reader(Cursor::new(Vec::new()), "empty.tft", 0).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[test]
    fn test_oversized_image_rejected() {
        let err = TftSource::from_reader(Cursor::new(Vec::new()), "huge.tft", 1 << 32).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(ref m) if m.contains("too large")));
    }

    #[test]
    fn test_short_read_is_io_error() {
        let mut source = TftSource::from_reader(Cursor::new(vec![1, 2, 3]), "short.tft", 10).unwrap();
        let mut buf = [0u8; 10];
        assert!(matches!(source.read_block(&mut buf), Err(Error::Io(_))));
    }

    #[test]
    fn test_consume_saturates() {
        let mut source = TftSource::from_reader(Cursor::new(vec![0; 4]), "a.tft", 4).unwrap();
        source.consume(3);
        assert_eq!(source.remaining(), 1);
        source.consume(3);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_for_file_splits_path() {
        let (storage, name) = FsStorage::for_file(Path::new("/media/sd/ui.tft")).unwrap();
        assert_eq!(storage.root(), Path::new("/media/sd"));
        assert_eq!(name, "ui.tft");

        let (storage, name) = FsStorage::for_file(Path::new("ui.tft")).unwrap();
        assert_eq!(storage.root(), Path::new("."));
        assert_eq!(name, "ui.tft");
    }
}
