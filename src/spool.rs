//! Named temp-file artifact handles.
//!
//! A spool is the backing store for a package target that is generated
//! rather than copied from somewhere on disk: the recipe writes script text
//! into it and export later relocates the underlying file. Spools keep a
//! stable filesystem path from creation, so the registry can resolve and
//! compare them like any other source.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A spool shared between the package registry and a recipe's active
/// buffer slot. Everything is single-threaded, so `Rc<RefCell<_>>` is the
/// whole synchronization story.
pub type SharedSpool = Rc<RefCell<Spool>>;

/// A named, temp-file-backed text buffer.
///
/// Writes accumulate in memory until a flush; reads and truncations force
/// one first, so readers always observe the full logical content.
#[derive(Debug)]
pub struct Spool {
    name: String,
    path: PathBuf,
    file: Option<File>,
    pending: String,
}

impl Spool {
    /// Create a spool named after `name` inside `dir`.
    ///
    /// The backing file is kept on disk rather than deleted on drop;
    /// cleanup of abandoned spools is the owning directory's concern.
    pub(crate) fn create_in(name: &str, dir: &Path) -> io::Result<Self> {
        let stem = Path::new(name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "spool".to_string());
        let (file, path) = tempfile::Builder::new()
            .prefix(&format!("{stem}."))
            .tempfile_in(dir)?
            .keep()
            .map_err(|e| e.error)?;
        Ok(Self {
            name: name.to_string(),
            path,
            file: Some(file),
            pending: String::new(),
        })
    }

    /// The name the spool was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Append text to the spool.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        if self.file.is_none() {
            return Err(self.closed_error());
        }
        self.pending.push_str(text);
        Ok(())
    }

    /// Push pending writes through to the backing file.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            return Err(self.closed_error());
        };
        file.write_all(self.pending.as_bytes())?;
        file.flush()?;
        self.pending.clear();
        Ok(())
    }

    /// Flush, then return the full content regardless of cursor position.
    pub fn read_all(&mut self) -> io::Result<String> {
        self.flush()?;
        match self.file.as_mut() {
            Some(file) => {
                file.seek(SeekFrom::Start(0))?;
                let mut content = String::new();
                file.read_to_string(&mut content)?;
                file.seek(SeekFrom::End(0))?;
                Ok(content)
            }
            None => std::fs::read_to_string(&self.path),
        }
    }

    /// Discard everything from byte position `pos` to the current end.
    pub fn truncate_at(&mut self, pos: u64) -> io::Result<()> {
        self.flush()?;
        let Some(file) = self.file.as_mut() else {
            return Err(self.closed_error());
        };
        let pos = pos.min(file.metadata()?.len());
        file.set_len(pos)?;
        file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Read `length` bytes starting at byte `offset`.
    pub fn read_range(&mut self, offset: u64, length: u64) -> io::Result<String> {
        self.flush()?;
        let Some(file) = self.file.as_mut() else {
            return Err(self.closed_error());
        };
        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::with_capacity(length as usize);
        file.take(length).read_to_end(&mut bytes)?;
        file.seek(SeekFrom::End(0))?;
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Flush, sync, and release the file handle. Idempotent.
    ///
    /// The backing file stays on disk; export relocates or copies it.
    pub fn close(&mut self) -> io::Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        self.flush()?;
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("spool '{}' is closed", self.name),
        )
    }
}

/// Wrap a spool for sharing within the single-threaded build.
pub(crate) fn shared(spool: Spool) -> SharedSpool {
    Rc::new(RefCell::new(spool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_all() {
        let dir = tempdir().unwrap();
        let mut spool = Spool::create_in("install.sh", dir.path()).unwrap();

        spool.write_str("echo a\n").unwrap();
        spool.write_str("echo b\n").unwrap();

        assert_eq!(spool.read_all().unwrap(), "echo a\necho b\n");
        // Reading must not disturb subsequent appends.
        spool.write_str("echo c\n").unwrap();
        assert_eq!(spool.read_all().unwrap(), "echo a\necho b\necho c\n");
    }

    #[test]
    fn test_truncate_preserves_committed_prefix() {
        let dir = tempdir().unwrap();
        let mut spool = Spool::create_in("t", dir.path()).unwrap();

        spool.write_str("keep|drop").unwrap();
        spool.truncate_at(4).unwrap();
        spool.write_str("ed").unwrap();

        assert_eq!(spool.read_all().unwrap(), "keeped");
    }

    #[test]
    fn test_read_range() {
        let dir = tempdir().unwrap();
        let mut spool = Spool::create_in("t", dir.path()).unwrap();

        spool.write_str("0123456789").unwrap();

        assert_eq!(spool.read_range(2, 3).unwrap(), "234");
        // Over-long ranges read to the end.
        assert_eq!(spool.read_range(8, 100).unwrap(), "89");
    }

    #[test]
    fn test_close_is_idempotent_and_content_survives() {
        let dir = tempdir().unwrap();
        let mut spool = Spool::create_in("t", dir.path()).unwrap();

        spool.write_str("payload").unwrap();
        spool.close().unwrap();
        spool.close().unwrap();

        assert!(spool.is_closed());
        assert_eq!(spool.read_all().unwrap(), "payload");
        assert_eq!(std::fs::read_to_string(spool.path()).unwrap(), "payload");
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempdir().unwrap();
        let mut spool = Spool::create_in("t", dir.path()).unwrap();

        spool.close().unwrap();

        assert!(spool.write_str("late").is_err());
    }

    #[test]
    fn test_name_uses_target_basename() {
        let dir = tempdir().unwrap();
        let spool = Spool::create_in("scripts/setup.sh", dir.path()).unwrap();

        assert_eq!(spool.name(), "scripts/setup.sh");
        let file_name = spool.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("setup.sh."));
    }
}
