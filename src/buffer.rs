//! The text sink a recipe renders through.
//!
//! One type, two backings: the root target of a recipe writes through to a
//! registered package spool, while `capture` swaps in a plain in-memory
//! buffer. Rendering code never cares which one is active.

use std::io;

use crate::spool::SharedSpool;

/// Growable, flushable, truncatable text sink.
#[derive(Debug)]
pub struct Buffer {
    backing: Backing,
}

#[derive(Debug)]
enum Backing {
    Memory(String),
    Spool(SharedSpool),
}

impl Buffer {
    /// An empty in-memory buffer, as installed by `capture`.
    pub fn memory() -> Self {
        Self {
            backing: Backing::Memory(String::new()),
        }
    }

    /// A buffer writing through to a package spool.
    pub fn spool(handle: SharedSpool) -> Self {
        Self {
            backing: Backing::Spool(handle),
        }
    }

    /// Append text.
    pub fn write(&mut self, text: &str) -> io::Result<()> {
        match &mut self.backing {
            Backing::Memory(data) => {
                data.push_str(text);
                Ok(())
            }
            Backing::Spool(handle) => handle.borrow_mut().write_str(text),
        }
    }

    /// Append text as a line.
    ///
    /// A newline is added only when the text doesn't already end with one,
    /// so writing back a captured block never doubles its final newline.
    pub fn writeln(&mut self, text: &str) -> io::Result<()> {
        self.write(text)?;
        if !text.ends_with('\n') {
            self.write("\n")?;
        }
        Ok(())
    }

    /// Push buffered writes through to the backing store.
    pub fn flush(&mut self) -> io::Result<()> {
        match &mut self.backing {
            Backing::Memory(_) => Ok(()),
            Backing::Spool(handle) => handle.borrow_mut().flush(),
        }
    }

    /// Flush, then return the full logical content.
    pub fn flush_read_all(&mut self) -> io::Result<String> {
        match &mut self.backing {
            Backing::Memory(data) => Ok(data.clone()),
            Backing::Spool(handle) => handle.borrow_mut().read_all(),
        }
    }

    /// Discard everything from byte position `pos` to the end.
    ///
    /// Content before `pos` is never altered.
    pub fn truncate_at(&mut self, pos: usize) -> io::Result<()> {
        match &mut self.backing {
            Backing::Memory(data) => {
                if pos > data.len() {
                    return Ok(());
                }
                if !data.is_char_boundary(pos) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("truncation at byte {pos} splits a character"),
                    ));
                }
                data.truncate(pos);
                Ok(())
            }
            Backing::Spool(handle) => handle.borrow_mut().truncate_at(pos as u64),
        }
    }

    /// Read `length` bytes starting at byte `offset`.
    pub fn read_range(&mut self, offset: usize, length: usize) -> io::Result<String> {
        match &mut self.backing {
            Backing::Memory(data) => {
                let start = offset.min(data.len());
                let end = (offset + length).min(data.len());
                if !data.is_char_boundary(start) || !data.is_char_boundary(end) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "range splits a character",
                    ));
                }
                Ok(data[start..end].to_string())
            }
            Backing::Spool(handle) => {
                handle.borrow_mut().read_range(offset as u64, length as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_appends() {
        let mut buf = Buffer::memory();
        buf.write("a").unwrap();
        buf.write("b").unwrap();
        assert_eq!(buf.flush_read_all().unwrap(), "ab");
    }

    #[test]
    fn test_writeln_adds_newline_once() {
        let mut buf = Buffer::memory();
        buf.writeln("a").unwrap();
        buf.writeln("b\n").unwrap();
        buf.writeln("").unwrap();
        assert_eq!(buf.flush_read_all().unwrap(), "a\nb\n\n");
    }

    #[test]
    fn test_truncate_at() {
        let mut buf = Buffer::memory();
        buf.write("keep|drop").unwrap();
        buf.truncate_at(4).unwrap();
        assert_eq!(buf.flush_read_all().unwrap(), "keep");
        // Truncation past the end is a no-op.
        buf.truncate_at(100).unwrap();
        assert_eq!(buf.flush_read_all().unwrap(), "keep");
    }

    #[test]
    fn test_read_range_clamps() {
        let mut buf = Buffer::memory();
        buf.write("0123456789").unwrap();
        assert_eq!(buf.read_range(2, 3).unwrap(), "234");
        assert_eq!(buf.read_range(8, 100).unwrap(), "89");
    }

    #[test]
    fn test_spool_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let spool = crate::spool::Spool::create_in("t", dir.path()).unwrap();
        let handle = crate::spool::shared(spool);

        let mut buf = Buffer::spool(handle.clone());
        buf.writeln("line").unwrap();
        assert_eq!(buf.flush_read_all().unwrap(), "line\n");
        assert_eq!(handle.borrow_mut().read_all().unwrap(), "line\n");
    }
}
