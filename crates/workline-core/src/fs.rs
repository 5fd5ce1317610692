//! Bulk file I/O.
//!
//! Transfers loop internally so no single OS call exceeds [`MAX_TRANSFER`]
//! bytes. A transfer either completes in full or fails; there is no
//! partial-success result.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Largest byte count handed to a single read or write call.
pub const MAX_TRANSFER: usize = u32::MAX as usize;

/// Reference point for [`FileHandle::seek_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset from the start of the file.
    Begin,
    /// Offset from the current position.
    Current,
    /// Offset from the end of the file.
    End,
}

/// An open file with chunked bulk transfers.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
}

impl FileHandle {
    /// Open an existing file for reading.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Create a file for writing, truncating it if it already exists.
    pub fn create_write(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path this handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor position.
    pub fn position(&mut self) -> Result<u64> {
        self.file
            .stream_position()
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Move the cursor. Returns the new absolute position.
    pub fn seek_to(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let target = match origin {
            SeekOrigin::Begin => SeekFrom::Start(u64::try_from(offset).map_err(|_| {
                Error::InvalidSeek(format!("negative offset {offset} from start"))
            })?),
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        self.file.seek(target).map_err(|e| Error::io(&self.path, e))
    }

    /// Size of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Check if the file is empty.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Fill `buffer` completely from the current position.
    pub fn read_chunked(&mut self, buffer: &mut [u8]) -> Result<()> {
        for chunk in buffer.chunks_mut(MAX_TRANSFER) {
            self.file
                .read_exact(chunk)
                .map_err(|e| Error::io(&self.path, e))?;
        }
        Ok(())
    }

    /// Write all of `buffer` at the current position.
    pub fn write_chunked(&mut self, buffer: &[u8]) -> Result<()> {
        for chunk in buffer.chunks(MAX_TRANSFER) {
            self.file
                .write_all(chunk)
                .map_err(|e| Error::io(&self.path, e))?;
        }
        Ok(())
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(MAX_TRANSFER);
        self.file.write(&buf[..len])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Read a whole file into an owned buffer.
pub fn read_entire_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let mut handle = FileHandle::open_read(path)?;
    let len = usize::try_from(handle.len()?)
        .map_err(|_| Error::InvalidSeek(format!("{} does not fit in memory", handle.path.display())))?;
    let mut data = vec![0u8; len];
    handle.read_chunked(&mut data)?;
    Ok(data)
}

/// Create or truncate `path` and write `data` to it.
pub fn write_entire_file(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let mut handle = FileHandle::create_write(path)?;
    handle.write_chunked(data)
}
