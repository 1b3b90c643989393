//! Uniform access to game content on disk, inside archives and behind other
//! schemes.

mod fs;
mod path;

pub use crate::fs::StdVfs;
pub use crate::path::{ARCHIVE_SCHEME, ContentPath};

use std::{fmt, io};

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("no virtual filesystem for {0}://")]
    UnsupportedScheme(String),
    #[error("{0} is not an archive")]
    NotAnArchive(String),
    #[error("{entry} not found in {archive}")]
    EntryNotFound { archive: String, entry: String },
    #[error("invalid content path {0:?}")]
    InvalidPath(String),
}

/// An opened file together with the length the filesystem reported for it.
pub struct VfsFile {
    len: u64,
    reader: Box<dyn io::Read + Send>,
}

impl VfsFile {
    pub fn new(len: u64, reader: impl io::Read + Send + 'static) -> Self {
        Self {
            len,
            reader: Box::new(reader),
        }
    }

    /// Declared length. The reader may deliver fewer bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl io::Read for VfsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for VfsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsFile").field("len", &self.len).finish()
    }
}

/// Read access to content locations.
pub trait VirtualFs: Send + Sync {
    fn open(&self, path: &ContentPath) -> Result<VfsFile, VfsError>;

    /// Lists the files stored in `archive`, in archive order. Directories are
    /// not listed.
    fn list_archive(&self, archive: &ContentPath) -> Result<Vec<ContentPath>, VfsError>;
}

#[cfg(test)]
mod tests;
