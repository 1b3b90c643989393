use crate::{ContentPath, VfsError, VfsFile, VirtualFs};
use std::{
    fs::File,
    io::{self, Cursor, Read, Seek},
};
use tracing::debug;
use zip::{ZipArchive, result::ZipError};

trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

type Archive = ZipArchive<Box<dyn ReadSeek>>;

/// Reads local files and zip archives, including archives nested inside
/// other archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdVfs;

impl StdVfs {
    pub fn new() -> Self {
        Self
    }

    fn open_archive(&self, container: &ContentPath) -> Result<Archive, VfsError> {
        if !container.is_archive() {
            return Err(VfsError::NotAnArchive(container.to_string()));
        }

        let source: Box<dyn ReadSeek> = match container {
            ContentPath::Local(path) => Box::new(File::open(path).map_err(|source| VfsError::Io {
                path: container.to_string(),
                source,
            })?),
            ContentPath::Archive { .. } => {
                // Nested archives are read into memory; zip needs to seek.
                let data = self.read_member(container)?;
                Box::new(Cursor::new(data))
            }
            ContentPath::Remote { scheme, .. } => {
                return Err(VfsError::UnsupportedScheme(scheme.clone()));
            }
        };

        ZipArchive::new(source).map_err(|source| VfsError::Archive {
            path: container.to_string(),
            source,
        })
    }

    fn read_member(&self, path: &ContentPath) -> Result<Vec<u8>, VfsError> {
        let mut file = self.open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|source| VfsError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(data)
    }
}

impl VirtualFs for StdVfs {
    fn open(&self, path: &ContentPath) -> Result<VfsFile, VfsError> {
        match path {
            ContentPath::Local(local) => {
                let io_err = |source| VfsError::Io {
                    path: path.to_string(),
                    source,
                };
                let file = File::open(local).map_err(io_err)?;
                let len = file.metadata().map_err(io_err)?.len();
                Ok(VfsFile::new(len, file))
            }
            ContentPath::Archive { container, entry } => {
                let mut archive = self.open_archive(container)?;
                let member = archive.by_name(entry).map_err(|source| match source {
                    ZipError::FileNotFound => VfsError::EntryNotFound {
                        archive: container.to_string(),
                        entry: entry.clone(),
                    },
                    source => VfsError::Archive {
                        path: path.to_string(),
                        source,
                    },
                })?;

                let len = member.size();
                drop(member);
                // `by_name` succeeded above, so the entry is present.
                let index = archive
                    .index_for_name(entry)
                    .expect("archive entry located by name has an index");
                Ok(VfsFile::new(
                    len,
                    MemberReader {
                        archive: Some(archive),
                        index,
                        len,
                        path: path.to_string(),
                        data: Cursor::default(),
                    },
                ))
            }
            ContentPath::Remote { scheme, .. } => Err(VfsError::UnsupportedScheme(scheme.clone())),
        }
    }

    fn list_archive(&self, archive: &ContentPath) -> Result<Vec<ContentPath>, VfsError> {
        let mut zip = self.open_archive(archive)?;
        let mut members = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip.by_index(index).map_err(|source| VfsError::Archive {
                path: archive.to_string(),
                source,
            })?;
            if entry.is_file() {
                members.push(ContentPath::archive_member(archive.clone(), entry.name()));
            }
        }
        debug!("{archive} holds {} files", members.len());
        Ok(members)
    }
}

/// Decompresses an archive member on first read. Opening only looks up the
/// central directory, so callers can check the declared size first.
struct MemberReader {
    archive: Option<Archive>,
    index: usize,
    len: u64,
    path: String,
    data: Cursor<Vec<u8>>,
}

impl MemberReader {
    fn extract(&self, archive: &mut Archive) -> io::Result<Vec<u8>> {
        let mut member = archive.by_index(self.index).map_err(io::Error::other)?;
        let mut data = Vec::new();
        (&mut member).take(self.len).read_to_end(&mut data)?;
        // Reading to the end also verifies the checksum.
        if member.read(&mut [0u8; 1])? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is larger than its declared {} bytes", self.path, self.len),
            ));
        }
        debug!("extracted {} ({} of {} bytes)", self.path, data.len(), self.len);
        Ok(data)
    }
}

impl Read for MemberReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(mut archive) = self.archive.take() {
            self.data = Cursor::new(self.extract(&mut archive)?);
        }
        self.data.read(buf)
    }
}
