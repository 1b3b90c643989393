//! Deciding how a requested file is presented to a core.
//!
//! Cores describe what they accept with a list of extensions and a couple of
//! flags, and that description is often wrong. Each [`LoadingStrategy`] checks
//! whether it can present the file under the declared capabilities; the
//! [`Resolver`] tries them in order and moves on whenever the core rejects what
//! it was handed.

use crate::types::ReadError;
use libretro_host::{ARCHIVE_EXTENSION, CoreCapabilities, GameDescriptor};
use retrohost_vfs::{ContentPath, VfsError, VirtualFs};
use std::{fmt, io::Read, path::PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingStrategy {
    /// Hand the core the local path of the file.
    UseLocalPath,
    /// Hand the core the path of the archive the file sits in.
    UseContainingArchive,
    /// Read the file into memory.
    UseVirtualFilesystemBuffer,
    /// Read the first suitable member of an archive into memory.
    UseArchiveMember,
}

/// Direct strategies first, then their in-memory counterparts.
pub const DEFAULT_ORDER: [LoadingStrategy; 4] = [
    LoadingStrategy::UseLocalPath,
    LoadingStrategy::UseContainingArchive,
    LoadingStrategy::UseVirtualFilesystemBuffer,
    LoadingStrategy::UseArchiveMember,
];

/// Trial order. Preferring the virtual filesystem swaps the direct pair with
/// the in-memory pair, position by position.
pub fn strategy_order(prefer_vfs: bool) -> [LoadingStrategy; 4] {
    let mut order = DEFAULT_ORDER;
    if prefer_vfs {
        order.swap(0, 2);
        order.swap(1, 3);
    }
    order
}

impl fmt::Display for LoadingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadingStrategy::UseLocalPath => "local path",
            LoadingStrategy::UseContainingArchive => "containing archive",
            LoadingStrategy::UseVirtualFilesystemBuffer => "VFS buffer",
            LoadingStrategy::UseArchiveMember => "archive member",
        };
        f.write_str(name)
    }
}

/// What a strategy chose to present, before anything is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Buffer(ContentPath),
}

/// A strategy that found a way to present the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub strategy: LoadingStrategy,
    pub source: Source,
}

impl Candidate {
    /// Builds the descriptor for the core's load call.
    pub fn materialize(
        &self,
        vfs: &dyn VirtualFs,
        max_buffer_len: u64,
    ) -> Result<GameDescriptor, ReadError> {
        match &self.source {
            Source::Path(path) => {
                info!("loading {} from disk", path.display());
                Ok(GameDescriptor::Path(path.clone()))
            }
            Source::Buffer(path) => {
                let data = read_content(vfs, path, max_buffer_len)?;
                info!("loading {path} from VFS ({} KB)", data.len() / 1024);
                Ok(GameDescriptor::Buffer(data))
            }
        }
    }
}

fn extension_valid(capabilities: &CoreCapabilities, file: &ContentPath) -> bool {
    capabilities.is_extension_valid(file.extension().as_deref().unwrap_or_default())
}

impl LoadingStrategy {
    /// Checks whether this strategy can present `file` to a core with the
    /// given capabilities.
    pub fn can_present(
        self,
        capabilities: &CoreCapabilities,
        file: &ContentPath,
        vfs: &dyn VirtualFs,
    ) -> Option<Candidate> {
        let source = match self {
            LoadingStrategy::UseLocalPath => {
                let Some(path) = file.as_local() else {
                    info!("{self}: file is not local (or is inside an archive)");
                    return None;
                };
                if !extension_valid(capabilities, file) {
                    info!("{self}: extension of {file} is not valid");
                    return None;
                }
                Source::Path(path.to_path_buf())
            }
            LoadingStrategy::UseContainingArchive => {
                let Some((container, entry)) = file.container() else {
                    info!("{self}: file is not in an archive");
                    return None;
                };
                if !capabilities.is_extension_valid(ARCHIVE_EXTENSION) {
                    info!("{self}: core does not accept archives");
                    return None;
                }
                if entry.trim_start_matches('/').contains('/') {
                    info!("{self}: file is not in the root folder of the archive");
                    return None;
                }
                let Some(archive) = container.as_local() else {
                    info!("{self}: archive is not on a local filesystem");
                    return None;
                };
                Source::Path(archive.to_path_buf())
            }
            LoadingStrategy::UseVirtualFilesystemBuffer => {
                if !capabilities.allows_vfs {
                    info!("{self}: core needs a full path");
                    return None;
                }
                if !extension_valid(capabilities, file) {
                    info!("{self}: extension of {file} is not valid");
                    return None;
                }
                Source::Buffer(file.clone())
            }
            LoadingStrategy::UseArchiveMember => {
                if !file.is_archive() {
                    info!("{self}: file is not an archive");
                    return None;
                }
                if !capabilities.allows_vfs {
                    info!("{self}: core needs a full path");
                    return None;
                }
                let members = match vfs.list_archive(file) {
                    Ok(members) => members,
                    Err(err) => {
                        warn!("{self}: cannot list {file}: {err}");
                        return None;
                    }
                };
                let Some(member) = members
                    .into_iter()
                    .find(|member| extension_valid(capabilities, member))
                else {
                    info!("{self}: archive has no file with a valid extension");
                    return None;
                };
                Source::Buffer(member)
            }
        };

        Some(Candidate {
            strategy: self,
            source,
        })
    }
}

/// Reads a whole file through the virtual filesystem.
pub fn read_content(
    vfs: &dyn VirtualFs,
    path: &ContentPath,
    max_buffer_len: u64,
) -> Result<Vec<u8>, ReadError> {
    let file = vfs.open(path)?;
    let len = file.len();
    if len == 0 {
        return Err(ReadError::EmptyFile(path.to_string()));
    }
    if len > max_buffer_len {
        return Err(ReadError::TooLarge {
            path: path.to_string(),
            len,
            limit: max_buffer_len,
        });
    }

    let mut data = Vec::with_capacity(len as usize);
    file.take(len)
        .read_to_end(&mut data)
        .map_err(|source| VfsError::Io {
            path: path.to_string(),
            source,
        })?;
    if (data.len() as u64) < len {
        return Err(ReadError::ShortRead {
            path: path.to_string(),
            read: data.len(),
            expected: len,
        });
    }
    Ok(data)
}

/// The outcome of a successful resolution.
#[derive(Debug)]
pub struct Resolved {
    pub strategy: LoadingStrategy,
    /// The descriptor the core accepted. Must outlive the loaded game.
    pub game: GameDescriptor,
}

/// Tries strategies in order until the core accepts one.
pub struct Resolver<'a> {
    vfs: &'a dyn VirtualFs,
    capabilities: &'a CoreCapabilities,
    order: [LoadingStrategy; 4],
    max_buffer_len: u64,
}

impl<'a> Resolver<'a> {
    pub fn new(
        vfs: &'a dyn VirtualFs,
        capabilities: &'a CoreCapabilities,
        prefer_vfs: bool,
        max_buffer_len: u64,
    ) -> Self {
        Self {
            vfs,
            capabilities,
            order: strategy_order(prefer_vfs),
            max_buffer_len,
        }
    }

    pub fn order(&self) -> &[LoadingStrategy; 4] {
        &self.order
    }

    /// Runs the trial. `load` hands a descriptor to the core and reports
    /// whether the core accepted it.
    pub fn resolve(
        &self,
        file: &ContentPath,
        mut load: impl FnMut(&GameDescriptor) -> bool,
    ) -> Option<Resolved> {
        for strategy in self.order {
            let Some(candidate) = strategy.can_present(self.capabilities, file, self.vfs) else {
                continue;
            };

            let game = match candidate.materialize(self.vfs, self.max_buffer_len) {
                Ok(game) => game,
                Err(err) => {
                    error!("{strategy}: {err}");
                    continue;
                }
            };

            if load(&game) {
                info!("core loaded {file} using {strategy}");
                return Some(Resolved { strategy, game });
            }
            info!("{strategy}: core failed to load game");
        }
        None
    }
}
