use crate::VfsError;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const ARCHIVE_SCHEME: &str = "zip";

/// Where a piece of content lives.
///
/// Archive members are written as `zip://<container>#<entry>`. The container
/// may itself be an archive member, so the entry is always split off at the
/// last `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentPath {
    /// A plain path on a local filesystem.
    Local(PathBuf),
    /// A file stored inside an archive.
    Archive {
        container: Box<ContentPath>,
        entry: String,
    },
    /// Anything reached through a protocol the host does not read itself.
    Remote { scheme: String, location: String },
}

impl ContentPath {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        ContentPath::Local(path.into())
    }

    pub fn archive_member(container: ContentPath, entry: impl Into<String>) -> Self {
        ContentPath::Archive {
            container: Box::new(container),
            entry: entry.into(),
        }
    }

    /// `None` for local paths.
    pub fn scheme(&self) -> Option<&str> {
        match self {
            ContentPath::Local(_) => None,
            ContentPath::Archive { .. } => Some(ARCHIVE_SCHEME),
            ContentPath::Remote { scheme, .. } => Some(scheme),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ContentPath::Local(_))
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            ContentPath::Local(path) => Some(path),
            _ => None,
        }
    }

    /// The last path component.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            ContentPath::Local(path) => path.file_name().and_then(|name| name.to_str()),
            ContentPath::Archive { entry, .. } => last_segment(entry),
            ContentPath::Remote { location, .. } => last_segment(location),
        }
    }

    /// Extension of the last component including the dot (".nes"), with the
    /// original case.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(0) | None => None,
            Some(dot) => Some(name[dot..].to_string()),
        }
    }

    /// `true` if the extension names an archive this host can enter.
    pub fn is_archive(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ext[1..].eq_ignore_ascii_case(ARCHIVE_SCHEME))
    }

    /// For archive members, the archive and the path inside it.
    pub fn container(&self) -> Option<(&ContentPath, &str)> {
        match self {
            ContentPath::Archive { container, entry } => Some((container, entry)),
            _ => None,
        }
    }
}

fn last_segment(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentPath::Local(path) => write!(f, "{}", path.display()),
            ContentPath::Archive { container, entry } => {
                write!(f, "{ARCHIVE_SCHEME}://{container}#{entry}")
            }
            ContentPath::Remote { scheme, location } => write!(f, "{scheme}://{location}"),
        }
    }
}

impl FromStr for ContentPath {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((scheme, rest)) = s.split_once("://") else {
            return Ok(ContentPath::Local(PathBuf::from(s)));
        };

        // Drive letters and other single characters are not schemes.
        if scheme.len() < 2 || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(ContentPath::Local(PathBuf::from(s)));
        }

        if scheme.eq_ignore_ascii_case(ARCHIVE_SCHEME) {
            let (container, entry) = rest
                .rsplit_once('#')
                .filter(|(container, entry)| !container.is_empty() && !entry.is_empty())
                .ok_or_else(|| VfsError::InvalidPath(s.to_string()))?;
            return Ok(ContentPath::archive_member(container.parse()?, entry));
        }

        Ok(ContentPath::Remote {
            scheme: scheme.to_ascii_lowercase(),
            location: rest.to_string(),
        })
    }
}

impl From<PathBuf> for ContentPath {
    fn from(path: PathBuf) -> Self {
        ContentPath::Local(path)
    }
}

impl From<&Path> for ContentPath {
    fn from(path: &Path) -> Self {
        ContentPath::Local(path.to_path_buf())
    }
}
