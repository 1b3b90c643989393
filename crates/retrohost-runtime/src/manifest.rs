//! `addon.xml` manifests describing an installed game client.

use quick_xml::{
    Reader,
    escape::{EscapeError, unescape},
    events::{BytesStart, Event, attributes::AttrError},
};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::Utf8Error,
};
use tracing::debug;

pub const MANIFEST_FILE: &str = "addon.xml";

/// Extension point a game client registers under.
pub const GAME_CLIENT_POINT: &str = "xbmc.gameclient";

#[cfg(target_os = "android")]
const PLATFORM_KEYS: &[&str] = &["android"];
#[cfg(all(target_os = "linux", not(target_os = "android")))]
const PLATFORM_KEYS: &[&str] = &["linux"];
#[cfg(target_os = "macos")]
const PLATFORM_KEYS: &[&str] = &["osx"];
#[cfg(windows)]
const PLATFORM_KEYS: &[&str] = &["wingl", "windx"];
#[cfg(not(any(target_os = "android", target_os = "linux", target_os = "macos", windows)))]
const PLATFORM_KEYS: &[&str] = &[];

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("malformed escape sequence: {0}")]
    Escape(#[from] EscapeError),
    #[error("manifest is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("addon has no id")]
    MissingId,
    #[error("addon {0} does not provide a game client")]
    NotAGameClient(String),
    #[error("game client {0} declares no library for this platform")]
    NoLibrary(String),
}

/// What an addon manifest says about its game client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddonManifest {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    /// The generic `library` attribute.
    pub library: Option<String>,
    /// `library_<platform>` attributes, keyed by platform.
    pub platform_libraries: BTreeMap<String, String>,
    pub platforms: Vec<String>,
    /// Extension hints from the manifest, as written.
    pub extensions: Vec<String>,
    /// Directory the manifest was loaded from.
    pub base_dir: Option<PathBuf>,
}

#[derive(Clone, Copy)]
enum TextField {
    Platforms,
    Extensions,
}

impl AddonManifest {
    /// Reads `addon.xml` from an addon directory.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let xml = fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let mut manifest = Self::parse(&xml)?;
        manifest.base_dir = Some(dir.to_path_buf());
        Ok(manifest)
    }

    pub fn parse(xml: &str) -> Result<Self, ManifestError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut manifest = AddonManifest::default();
        let mut has_id = false;
        let mut is_game_client = false;
        let mut in_client = false;
        let mut field: Option<(TextField, String)> = None;

        loop {
            let event = reader.read_event()?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_start = matches!(event, Event::Start(_));
                    match e.name().as_ref() {
                        b"addon" => {
                            let attrs = attributes(e)?;
                            if let Some(id) = attrs.get("id") {
                                manifest.id = id.clone();
                                has_id = true;
                            }
                            manifest.name = attrs.get("name").cloned();
                            manifest.version = attrs.get("version").cloned();
                        }
                        b"extension" => {
                            let mut attrs = attributes(e)?;
                            if attrs.get("point").map(String::as_str) == Some(GAME_CLIENT_POINT) {
                                is_game_client = true;
                                in_client = is_start;
                                manifest.library = attrs.remove("library");
                                manifest.platform_libraries = attrs
                                    .into_iter()
                                    .filter_map(|(key, value)| {
                                        key.strip_prefix("library_")
                                            .map(|platform| (platform.to_string(), value))
                                    })
                                    .collect();
                            }
                        }
                        b"platforms" if in_client && is_start => {
                            field = Some((TextField::Platforms, String::new()));
                        }
                        b"extensions" if in_client && is_start => {
                            field = Some((TextField::Extensions, String::new()));
                        }
                        _ => {}
                    }
                }
                Event::Text(text) => {
                    if let Some((_, value)) = field.as_mut() {
                        value.push_str(&unescape(std::str::from_utf8(&text)?)?);
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"extension" => in_client = false,
                    b"platforms" | b"extensions" => {
                        if let Some((kind, value)) = field.take() {
                            let list = split_list(&value);
                            match kind {
                                TextField::Platforms => manifest.platforms = list,
                                TextField::Extensions => manifest.extensions = list,
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !has_id || manifest.id.is_empty() {
            return Err(ManifestError::MissingId);
        }
        if !is_game_client {
            return Err(ManifestError::NotAGameClient(manifest.id));
        }
        debug!(
            "parsed manifest for {} ({} platforms)",
            manifest.id,
            manifest.platforms.len()
        );
        Ok(manifest)
    }

    /// File name of the core library for the running platform.
    ///
    /// The generic `library` attribute wins; the platform specific attribute
    /// is only consulted when it is missing.
    pub fn library_name(&self) -> Option<&str> {
        self.library_name_for(PLATFORM_KEYS)
    }

    pub fn library_name_for(&self, platforms: &[&str]) -> Option<&str> {
        self.library
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| {
                platforms.iter().find_map(|platform| {
                    self.platform_libraries
                        .get(*platform)
                        .map(String::as_str)
                        .filter(|name| !name.is_empty())
                })
            })
    }

    /// Path of the core library, relative to the addon directory.
    pub fn library_path(&self) -> Result<PathBuf, ManifestError> {
        let name = self
            .library_name()
            .ok_or_else(|| ManifestError::NoLibrary(self.id.clone()))?;
        Ok(match &self.base_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        })
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>, ManifestError> {
    let mut attrs = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = unescape(std::str::from_utf8(&attr.value)?)?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Splits a pipe-separated list, trimming entries and dropping empty ones.
fn split_list(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
