//! Resource resolution: symbolic names to readable fixture payloads.
//!
//! A name is tried against these strategies in order:
//!
//! 1. An explicit location (`file:...` or `jar:file:...!/entry`) is turned into a
//!    reference directly, without touching the filesystem. A `file:` location
//!    containing `!/` points inside an archive and is re-prefixed with `jar:`.
//! 2. The configured search roots, in order.
//! 3. The search roots again with a single leading `/` stripped.
//! 4. The name as a literal filesystem path.
//!
//! Exhausting every strategy is reported as `Ok(None)`, never as an error.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};
use zip::ZipArchive;

use crate::error::ResourceError;

pub const FILE_SCHEME: &str = "file:";
pub const ARCHIVE_SCHEME: &str = "jar:";
/// Separates the archive path from the entry path inside it.
pub const ARCHIVE_SEPARATOR: &str = "!/";

/// A resolved resource location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    File(PathBuf),
    ArchiveEntry { archive: PathBuf, entry: String },
}

impl ResourceRef {
    /// Location string in scheme form, e.g. `jar:file:/srv/fixtures.zip!/atl/mia.xml`.
    pub fn location(&self) -> String {
        match self {
            ResourceRef::File(path) => format!("{FILE_SCHEME}{}", path.display()),
            ResourceRef::ArchiveEntry { archive, entry } => format!(
                "{ARCHIVE_SCHEME}{FILE_SCHEME}{}{ARCHIVE_SEPARATOR}{entry}",
                archive.display()
            ),
        }
    }

    /// Read the resource as text, concatenating lines without separators.
    ///
    /// Line breaks are dropped, matching how recorded fixtures have always been
    /// loaded. The underlying file or archive handle is released on every exit path.
    pub fn read_concatenated(&self) -> Result<String, ResourceError> {
        match self {
            ResourceRef::File(path) => {
                let name = path.display().to_string();
                let file = File::open(path).map_err(|source| ResourceError::Read {
                    name: name.clone(),
                    source,
                })?;
                concat_lines(file, &name)
            }
            ResourceRef::ArchiveEntry { archive, entry } => {
                let file = File::open(archive).map_err(|source| ResourceError::Read {
                    name: archive.display().to_string(),
                    source,
                })?;
                let archive_error = |source| ResourceError::Archive {
                    archive: archive.clone(),
                    entry: entry.clone(),
                    source,
                };
                let mut zip = ZipArchive::new(file).map_err(archive_error)?;
                let reader = zip.by_name(entry).map_err(archive_error)?;
                concat_lines(reader, &self.location())
            }
        }
    }
}

/// `\n`, `\r\n` and a lone `\r` all end a line. Content must be UTF-8; anything
/// else fails the read with [`io::ErrorKind::InvalidData`].
fn concat_lines<R: Read>(mut reader: R, name: &str) -> Result<String, ResourceError> {
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .map_err(|source| ResourceError::Read {
            name: name.to_string(),
            source,
        })?;
    contents.retain(|c| c != '\n' && c != '\r');
    Ok(contents)
}

/// Resolves symbolic resource names against an ordered list of search roots.
#[derive(Debug, Clone, Default)]
pub struct ResourceResolver {
    roots: Vec<PathBuf>,
}

impl ResourceResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a name to a reference, or `Ok(None)` when no strategy finds it.
    pub fn resolve(&self, name: &str) -> Result<Option<ResourceRef>, ResourceError> {
        let result = self.try_resolve(name);
        match &result {
            Ok(Some(reference)) => debug!("Resolved {} to {}", name, reference.location()),
            Ok(None) => warn!("Unable to resolve resource {}", name),
            Err(e) => error!("Unable to resolve resource {}: {}", name, e),
        }
        result
    }

    fn try_resolve(&self, name: &str) -> Result<Option<ResourceRef>, ResourceError> {
        if let Some(reference) = parse_location(name)? {
            return Ok(Some(reference));
        }

        if let Some(found) = self.search(name)? {
            return Ok(Some(found));
        }

        if let Some(stripped) = name.strip_prefix('/') {
            if let Some(found) = self.search(stripped)? {
                return Ok(Some(found));
            }
        }

        let path = Path::new(name);
        if is_file(path)? {
            return Ok(Some(ResourceRef::File(path.to_path_buf())));
        }
        Ok(None)
    }

    fn search(&self, name: &str) -> Result<Option<ResourceRef>, ResourceError> {
        // Rooted names never match inside a search root.
        if name.is_empty() || Path::new(name).has_root() {
            return Ok(None);
        }
        for root in &self.roots {
            let candidate = root.join(name);
            if is_file(&candidate)? {
                return Ok(Some(ResourceRef::File(candidate)));
            }
        }
        Ok(None)
    }

    /// Resolve and read a resource as concatenated text.
    pub fn load_text(&self, name: &str) -> Result<String, ResourceError> {
        let reference = self
            .resolve(name)?
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))?;
        reference.read_concatenated().inspect_err(|e| {
            error!("Failed to read {}: {}", reference.location(), e);
        })
    }
}

fn is_file(path: &Path) -> Result<bool, ResourceError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ResourceError::Read {
            name: path.display().to_string(),
            source,
        }),
    }
}

/// Build a reference from an explicit `file:` or `jar:` location.
fn parse_location(name: &str) -> Result<Option<ResourceRef>, ResourceError> {
    if let Some(rest) = name.strip_prefix(ARCHIVE_SCHEME) {
        let rest = rest.strip_prefix(FILE_SCHEME).unwrap_or(rest);
        return match rest.split_once(ARCHIVE_SEPARATOR) {
            Some((archive, entry)) => archive_entry(name, archive, entry).map(Some),
            None => Err(ResourceError::Malformed(name.to_string())),
        };
    }

    if let Some(rest) = name.strip_prefix(FILE_SCHEME) {
        return match rest.split_once(ARCHIVE_SEPARATOR) {
            Some((archive, entry)) => archive_entry(name, archive, entry).map(Some),
            None => Ok(Some(ResourceRef::File(location_path(rest)))),
        };
    }

    Ok(None)
}

fn archive_entry(name: &str, archive: &str, entry: &str) -> Result<ResourceRef, ResourceError> {
    if archive.is_empty() || entry.is_empty() {
        return Err(ResourceError::Malformed(name.to_string()));
    }
    Ok(ResourceRef::ArchiveEntry {
        archive: location_path(archive),
        entry: entry.to_string(),
    })
}

/// `file:///srv/x` and `file:/srv/x` both denote `/srv/x`.
fn location_path(rest: &str) -> PathBuf {
    PathBuf::from(rest.strip_prefix("//").unwrap_or(rest))
}
