//! Compound file identity: `"{package}#{namespace}#{filename}.{version}"`.
//!
//! The string form identifies a versioned file both on the wire (package
//! file lists, dependency lists) and as a local cache key. Filenames may
//! contain dots; the version is always the text after the *last* dot.

use crate::error::CommError;
use std::fmt;
use std::str::FromStr;

/// A file's repository identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub package: String,
    pub namespace: String,
    pub filename: String,
    pub version: u32,
}

impl FileKey {
    pub fn new(
        package: impl Into<String>,
        namespace: impl Into<String>,
        filename: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            package: package.into(),
            namespace: namespace.into(),
            filename: filename.into(),
            version,
        }
    }

    /// Parse the canonical string form. Exactly three `#`-separated parts;
    /// the version is split off the third part at its last `.`.
    pub fn parse(key: &str) -> Result<Self, CommError> {
        let invalid = || CommError::InvalidFileKey(key.to_string());

        let mut parts = key.split('#');
        let (package, namespace, tail) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(package), Some(namespace), Some(tail), None) => (package, namespace, tail),
            _ => return Err(invalid()),
        };

        let (filename, version) = tail.rsplit_once('.').ok_or_else(invalid)?;
        if package.is_empty() || namespace.is_empty() || filename.is_empty() {
            return Err(invalid());
        }
        let version = version.parse().map_err(|_| invalid())?;

        Ok(Self::new(package, namespace, filename, version))
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}#{}.{}",
            self.package, self.namespace, self.filename, self.version
        )
    }
}

impl FromStr for FileKey {
    type Err = CommError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Typed result of a `get-file-metadata` request.
#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    pub author: String,
    pub description: String,
    pub dependencies: Vec<FileKey>,
}
