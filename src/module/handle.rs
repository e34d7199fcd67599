/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Canonical project-relative identity of a source file.

use std::fmt;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use dupe::Dupe;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// A canonical `source_root`-relative path. Two handles are equal iff their
/// normalized relative strings are equal.
#[derive(Debug, Clone, Dupe, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(Arc<str>);

impl FileHandle {
    /// Root an absolute path at `source_root`. Paths outside the root yield
    /// `None`. A relative path is accepted as already rooted.
    pub fn new(path: &Path, source_root: &Path) -> Option<FileHandle> {
        let relative = if path.is_absolute() {
            path.strip_prefix(source_root).ok()?
        } else {
            path
        };
        let mut normalized = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => normalized.push(part.to_str()?),
                Component::CurDir => {}
                // A `..` would escape the root.
                _ => return None,
            }
        }
        if normalized.is_empty() {
            return None;
        }
        Some(FileHandle(Arc::from(normalized.join("/"))))
    }

    /// Group an error under the handle of the file it was reported against.
    pub fn from_error(error: &crate::error::Error) -> FileHandle {
        FileHandle(Arc::from(error.path.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path(&self, source_root: &Path) -> PathBuf {
        source_root.join(self.0.as_ref())
    }

    pub fn is_stub(&self) -> bool {
        self.0.ends_with(".pyi")
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FileHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FileHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(FileHandle(Arc::from(s.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooting() {
        let root = Path::new("/project/src");
        assert_eq!(
            FileHandle::new(Path::new("/project/src/a/b.py"), root)
                .unwrap()
                .as_str(),
            "a/b.py"
        );
        assert_eq!(
            FileHandle::new(Path::new("a/b.py"), root).unwrap().as_str(),
            "a/b.py"
        );
        assert!(FileHandle::new(Path::new("/elsewhere/b.py"), root).is_none());
        assert!(FileHandle::new(Path::new("../escape.py"), root).is_none());
    }

    #[test]
    fn test_equality_is_on_normalized_strings() {
        let root = Path::new("/project");
        let a = FileHandle::new(Path::new("/project/./a.py"), root).unwrap();
        let b = FileHandle::new(Path::new("a.py"), root).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stub_suffix() {
        let root = Path::new("/project");
        assert!(FileHandle::new(Path::new("a.pyi"), root).unwrap().is_stub());
        assert!(!FileHandle::new(Path::new("a.py"), root).unwrap().is_stub());
    }
}
