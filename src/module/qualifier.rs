/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Dotted module identity derived from a path.

use std::fmt;
use std::sync::Arc;

use dupe::Dupe;

use crate::module::handle::FileHandle;

#[derive(Debug, Clone, Dupe, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier(Arc<str>);

impl Qualifier {
    pub fn from_str(name: &str) -> Qualifier {
        Qualifier(Arc::from(name))
    }

    /// `a/b.py` and `a/b.pyi` both name module `a.b`; a package
    /// `a/__init__.py` names `a`.
    pub fn of_handle(handle: &FileHandle) -> Qualifier {
        let path = handle.as_str();
        let stem = path
            .strip_suffix(".pyi")
            .or_else(|| path.strip_suffix(".py"))
            .unwrap_or(path);
        let dotted = stem.replace('/', ".");
        let dotted = dotted.strip_suffix(".__init__").unwrap_or(&dotted);
        Qualifier(Arc::from(dotted))
    }

    /// The root-relative path of the module's source, given its suffix.
    pub fn to_relative_path(&self, stub: bool) -> String {
        let suffix = if stub { ".pyi" } else { ".py" };
        format!("{}{}", self.0.replace('.', "/"), suffix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
