/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The parser service: reads and parses a batch of files in parallel and
//! populates the shared heap with the survivors.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::heap::SharedHeap;
use crate::module::handle::FileHandle;
use crate::parse::parser::parse_module;
use crate::scheduler::Scheduler;

/// Parse every handle's file. Files that cannot be read or parsed are
/// dropped; the returned handles are exactly the ones now present in the
/// heap.
pub fn parse_sources(
    scheduler: &Scheduler,
    source_root: &Path,
    handles: Vec<FileHandle>,
    heap: &mut SharedHeap,
) -> Vec<FileHandle> {
    let parsed = scheduler.map(handles, |handle| {
        let path = handle.to_path(source_root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) => {
                warn!("Could not read `{}`: {error}", path.display());
                return None;
            }
        };
        match parse_module(handle.clone(), Arc::new(text)) {
            Ok(source) => Some(Arc::new(source)),
            Err(error) => {
                warn!(
                    "Could not parse `{}` at line {}: {}",
                    handle, error.line, error.message
                );
                None
            }
        }
    });
    let mut survivors = Vec::new();
    for source in parsed.into_iter().flatten() {
        survivors.push(source.handle.clone());
        heap.store_source(source);
    }
    survivors
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_sources_drops_unreadable_and_unparsable() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("good.py"), "x = 1\n").unwrap();
        std::fs::write(root.path().join("bad.py"), "while True:\n    pass\n").unwrap();
        let handles: Vec<FileHandle> = ["good.py", "bad.py", "missing.py"]
            .iter()
            .map(|name| FileHandle::new(Path::new(name), root.path()).unwrap())
            .collect();
        let mut heap = SharedHeap::new(1 << 20);
        let scheduler = Scheduler::new(NonZeroUsize::new(2).unwrap());
        let survivors = parse_sources(&scheduler, root.path(), handles, &mut heap);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].as_str(), "good.py");
        assert!(heap.get_source(&survivors[0]).is_some());
    }
}
