/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Suppression comments. Registered per handle after repopulation so the
//! checker can drop diagnostics on suppressed lines.

use starlark_map::small_set::SmallSet;

use crate::heap::SharedHeap;
use crate::module::handle::FileHandle;

const MARKERS: &[&str] = &["# type: ignore", "# pyre-ignore", "# pyre-fixme"];

/// Scan the registered sources of `handles` and record their suppressed
/// lines in the shared heap.
pub fn register(handles: &[FileHandle], heap: &mut SharedHeap) {
    let mut collected = Vec::new();
    for handle in handles {
        let Some(source) = heap.get_source(handle) else {
            continue;
        };
        let mut lines = SmallSet::new();
        for (i, line) in source.text.lines().enumerate() {
            if MARKERS.iter().any(|marker| line.contains(marker)) {
                lines.insert(i + 1);
            }
        }
        collected.push((handle.clone(), lines));
    }
    for (handle, lines) in collected {
        heap.register_ignores(handle, lines);
    }
}
