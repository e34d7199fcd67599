/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Rage: collect recent log excerpts so a client can attach them to a bug
//! report.

use std::path::Path;

use serde::Serialize;

const MAX_SECTIONS: usize = 4;
const MAX_LINES_PER_SECTION: usize = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RageSection {
    pub title: String,
    pub contents: String,
}

/// The newest log files under `log_directory`, tail-limited. Missing or
/// unreadable directories yield no sections; rage never fails.
pub fn collect(log_directory: Option<&Path>) -> Vec<RageSection> {
    let Some(directory) = log_directory else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(directory) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .collect();
    files.sort_by(|a, b| b.0.cmp(&a.0));
    files
        .into_iter()
        .take(MAX_SECTIONS)
        .filter_map(|(_, path)| {
            let contents = std::fs::read_to_string(&path).ok()?;
            let lines: Vec<&str> = contents.lines().collect();
            let tail_start = lines.len().saturating_sub(MAX_LINES_PER_SECTION);
            Some(RageSection {
                title: path.file_name()?.to_string_lossy().into_owned(),
                contents: lines[tail_start..].join("\n"),
            })
        })
        .collect()
}
