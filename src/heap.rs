/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Process-wide storage of parsed sources and memoized analysis facts.
//!
//! Only the dispatcher writes here (via the parser and checker services);
//! workers read. The heap tracks an estimate of its own footprint so the
//! dispatcher can trigger compaction before large rechecks.

use std::sync::Arc;

use starlark_map::small_map::SmallMap;
use starlark_map::small_set::SmallSet;

use crate::module::handle::FileHandle;
use crate::module::qualifier::Qualifier;
use crate::parse::ast::ParsedSource;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectMode {
    /// Drop every memoized table that can be recomputed on demand.
    Aggressive,
}

/// A resolved top-level define: parameter types and return type, as the
/// checker last established them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineSignature {
    pub parameters: Vec<Type>,
    pub returns: Type,
}

#[derive(Debug)]
pub struct SharedHeap {
    sources: SmallMap<FileHandle, Arc<ParsedSource>>,
    /// `(qualifier, define name)` -> last resolved signature.
    type_resolution: SmallMap<(Qualifier, String), DefineSignature>,
    /// Process-wide memo of flattened class attributes; cleared before every
    /// repopulation.
    class_attributes: SmallMap<String, Arc<Vec<(String, Type)>>>,
    /// Per-handle suppressed lines, fed by the ignore registrar.
    ignores: SmallMap<FileHandle, SmallSet<usize>>,
    budget_bytes: usize,
}

impl SharedHeap {
    pub fn new(budget_bytes: usize) -> SharedHeap {
        SharedHeap {
            sources: SmallMap::new(),
            type_resolution: SmallMap::new(),
            class_attributes: SmallMap::new(),
            ignores: SmallMap::new(),
            budget_bytes: budget_bytes.max(1),
        }
    }

    pub fn get_source(&self, handle: &FileHandle) -> Option<Arc<ParsedSource>> {
        self.sources.get(handle).cloned()
    }

    pub fn store_source(&mut self, source: Arc<ParsedSource>) {
        self.sources.insert(source.handle.clone(), source);
    }

    pub fn remove_paths(&mut self, handles: &[FileHandle]) {
        for handle in handles {
            self.sources.shift_remove(handle);
            self.ignores.shift_remove(handle);
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<ParsedSource>> {
        self.sources.values()
    }

    // Type-resolution table.

    pub fn resolve_define(&self, qualifier: &Qualifier, name: &str) -> Option<&DefineSignature> {
        self.type_resolution
            .get(&(qualifier.clone(), name.to_owned()))
    }

    pub fn record_define(&mut self, qualifier: Qualifier, name: String, signature: DefineSignature) {
        self.type_resolution.insert((qualifier, name), signature);
    }

    pub fn clear_define(&mut self, qualifier: &Qualifier, name: &str) {
        self.type_resolution
            .shift_remove(&(qualifier.clone(), name.to_owned()));
    }

    // Class-attribute memo.

    pub fn memoized_class_attributes(&self, class: &str) -> Option<Arc<Vec<(String, Type)>>> {
        self.class_attributes.get(class).cloned()
    }

    pub fn memoize_class_attributes(&mut self, class: String, attributes: Arc<Vec<(String, Type)>>) {
        self.class_attributes.insert(class, attributes);
    }

    pub fn clear_class_attribute_cache(&mut self) {
        self.class_attributes = SmallMap::new();
    }

    // Ignore sets.

    pub fn register_ignores(&mut self, handle: FileHandle, lines: SmallSet<usize>) {
        self.ignores.insert(handle, lines);
    }

    pub fn is_ignored(&self, handle: &FileHandle, line: usize) -> bool {
        self.ignores
            .get(handle)
            .map_or(false, |lines| lines.contains(&line))
    }

    // Footprint.

    pub fn estimated_bytes(&self) -> usize {
        let source_bytes: usize = self
            .sources
            .values()
            .map(|s| s.text.len() + s.statements.len() * 96)
            .sum();
        let memo_bytes: usize = self
            .class_attributes
            .values()
            .map(|attrs| attrs.len() * 64)
            .sum();
        let resolution_bytes = self.type_resolution.len() * 64;
        source_bytes + memo_bytes + resolution_bytes
    }

    pub fn heap_use_ratio(&self) -> f64 {
        self.estimated_bytes() as f64 / self.budget_bytes as f64
    }

    pub fn collect(&mut self, mode: CollectMode) {
        match mode {
            CollectMode::Aggressive => {
                self.class_attributes = SmallMap::new();
                self.type_resolution = SmallMap::new();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parse::parser::parse_module;

    fn parsed(name: &str, text: &str) -> Arc<ParsedSource> {
        let handle = FileHandle::new(Path::new(name), Path::new("/root")).unwrap();
        Arc::new(parse_module(handle, Arc::new(text.to_owned())).unwrap())
    }

    #[test]
    fn test_store_and_remove() {
        let mut heap = SharedHeap::new(1 << 20);
        let source = parsed("a.py", "x = 1\n");
        let handle = source.handle.clone();
        heap.store_source(source);
        assert!(heap.get_source(&handle).is_some());
        heap.remove_paths(&[handle.clone()]);
        assert!(heap.get_source(&handle).is_none());
    }

    #[test]
    fn test_collect_drops_memos_and_lowers_ratio() {
        let mut heap = SharedHeap::new(64);
        heap.store_source(parsed("a.py", "x = 1\n"));
        for i in 0..100 {
            heap.memoize_class_attributes(
                format!("C{i}"),
                Arc::new(vec![("a".to_owned(), Type::class("int"))]),
            );
        }
        let before = heap.heap_use_ratio();
        heap.collect(CollectMode::Aggressive);
        assert!(heap.heap_use_ratio() < before);
        assert!(heap.memoized_class_attributes("C0").is_none());
    }

    #[test]
    fn test_type_resolution_round_trip() {
        let mut heap = SharedHeap::new(1 << 20);
        let q = Qualifier::from_str("a");
        heap.record_define(
            q.clone(),
            "f".to_owned(),
            DefineSignature {
                parameters: vec![Type::class("int")],
                returns: Type::class("str"),
            },
        );
        assert!(heap.resolve_define(&q, "f").is_some());
        heap.clear_define(&q, "f");
        assert!(heap.resolve_define(&q, "f").is_none());
    }
}
