/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Position-indexed lookup tables and their bounded cache.
//!
//! A table maps source positions to type annotations and definition sites.
//! The cache memoizes one table per relative path; entries are evicted on
//! editing verbs and rebuilt on the next read, so between edits repeated
//! queries return the same table object.

use std::path::Path;
use std::sync::Arc;

use starlark_map::small_map::SmallMap;

use crate::environment::Environment;
use crate::heap::SharedHeap;
use crate::module::handle::FileHandle;
use crate::parse::ast::Expression;
use crate::parse::ast::ParsedSource;
use crate::parse::ast::SourcePosition;
use crate::parse::ast::SourceSpan;
use crate::parse::ast::Statement;
use crate::types::Type;

#[derive(Debug, Default)]
pub struct LookupTable {
    annotations: Vec<(SourceSpan, Type)>,
    definitions: Vec<(SourceSpan, SourcePosition)>,
}

impl LookupTable {
    pub fn create_of_source(environment: &Environment, source: &ParsedSource) -> LookupTable {
        let mut table = LookupTable::default();
        let mut builder = TableBuilder {
            environment,
            table: &mut table,
            bindings: SmallMap::new(),
        };
        builder.walk(&source.statements);
        table
    }

    /// The annotation at a position. `text` is the current source text, used
    /// to snap the position to the identifier under it; the narrowest
    /// matching span wins otherwise.
    pub fn get_annotation(&self, position: SourcePosition, text: &str) -> Option<Type> {
        if let Some(word) = word_span_at(text, position) {
            if let Some((_, ty)) = self
                .annotations
                .iter()
                .find(|(span, _)| *span == word)
            {
                return Some(ty.clone());
            }
        }
        self.annotations
            .iter()
            .filter(|(span, _)| span.contains(position))
            .min_by_key(|(span, _)| span.width())
            .map(|(_, ty)| ty.clone())
    }

    pub fn get_definition(&self, position: SourcePosition) -> Option<SourcePosition> {
        self.definitions
            .iter()
            .filter(|(span, _)| span.contains(position))
            .min_by_key(|(span, _)| span.width())
            .map(|(_, definition)| *definition)
    }
}

/// The span of the contiguous identifier characters around a position.
fn word_span_at(text: &str, position: SourcePosition) -> Option<SourceSpan> {
    let line = text.lines().nth(position.line.checked_sub(1)?)?;
    let chars: Vec<char> = line.chars().collect();
    let is_word = |c: &char| c.is_alphanumeric() || *c == '_';
    if position.column >= chars.len() || !is_word(&chars[position.column]) {
        return None;
    }
    let mut start = position.column;
    while start > 0 && is_word(&chars[start - 1]) {
        start -= 1;
    }
    let mut end = position.column;
    while end < chars.len() && is_word(&chars[end]) {
        end += 1;
    }
    Some(SourceSpan::on_line(position.line, start, end))
}

struct TableBuilder<'a> {
    environment: &'a Environment,
    table: &'a mut LookupTable,
    bindings: SmallMap<String, (Type, SourcePosition)>,
}

impl<'a> TableBuilder<'a> {
    fn walk(&mut self, statements: &[Statement]) {
        for statement in statements {
            match statement {
                Statement::AnnAssign {
                    target,
                    annotation,
                    value,
                } => {
                    let declared = Type::parse(&annotation.text)
                        .filter(|ty| self.environment.type_order().is_instantiated(ty));
                    if let Some(declared) = &declared {
                        self.table
                            .annotations
                            .push((target.span, declared.clone()));
                        self.bindings.insert(
                            target.name.clone(),
                            (declared.clone(), target.span.start),
                        );
                    }
                    if let Some(value) = value {
                        self.visit_expression(value);
                    }
                }
                Statement::Assign { target, value } => {
                    self.visit_expression(value);
                    if let Some(inferred) = self.infer(value) {
                        self.table.annotations.push((target.span, inferred.clone()));
                        self.bindings
                            .insert(target.name.clone(), (inferred, target.span.start));
                    }
                }
                Statement::ClassDef(class) => {
                    let ty = Type::class(&class.name.name);
                    self.table.annotations.push((class.name.span, ty.clone()));
                    self.bindings
                        .insert(class.name.name.clone(), (ty, class.name.span.start));
                    let saved = self.bindings.clone();
                    for member in &class.body {
                        if let Statement::FunctionDef(def) = member {
                            self.walk_function(def, Some(&class.name.name));
                        } else {
                            self.walk(std::slice::from_ref(member));
                        }
                    }
                    self.bindings = saved;
                }
                Statement::FunctionDef(def) => {
                    self.walk_function(def, None);
                }
                Statement::Return { value, .. } => {
                    if let Some(value) = value {
                        self.visit_expression(value);
                    }
                }
                Statement::Import { .. } | Statement::FromImport { .. } | Statement::Pass => {}
            }
        }
    }

    fn walk_function(&mut self, def: &crate::parse::ast::FunctionStatement, class: Option<&str>) {
        let saved = self.bindings.clone();
        for (i, parameter) in def.parameters.iter().enumerate() {
            let ty = match class {
                Some(class) if i == 0 && parameter.name.name == "self" => {
                    Some(Type::class(class))
                }
                _ => parameter
                    .annotation
                    .as_ref()
                    .and_then(|a| Type::parse(&a.text))
                    .filter(|ty| self.environment.type_order().is_instantiated(ty)),
            };
            if let Some(ty) = ty {
                self.table.annotations.push((parameter.name.span, ty.clone()));
                self.bindings
                    .insert(parameter.name.name.clone(), (ty, parameter.name.span.start));
            }
        }
        self.walk(&def.body);
        self.bindings = saved;
    }

    fn visit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Name(name) => {
                if let Some((ty, definition)) = self.bindings.get(&name.name) {
                    self.table.annotations.push((name.span, ty.clone()));
                    self.table.definitions.push((name.span, *definition));
                }
            }
            Expression::IntLiteral(span) => {
                self.table.annotations.push((*span, Type::class("int")));
            }
            Expression::FloatLiteral(span) => {
                self.table.annotations.push((*span, Type::class("float")));
            }
            Expression::StrLiteral(span) => {
                self.table.annotations.push((*span, Type::class("str")));
            }
            Expression::BoolLiteral(span) => {
                self.table.annotations.push((*span, Type::class("bool")));
            }
            Expression::NoneLiteral(span) => {
                self.table.annotations.push((*span, Type::None));
            }
            Expression::Opaque(_) => {}
        }
    }

    fn infer(&self, expression: &Expression) -> Option<Type> {
        match expression {
            Expression::IntLiteral(_) => Some(Type::class("int")),
            Expression::FloatLiteral(_) => Some(Type::class("float")),
            Expression::StrLiteral(_) => Some(Type::class("str")),
            Expression::BoolLiteral(_) => Some(Type::class("bool")),
            Expression::NoneLiteral(_) => Some(Type::None),
            Expression::Name(name) => self.bindings.get(&name.name).map(|(ty, _)| ty.clone()),
            Expression::Opaque(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LookupEntry {
    pub table: Arc<LookupTable>,
    pub source_text: Arc<String>,
}

#[derive(Debug)]
pub struct LookupCache {
    entries: SmallMap<String, LookupEntry>,
    capacity: usize,
}

impl LookupCache {
    pub fn new(capacity: usize) -> LookupCache {
        LookupCache {
            entries: SmallMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Fetch (building if needed) the entry for a file. `None` when the path
    /// is outside the root or its source is not in the heap; nothing is
    /// cached in that case.
    pub fn get(
        &mut self,
        file: &Path,
        source_root: &Path,
        environment: &Environment,
        heap: &SharedHeap,
    ) -> Option<LookupEntry> {
        let handle = FileHandle::new(file, source_root)?;
        if let Some(entry) = self.entries.get(handle.as_str()) {
            return Some(entry.clone());
        }
        let source_text =
            Arc::new(std::fs::read_to_string(handle.to_path(source_root)).unwrap_or_default());
        let source = heap.get_source(&handle)?;
        let entry = LookupEntry {
            table: Arc::new(LookupTable::create_of_source(environment, &source)),
            source_text,
        };
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.entries.keys().next().cloned() {
                self.entries.shift_remove(&oldest);
            }
        }
        self.entries.insert(handle.as_str().to_owned(), entry.clone());
        Some(entry)
    }

    pub fn evict(&mut self, file: &Path, source_root: &Path) {
        if let Some(handle) = FileHandle::new(file, source_root) {
            self.entries.shift_remove(handle.as_str());
        }
    }

    pub fn find_annotation(
        &mut self,
        file: &Path,
        position: SourcePosition,
        source_root: &Path,
        environment: &Environment,
        heap: &SharedHeap,
    ) -> Option<Type> {
        let entry = self.get(file, source_root, environment, heap)?;
        entry.table.get_annotation(position, &entry.source_text)
    }

    pub fn find_definition(
        &mut self,
        file: &Path,
        position: SourcePosition,
        source_root: &Path,
        environment: &Environment,
        heap: &SharedHeap,
    ) -> Option<SourcePosition> {
        let entry = self.get(file, source_root, environment, heap)?;
        entry.table.get_definition(position)
    }

    pub fn contains(&self, handle: &FileHandle) -> bool {
        self.entries.contains_key(handle.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::parse::parser::parse_module;

    fn fixture(text: &str) -> (TempDir, Environment, SharedHeap, FileHandle) {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("m.py"), text).unwrap();
        let handle = FileHandle::new(Path::new("m.py"), root.path()).unwrap();
        let source = Arc::new(parse_module(handle.clone(), Arc::new(text.to_owned())).unwrap());
        let mut environment = Environment::new();
        environment.populate(std::slice::from_ref(&source));
        let mut heap = SharedHeap::new(1 << 20);
        heap.store_source(source);
        (root, environment, heap, handle)
    }

    #[test]
    fn test_annotation_at_identifier() {
        let (root, environment, heap, _) = fixture("x = 42\ny = x\n");
        let mut cache = LookupCache::new(8);
        let annotation = cache.find_annotation(
            Path::new("m.py"),
            SourcePosition::new(2, 4),
            root.path(),
            &environment,
            &heap,
        );
        assert_eq!(annotation, Some(Type::class("int")));
    }

    #[test]
    fn test_definition_points_at_binding() {
        let (root, environment, heap, _) = fixture("x = 42\ny = x\n");
        let mut cache = LookupCache::new(8);
        let definition = cache.find_definition(
            Path::new("m.py"),
            SourcePosition::new(2, 4),
            root.path(),
            &environment,
            &heap,
        );
        assert_eq!(definition, Some(SourcePosition::new(1, 0)));
    }

    #[test]
    fn test_repeated_get_returns_same_table() {
        let (root, environment, heap, _) = fixture("x = 1\n");
        let mut cache = LookupCache::new(8);
        let first = cache
            .get(Path::new("m.py"), root.path(), &environment, &heap)
            .unwrap();
        let second = cache
            .get(Path::new("m.py"), root.path(), &environment, &heap)
            .unwrap();
        assert!(Arc::ptr_eq(&first.table, &second.table));
    }

    #[test]
    fn test_evict_forces_rebuild() {
        let (root, environment, heap, handle) = fixture("x = 1\n");
        let mut cache = LookupCache::new(8);
        let first = cache
            .get(Path::new("m.py"), root.path(), &environment, &heap)
            .unwrap();
        cache.evict(Path::new("m.py"), root.path());
        assert!(!cache.contains(&handle));
        let second = cache
            .get(Path::new("m.py"), root.path(), &environment, &heap)
            .unwrap();
        assert!(!Arc::ptr_eq(&first.table, &second.table));
    }

    #[test]
    fn test_unparsed_file_is_not_cached() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("m.py"), "x = 1\n").unwrap();
        let environment = Environment::new();
        let heap = SharedHeap::new(1 << 20);
        let mut cache = LookupCache::new(8);
        assert!(cache
            .get(Path::new("m.py"), root.path(), &environment, &heap)
            .is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let root = TempDir::new().unwrap();
        let mut environment = Environment::new();
        let mut heap = SharedHeap::new(1 << 20);
        let mut handles = Vec::new();
        for name in ["a.py", "b.py", "c.py"] {
            std::fs::write(root.path().join(name), "x = 1\n").unwrap();
            let handle = FileHandle::new(Path::new(name), root.path()).unwrap();
            let source =
                Arc::new(parse_module(handle.clone(), Arc::new("x = 1\n".to_owned())).unwrap());
            environment.populate(std::slice::from_ref(&source));
            heap.store_source(source);
            handles.push(handle);
        }
        let mut cache = LookupCache::new(2);
        for handle in &handles {
            cache.get(
                Path::new(handle.as_str()),
                root.path(),
                &environment,
                &heap,
            );
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&handles[0]));
        assert!(cache.contains(&handles[2]));
    }
}
