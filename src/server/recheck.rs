/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The incremental recheck pipeline: given changed files and files to check,
//! re-establish the environment invariants and replace the affected error
//! entries. Steps run strictly in order; no step observes intermediate state
//! of a later one.

use std::path::Path;
use std::sync::Arc;

use starlark_map::small_set::SmallSet;

use crate::check;
use crate::check::ignores;
use crate::metrics;
use crate::module::handle::FileHandle;
use crate::module::qualifier::Qualifier;
use crate::parse::ast::ParsedSource;
use crate::parse::service::parse_sources;
use crate::server::dispatcher::Server;
use crate::server::protocol::ErrorsByFile;
use crate::server::protocol::Request;

impl Server {
    pub(crate) fn recheck(
        &mut self,
        update_environment_with: Vec<std::path::PathBuf>,
        check: Vec<std::path::PathBuf>,
    ) -> ErrorsByFile {
        let source_root = self.configuration().source_root.clone();
        let check_handles: Vec<FileHandle> = check
            .iter()
            .filter_map(|file| FileHandle::new(file, &source_root))
            .collect();
        let update_handles: Vec<FileHandle> = update_environment_with
            .iter()
            .filter_map(|file| FileHandle::new(file, &source_root))
            .collect();

        // Dependents of the updated modules that are not being checked right
        // now are queued for the next flush.
        if !update_environment_with.is_empty() {
            let check_set: SmallSet<FileHandle> = check_handles.iter().cloned().collect();
            let mut remainder: SmallSet<FileHandle> = SmallSet::new();
            for handle in &update_handles {
                let qualifier = Qualifier::of_handle(handle);
                for dependent in self.state().environment.dependencies(&qualifier) {
                    if let Some(module) = self.state().environment.module_definition(&dependent) {
                        if !check_set.contains(&module.handle) {
                            remainder.insert(module.handle.clone());
                        }
                    }
                }
            }
            if !remainder.is_empty() {
                let files = remainder
                    .iter()
                    .map(|handle| handle.to_path(&source_root))
                    .collect();
                self.state_mut().deferred_requests.push_front(Request::TypeCheck {
                    update_environment_with: Vec::new(),
                    check: files,
                });
            }
        }

        let parallel = check.len() > self.configuration().parallel_threshold;
        let scheduler = self.state().scheduler.with_parallel(parallel);

        // Purge everything the update perturbs.
        if !update_handles.is_empty() {
            let state = self.state_mut();
            state.heap.remove_paths(&update_handles);
            state.environment.purge(&update_handles);
            for handle in &update_handles {
                state.lookups.evict(Path::new(handle.as_str()), &source_root);
            }
        }
        self.state_mut().heap.clear_class_attribute_cache();

        // Re-parse: stubs first, then sources that are not shadowed.
        let (stubs, mut sources): (Vec<FileHandle>, Vec<FileHandle>) = update_handles
            .iter()
            .cloned()
            .partition(|handle| handle.is_stub());
        let state = self.state_mut();
        let parsed_stubs = parse_sources(&scheduler, &source_root, stubs, &mut state.heap);
        let stub_qualifiers: SmallSet<Qualifier> = parsed_stubs
            .iter()
            .map(Qualifier::of_handle)
            .collect();
        sources.retain(|handle| {
            let qualifier = Qualifier::of_handle(handle);
            if stub_qualifiers.contains(&qualifier) {
                return false;
            }
            match state.environment.owner(&qualifier) {
                Some(owner) => owner == handle,
                None => true,
            }
        });
        let parsed_sources = parse_sources(&scheduler, &source_root, sources, &mut state.heap);

        // Repopulate and re-infer protocols over what was just parsed.
        let repopulated: Vec<FileHandle> = parsed_stubs
            .into_iter()
            .chain(parsed_sources)
            .collect();
        let repopulated_sources: Vec<Arc<ParsedSource>> = repopulated
            .iter()
            .filter_map(|handle| state.heap.get_source(handle))
            .collect();
        state.environment.populate(&repopulated_sources);
        let class_keys: Vec<String> = repopulated_sources
            .iter()
            .flat_map(|source| source.class_names())
            .map(str::to_owned)
            .collect();
        state.environment.infer_protocols(&class_keys);
        metrics::shared_memory_size(state.heap.estimated_bytes());

        ignores::register(&repopulated, &mut state.heap);

        // Stale type-resolution entries for the handles about to be checked.
        for handle in &check_handles {
            if let Some(source) = state.heap.get_source(handle) {
                for name in source.top_level_defines() {
                    state.heap.clear_define(&source.qualifier, name);
                }
            }
        }

        let outcomes = check::check_handles(
            &scheduler,
            &state.environment,
            &state.heap,
            &check_handles,
        );
        let mut new_errors = Vec::new();
        for outcome in outcomes {
            for (qualifier, name, signature) in outcome.defines {
                state.heap.record_define(qualifier, name, signature);
            }
            new_errors.extend(outcome.errors);
        }

        // Replace the error entries of the checked handles atomically.
        for handle in &check_handles {
            state.errors.shift_remove(handle);
        }
        for handle in &check_handles {
            state.errors.insert(handle.clone(), Vec::new());
        }
        for error in new_errors {
            let handle = FileHandle::from_error(&error);
            match state.errors.get_mut(&handle) {
                Some(existing) => existing.push(error),
                None => {
                    state.errors.insert(handle, vec![error]);
                }
            }
        }

        for handle in &check_handles {
            state.handles.insert(handle.clone());
        }

        // The response is keyed by exactly the requested resolvable handles.
        let mut response = ErrorsByFile::new();
        for handle in &check_handles {
            let errors = state.errors.get(handle).cloned().unwrap_or_default();
            response.insert(handle.clone(), errors);
        }
        response
    }
}
