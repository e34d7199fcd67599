/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Worker pool used by the parser and the type-check services. Parallelism
//! is gated per batch: small batches are not worth the fan-out.

use std::num::NonZeroUsize;
use std::thread;

#[derive(Debug, Clone)]
pub struct Scheduler {
    workers: NonZeroUsize,
    parallel: bool,
}

impl Scheduler {
    pub fn new(workers: NonZeroUsize) -> Scheduler {
        Scheduler {
            workers,
            parallel: true,
        }
    }

    /// A scheduler identical to this one with the parallel flag replaced.
    pub fn with_parallel(&self, parallel: bool) -> Scheduler {
        Scheduler {
            workers: self.workers,
            parallel,
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Apply `f` to every item, preserving input order in the output. Fans
    /// out to scoped workers only when the parallel flag is set and the batch
    /// has more than one item; workers receive read-only borrows and return
    /// plain data.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        if !self.parallel || items.len() <= 1 {
            return items.into_iter().map(f).collect();
        }
        let worker_count = self.workers.get().min(items.len());
        let (work_sender, work_receiver) = crossbeam_channel::unbounded::<(usize, T)>();
        let (result_sender, result_receiver) = crossbeam_channel::unbounded::<(usize, R)>();
        let item_count = items.len();
        for indexed in items.into_iter().enumerate() {
            work_sender.send(indexed).expect("work queue open");
        }
        drop(work_sender);
        thread::scope(|scope| {
            for _ in 0..worker_count {
                let work_receiver = work_receiver.clone();
                let result_sender = result_sender.clone();
                let f = &f;
                scope.spawn(move || {
                    for (index, item) in work_receiver {
                        if result_sender.send((index, f(item))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_sender);
        let mut results: Vec<Option<R>> = (0..item_count).map(|_| None).collect();
        for (index, result) in result_receiver {
            results[index] = Some(result);
        }
        results
            .into_iter()
            .map(|r| r.expect("every work item produced a result"))
            .collect()
    }
}
