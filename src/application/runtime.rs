// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Runtime Context
//!
//! Sets up the worker pool that loads tables in parallel. The pool size comes
//! from `parallel`, or from `cpu_percent` of the available cores (50% by
//! default). Each worker spends most of its time waiting on the warehouse, so
//! one thread per table in flight is enough.

use crate::config::AppConfig;
use crate::domain::errors::Result;
use log::info;

/// Shared resources that live for the whole run.
pub struct RuntimeContext {
    /// Number of tables loaded at once.
    pub num_threads: usize,
}

impl RuntimeContext {
    /// Initializes the global rayon pool.
    pub fn init(config: &AppConfig) -> Result<Self> {
        let cpu_percent = config.load.cpu_percent.unwrap_or(50);
        let num_threads = Self::thread_count(config.load.parallel, cpu_percent, num_cpus::get());

        info!(
            "Initializing worker pool with {} threads (Target CPU: {}%)",
            num_threads, cpu_percent
        );

        // `into_par_iter()` in the orchestrator runs on the global pool.
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .unwrap_or_else(|e| {
                info!(
                    "Global thread pool already initialized (likely in a test): {}",
                    e
                );
            });

        Ok(Self { num_threads })
    }

    fn thread_count(parallel: Option<usize>, cpu_percent: u8, total_cpus: usize) -> usize {
        let n = parallel
            .unwrap_or_else(|| (total_cpus as f64 * (cpu_percent as f64 / 100.0)).ceil() as usize);
        std::cmp::max(1, n)
    }
}
