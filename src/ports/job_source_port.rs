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

//! # Job Source Port
//!
//! Supplies the serialized files of one load package as `LoadJob`s.

use crate::domain::entities::{LoadJob, TableLoadResult};
use crate::domain::errors::Result;

/// The jobs of a package, plus the tables whose files could not be produced.
#[derive(Debug, Clone, Default)]
pub struct LoadPackage {
    pub jobs: Vec<LoadJob>,
    pub failed_tables: Vec<TableLoadResult>,
}

impl LoadPackage {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.failed_tables.is_empty()
    }
}

pub trait JobSourcePort: Send + Sync {
    /// Identifier shared by all jobs of the package.
    fn load_id(&self) -> &str;

    /// Produces the jobs of the package, with their files written to disk.
    /// A table that cannot be read fails alone; an unreadable package is an
    /// error.
    fn load_jobs(&self) -> Result<LoadPackage>;
}
