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

//! # Bucket Port
//!
//! Object storage transport used when files are staged in a cloud bucket
//! instead of a Snowflake internal stage. Retries belong to the implementation.

use crate::domain::errors::Result;
use std::path::Path;

pub trait BucketPort: Send + Sync {
    /// Copies a local file to `remote_url` (e.g. `s3://bucket/key`).
    fn upload(&self, local: &Path, remote_url: &str) -> Result<()>;

    /// Removes the object at `remote_url`.
    fn delete(&self, remote_url: &str) -> Result<()>;
}
