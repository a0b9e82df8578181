// Copyright 2026 chancache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory thread cache.
//!
//! [`ThreadCache`] owns one [`PostContainer`] per cached thread behind a single reader/writer lock and drops whole
//! threads, least recently accessed first, when the total post count grows past its bound.

mod cache;
mod catalog;
mod container;
mod error;
mod eviction;
mod post;
mod prelude;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
