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

//! chancache: thread and catalog cache for imageboard clients.
//!
//! The cache holds the live state of forum threads: their posts in order, per-post content hashes for change
//! detection, deletion and access bookkeeping. Catalog views are assembled on demand from the cached original posts.
//!
//! ```
//! use chancache::prelude::*;
//!
//! let cache = ThreadCacheBuilder::new(10_000).with_name("threads").build().unwrap();
//!
//! let thread = BoardId::new("4chan", "g").thread(100);
//! let op = Post::from(OriginalPost::new(&thread, PostContent::with_comment("hello")));
//! let reply = Post::from(ReplyPost::new(thread.post(101), PostContent::with_comment("world")));
//!
//! cache.put_thread_posts(vec![op, reply], CacheOptions::InMemory);
//! assert_eq!(cache.get_thread_cached_posts_count(&thread), Some(2));
//! ```

pub use chancache_common as common;
pub use chancache_memory as memory;

/// Commonly used types.
pub mod prelude;
pub use prelude::*;
