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

use std::sync::Arc;

use chancache_common::descriptor::{CatalogId, ThreadId};
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::post::OriginalPost;

/// Resolves a catalog to the threads it lists right now.
///
/// The thread cache treats the answer as authoritative and does not remember it. It is called without the cache
/// lock held, but implementations must not call back into the cache that owns them.
pub trait CatalogProjector: Send + Sync + 'static {
    /// Ordered thread list of the catalog, `None` if the catalog is unknown.
    fn resolve_thread_ids(&self, catalog: &CatalogId) -> Option<Vec<ThreadId>>;
}

impl<F> CatalogProjector for F
where
    F: Fn(&CatalogId) -> Option<Vec<ThreadId>> + Send + Sync + 'static,
{
    fn resolve_thread_ids(&self, catalog: &CatalogId) -> Option<Vec<ThreadId>> {
        self(catalog)
    }
}

/// Knows no catalog.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCatalogProjector;

impl CatalogProjector for NoopCatalogProjector {
    fn resolve_thread_ids(&self, _: &CatalogId) -> Option<Vec<ThreadId>> {
        None
    }
}

/// Catalog snapshots held in memory.
///
/// Cloned projectors share the same snapshots, so the producer of catalog snapshots can keep a handle while the
/// cache owns another.
///
/// A composite catalog without a snapshot of its own resolves to the snapshots of its boards, concatenated in board
/// order.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalogProjector {
    snapshots: Arc<RwLock<HashMap<CatalogId, Vec<ThreadId>>>>,
}

impl MemoryCatalogProjector {
    /// Replace the snapshot of a catalog.
    pub fn set_snapshot(&self, catalog: CatalogId, threads: Vec<ThreadId>) {
        self.snapshots.write().insert(catalog, threads);
    }

    /// Drop the snapshot of a catalog. Returns whether there was one.
    pub fn remove_snapshot(&self, catalog: &CatalogId) -> bool {
        self.snapshots.write().remove(catalog).is_some()
    }

    /// Drop all snapshots.
    pub fn clear(&self) {
        self.snapshots.write().clear();
    }
}

impl CatalogProjector for MemoryCatalogProjector {
    fn resolve_thread_ids(&self, catalog: &CatalogId) -> Option<Vec<ThreadId>> {
        let snapshots = self.snapshots.read();
        if let Some(threads) = snapshots.get(catalog) {
            return Some(threads.clone());
        }

        if !matches!(catalog, CatalogId::Composite(_)) {
            return None;
        }
        let mut resolved = false;
        let mut threads = vec![];
        for board in catalog.boards() {
            if let Some(board_threads) = snapshots.get(&CatalogId::Board(board.clone())) {
                resolved = true;
                threads.extend_from_slice(board_threads);
            }
        }
        resolved.then_some(threads)
    }
}

/// Catalog view assembled from cached original posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Catalog descriptor.
    pub id: CatalogId,
    /// Original posts in catalog order. Threads without a cached original post are skipped.
    pub original_posts: Vec<Arc<OriginalPost>>,
}

impl Catalog {
    /// Original post of the thread `thread_no`, if listed.
    pub fn find_thread(&self, thread_no: u64) -> Option<&Arc<OriginalPost>> {
        self.original_posts
            .iter()
            .find(|post| post.thread_id().thread_no() == thread_no)
    }
}
