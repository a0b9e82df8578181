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

use std::fmt::Debug;

use metrics::{counter, gauge, Counter, Gauge};

/// Metric handles of a thread cache.
///
/// Handles are registered against the global `metrics` recorder. Without an installed recorder they are no-ops.
#[derive(Clone)]
pub struct Metrics {
    /// catalog original post batches written
    pub put_catalog: Counter,
    /// thread post batches written
    pub put_thread: Counter,
    /// post lookups that found a post
    pub hit: Counter,
    /// post lookups that found nothing
    pub miss: Counter,
    /// explicit removals of posts or threads
    pub remove: Counter,

    /// eviction scans that passed the cooldown gate
    pub eviction_scan: Counter,
    /// threads dropped by eviction
    pub evicted_threads: Counter,
    /// posts dropped by eviction
    pub evicted_posts: Counter,

    /// posts resident in memory
    pub cached_posts: Gauge,
    /// threads resident in memory
    pub cached_threads: Gauge,
}

impl Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

impl Metrics {
    /// Register the metrics of the cache called `name`.
    pub fn new(name: &str) -> Self {
        let op = |op: &'static str| counter!("chancache_op_total", "name" => name.to_string(), "op" => op);

        let put_catalog = op("put_catalog");
        let put_thread = op("put_thread");
        let hit = op("hit");
        let miss = op("miss");
        let remove = op("remove");
        let eviction_scan = op("eviction_scan");

        let evicted_threads = counter!("chancache_evicted_threads_total", "name" => name.to_string());
        let evicted_posts = counter!("chancache_evicted_posts_total", "name" => name.to_string());

        let cached_posts = gauge!("chancache_cached_posts", "name" => name.to_string());
        let cached_threads = gauge!("chancache_cached_threads", "name" => name.to_string());

        Self {
            put_catalog,
            put_thread,
            hit,
            miss,
            remove,
            eviction_scan,
            evicted_threads,
            evicted_posts,
            cached_posts,
            cached_threads,
        }
    }

    /// Metric handles that record nothing.
    pub fn noop() -> Self {
        Self {
            put_catalog: Counter::noop(),
            put_thread: Counter::noop(),
            hit: Counter::noop(),
            miss: Counter::noop(),
            remove: Counter::noop(),
            eviction_scan: Counter::noop(),
            evicted_threads: Counter::noop(),
            evicted_posts: Counter::noop(),
            cached_posts: Gauge::noop(),
            cached_threads: Gauge::noop(),
        }
    }

    /// Publish the resident size of the cache.
    pub fn set_usage(&self, threads: usize, posts: usize) {
        self.cached_threads.set(threads as f64);
        self.cached_posts.set(posts as f64);
    }
}
