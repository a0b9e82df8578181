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

//! Eviction of whole threads when the cache holds too many posts.
//!
//! The policy is pure: it looks at a snapshot of `(thread, last access, posts)` and returns the threads to drop. The
//! thread cache runs it while holding its write lock and applies the plan.
//!
//! ```text
//!  oldest access                                        newest access
//!  ┌────┬────┬────┬────┬────┬────┬─────────────┬───────────────────┐
//!  │ t3 │ t9 │ t1 │ t7 │ t2 │ t5 │     ...     │ immune (K threads) │
//!  └────┴────┴────┴────┴────┴────┴─────────────┴───────────────────┘
//!  ───────── victims ─────────▶ until amount_to_evict posts are covered
//! ```

use std::time::{Duration, Instant};

use chancache_common::descriptor::ThreadId;

/// Access snapshot of one cached thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUsage {
    /// Thread descriptor.
    pub thread_id: ThreadId,
    /// Last access time.
    pub last_access: Instant,
    /// Posts held in memory.
    pub posts_count: usize,
}

/// Outcome of an eviction pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvictionPlan {
    /// Posts the pass tried to free.
    pub amount_to_evict: usize,
    /// Threads to drop, oldest access first.
    pub victims: Vec<ThreadId>,
    /// Posts held by the victims.
    pub victim_posts: usize,
}

/// Bounded eviction with immunity for the most recently accessed threads.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    max_cache_size: usize,
    immunity_count: usize,
    cooldown: Duration,
}

impl EvictionPolicy {
    /// Create a policy.
    ///
    /// - `max_cache_size`: total post count bound.
    /// - `immunity_count`: number of most recently accessed threads that are never evicted.
    /// - `cooldown`: minimal time between two scans.
    pub fn new(max_cache_size: usize, immunity_count: usize, cooldown: Duration) -> Self {
        Self {
            max_cache_size,
            immunity_count,
            cooldown,
        }
    }

    /// Total post count bound.
    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    /// Whether a scan may run now, given the time of the previous one.
    pub fn should_scan(&self, last_scan: Option<Instant>, now: Instant) -> bool {
        match last_scan {
            None => true,
            Some(last_scan) => now.saturating_duration_since(last_scan) >= self.cooldown,
        }
    }

    /// Decide which threads to drop.
    ///
    /// Returns `None` when the cache is within bounds, or when too few threads hold more than one post to make an
    /// eviction worthwhile. The victims may cover fewer posts than `amount_to_evict` when the candidates run out, the next
    /// scan picks up the rest.
    pub fn plan(&self, mut usages: Vec<ThreadUsage>) -> Option<EvictionPlan> {
        let total: usize = usages.iter().map(|usage| usage.posts_count).sum();
        if total <= self.max_cache_size {
            return None;
        }

        let evictable = usages.iter().filter(|usage| usage.posts_count > 1).count();
        if evictable <= self.immunity_count {
            return None;
        }

        let amount_to_evict = (total - self.max_cache_size) + self.max_cache_size / 2;

        usages.sort_by(|a, b| {
            a.last_access
                .cmp(&b.last_access)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        usages.truncate(usages.len().saturating_sub(self.immunity_count));

        let mut plan = EvictionPlan {
            amount_to_evict,
            ..Default::default()
        };
        for usage in usages {
            if plan.victim_posts >= amount_to_evict {
                break;
            }
            plan.victim_posts += usage.posts_count;
            plan.victims.push(usage.thread_id);
        }
        Some(plan)
    }
}
