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

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use chancache_common::{
    assert::strict_checks_by_default,
    clock::{Clock, SystemClock},
    descriptor::{CatalogId, ChanDescriptor, PostId, ThreadId},
    event::{Event, EventListener},
    metrics::Metrics,
    strict_assert,
};
use hashbrown::HashMap;
use itertools::Itertools;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, CatalogProjector, NoopCatalogProjector},
    container::PostContainer,
    error::{Error, Result},
    eviction::{EvictionPolicy, ThreadUsage},
    post::{OriginalPost, Post, PostHash},
};

/// How much of a thread batch is kept in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheOptions {
    /// Keep every post of the batch.
    #[default]
    InMemory,
    /// Keep only the original post, for memory constrained setups that only render catalogs.
    ///
    /// Replies cached by earlier writes to the thread are dropped, so readers never see replies older than what the
    /// persistence layer received.
    OriginalPostOnly,
}

impl CacheOptions {
    /// Whether replies are kept in memory.
    pub fn can_store_in_memory(&self) -> bool {
        matches!(self, CacheOptions::InMemory)
    }
}

/// Thread cache config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCacheConfig {
    /// Total cached post count the eviction routine aims to stay under.
    pub max_cache_size: usize,
    /// Number of most recently accessed threads that are never evicted.
    pub immunity_count: usize,
    /// Minimal time between two eviction scans.
    pub eviction_cooldown: Duration,
    /// Validate that every post of a batch belongs to the addressed thread.
    pub strict_checks: bool,
}

impl ThreadCacheConfig {
    /// Default [`Self::immunity_count`].
    pub const DEFAULT_IMMUNITY_COUNT: usize = 8;
    /// Default [`Self::eviction_cooldown`].
    pub const DEFAULT_EVICTION_COOLDOWN: Duration = Duration::from_secs(15);

    /// Config with the given bound and default values for the rest.
    pub fn new(max_cache_size: usize) -> Self {
        Self {
            max_cache_size,
            immunity_count: Self::DEFAULT_IMMUNITY_COUNT,
            eviction_cooldown: Self::DEFAULT_EVICTION_COOLDOWN,
            strict_checks: strict_checks_by_default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_cache_size == 0 {
            return Err(Error::ConfigError("max_cache_size must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Builder of a [`ThreadCache`].
pub struct ThreadCacheBuilder {
    name: Option<String>,
    config: ThreadCacheConfig,
    projector: Arc<dyn CatalogProjector>,
    event_listener: Option<Arc<dyn EventListener>>,
    clock: Arc<dyn Clock>,
}

impl Debug for ThreadCacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCacheBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

impl ThreadCacheBuilder {
    /// Builder for a cache holding about `max_cache_size` posts.
    pub fn new(max_cache_size: usize) -> Self {
        Self::with_config(ThreadCacheConfig::new(max_cache_size))
    }

    /// Builder starting from a complete config.
    pub fn with_config(config: ThreadCacheConfig) -> Self {
        Self {
            name: None,
            config,
            projector: Arc::new(NoopCatalogProjector),
            event_listener: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the name of the cache. A named cache registers its metrics under the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the number of most recently accessed threads that are never evicted.
    ///
    /// The default value is 8.
    pub fn with_immunity_count(mut self, immunity_count: usize) -> Self {
        self.config.immunity_count = immunity_count;
        self
    }

    /// Set the minimal time between two eviction scans.
    ///
    /// The default value is 15s.
    pub fn with_eviction_cooldown(mut self, eviction_cooldown: Duration) -> Self {
        self.config.eviction_cooldown = eviction_cooldown;
        self
    }

    /// Enable or disable validation of batch writes.
    ///
    /// Enabled by default in debug builds and with feature "strict_assertions".
    pub fn with_strict_checks(mut self, strict_checks: bool) -> Self {
        self.config.strict_checks = strict_checks;
        self
    }

    /// Set the catalog projector used by catalog reads.
    pub fn with_catalog_projector(mut self, projector: impl CatalogProjector) -> Self {
        self.projector = Arc::new(projector);
        self
    }

    /// Set the listener notified when threads leave the cache.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the time source.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the thread cache.
    pub fn build(self) -> Result<ThreadCache> {
        self.config.validate()?;

        let metrics = match &self.name {
            Some(name) => Metrics::new(name),
            None => Metrics::noop(),
        };
        tracing::info!("[thread cache]: build thread cache {:?} with config: {:?}", self.name, self.config);

        Ok(ThreadCache {
            inner: Arc::new(ThreadCacheInner {
                state: RwLock::new(ThreadCacheState::default()),
                policy: EvictionPolicy::new(
                    self.config.max_cache_size,
                    self.config.immunity_count,
                    self.config.eviction_cooldown,
                ),
                strict_checks: self.config.strict_checks,
                projector: self.projector,
                event_listener: self.event_listener,
                clock: self.clock,
                metrics,
            }),
        })
    }
}

#[derive(Debug, Default)]
struct ThreadCacheState {
    threads: HashMap<ThreadId, PostContainer>,
    last_eviction: Option<Instant>,
}

impl ThreadCacheState {
    fn container(&mut self, thread_id: &ThreadId, now: Instant, strict_checks: bool) -> &mut PostContainer {
        self.threads
            .entry(thread_id.clone())
            .or_insert_with(|| PostContainer::new(thread_id.clone(), now, strict_checks))
    }

    fn total_posts(&self) -> usize {
        self.threads.values().map(PostContainer::posts_count).sum()
    }
}

struct ThreadCacheInner {
    state: RwLock<ThreadCacheState>,
    policy: EvictionPolicy,
    strict_checks: bool,

    projector: Arc<dyn CatalogProjector>,
    event_listener: Option<Arc<dyn EventListener>>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

/// Threads that left the cache, reported to the listener once the lock is released.
type Garbages = Vec<(Event, ThreadId, usize)>;

/// Live state of threads and catalogs.
///
/// One reader/writer lock guards every container. Reads take the read lock for their whole duration, writes and the
/// eviction routine they trigger take the write lock. Nothing returned by the cache refers into its internals: posts
/// are immutable shared values and containers are returned as snapshots.
///
/// The handle is cheap to clone, clones share the same cache.
#[derive(Clone)]
pub struct ThreadCache {
    inner: Arc<ThreadCacheInner>,
}

impl Debug for ThreadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCache")
            .field("policy", &self.inner.policy)
            .field("strict_checks", &self.inner.strict_checks)
            .finish()
    }
}

impl ThreadCache {
    /// Insert or update the original posts of a catalog page.
    ///
    /// Returns the stored posts, which merge the input with what was known before.
    pub fn put_catalog_original_posts<P>(&self, posts: impl IntoIterator<Item = P>) -> Vec<Arc<OriginalPost>>
    where
        P: Into<Arc<OriginalPost>>,
    {
        let mut garbages = vec![];

        let updated = {
            let mut state = self.inner.state.write();
            let now = self.inner.clock.now();

            let updated = posts
                .into_iter()
                .map(|post| {
                    let post = post.into();
                    let thread_id = post.thread_id().clone();
                    state
                        .container(&thread_id, now, self.inner.strict_checks)
                        .set_or_update_original_post(post)
                })
                .collect_vec();

            self.evict_if_needed(&mut state, now, &mut garbages);
            self.publish_usage(&state);
            updated
        };

        self.inner.metrics.put_catalog.increment(1);
        tracing::trace!("[thread cache]: put {} catalog original posts", updated.len());
        self.notify(garbages);
        updated
    }

    /// Insert or update the posts of one thread.
    ///
    /// The batch must start with the original post and every post must belong to the same thread. The first
    /// requirement is always checked, the second one with strict checks enabled.
    ///
    /// Returns every up to date post of the thread for the persistence layer, whatever `options` kept in memory:
    ///
    /// - [`CacheOptions::InMemory`]: all posts held by the thread.
    /// - [`CacheOptions::OriginalPostOnly`]: the stored original post followed by the batch replies, deduplicated and
    ///   in post order. The thread holds only its original post afterwards.
    pub fn put_thread_posts(&self, posts: Vec<Post>, options: CacheOptions) -> Vec<Post> {
        let Some(first) = posts.first() else {
            return vec![];
        };
        assert!(
            first.is_original(),
            "thread batch must start with the original post, got {}",
            first.id()
        );
        let thread_id = first.thread_id().clone();
        if self.inner.strict_checks {
            if let Some(foreign) = posts.iter().find(|post| post.thread_id() != &thread_id) {
                panic!("thread batch for {thread_id} contains post {}", foreign.id());
            }
        }

        let mut garbages = vec![];

        let persisted = {
            let mut state = self.inner.state.write();
            let now = self.inner.clock.now();
            let container = state.container(&thread_id, now, self.inner.strict_checks);

            let persisted = if options.can_store_in_memory() {
                container.add_or_update_posts(posts);
                container.get_all_posts_for_database_persisting()
            } else {
                let dropped = container.clear_replies();
                if dropped > 0 {
                    tracing::debug!("[thread cache]: drop {dropped} cached replies of thread {thread_id}");
                }
                let mut original = None;
                let mut replies = BTreeMap::new();
                for post in posts {
                    match post {
                        Post::Original(post) => original = Some(container.set_or_update_original_post(post)),
                        Post::Reply(reply) => {
                            replies.insert(reply.id().ordinal(), reply);
                        }
                    }
                }
                original
                    .map(Post::Original)
                    .into_iter()
                    .chain(replies.into_values().map(Post::Reply))
                    .collect_vec()
            };

            self.evict_if_needed(&mut state, now, &mut garbages);
            self.publish_usage(&state);
            persisted
        };

        self.inner.metrics.put_thread.increment(1);
        tracing::trace!(
            "[thread cache]: put {} posts of thread {thread_id} with {options:?}",
            persisted.len()
        );
        self.notify(garbages);
        persisted
    }

    /// Remove a post. The thread stays cached even if it becomes empty.
    pub fn delete_post(&self, post_id: &PostId) -> Option<Post> {
        let deleted = {
            let mut state = self.inner.state.write();
            let deleted = state
                .threads
                .get_mut(post_id.thread())
                .and_then(|container| container.delete_post(post_id));
            self.publish_usage(&state);
            deleted
        };
        if deleted.is_some() {
            self.inner.metrics.remove.increment(1);
            tracing::debug!("[thread cache]: delete post {post_id}");
        }
        deleted
    }

    /// Remove a thread with all its posts and hashes. Returns whether it was cached.
    pub fn delete_thread(&self, thread_id: &ThreadId) -> bool {
        self.delete_threads(std::slice::from_ref(thread_id)) == 1
    }

    /// Remove threads with all their posts and hashes. Returns how many were cached.
    pub fn delete_threads<'a>(&self, thread_ids: impl IntoIterator<Item = &'a ThreadId>) -> usize {
        let garbages = {
            let mut state = self.inner.state.write();
            let garbages = thread_ids
                .into_iter()
                .filter_map(|thread_id| {
                    state
                        .threads
                        .remove(thread_id)
                        .map(|container| (Event::Remove, thread_id.clone(), container.posts_count()))
                })
                .collect_vec();
            self.publish_usage(&state);
            garbages
        };

        let removed = garbages.len();
        if removed > 0 {
            self.inner.metrics.remove.increment(removed as u64);
            tracing::debug!("[thread cache]: delete {removed} threads");
        }
        self.notify(garbages);
        removed
    }

    /// Remove everything and reset the eviction cooldown. Returns how many threads were cached.
    pub fn delete_all(&self) -> usize {
        let garbages = {
            let mut state = self.inner.state.write();
            state.last_eviction = None;
            let garbages = state
                .threads
                .drain()
                .map(|(thread_id, container)| (Event::Clear, thread_id, container.posts_count()))
                .collect_vec();
            self.publish_usage(&state);
            garbages
        };

        let removed = garbages.len();
        tracing::debug!("[thread cache]: clear {removed} threads");
        self.notify(garbages);
        removed
    }

    /// Set the deleted flag of a thread. Returns whether the thread is cached.
    pub fn mark_thread_as_deleted(&self, thread_id: &ThreadId, deleted: bool) -> bool {
        self.with_thread_mut(thread_id, |container| container.set_deleted(deleted))
            .is_some()
    }

    /// Mark a thread as just accessed, protecting it from eviction. Returns whether the thread is cached.
    pub fn update_last_access_time(&self, thread_id: &ThreadId) -> bool {
        let now = self.inner.clock.now();
        self.with_thread_mut(thread_id, |container| container.update_last_access_time(now))
            .is_some()
    }

    /// Record the content hash of a post. Returns whether the thread is cached, nothing is recorded otherwise.
    pub fn put_post_hash(&self, post_id: &PostId, hash: PostHash) -> bool {
        self.with_thread_mut(post_id.thread(), |container| {
            container.put_post_hash(post_id.clone(), hash)
        })
        .is_some()
    }

    /// Forget the post hashes of every thread. Posts are untouched.
    pub fn clear_post_hashes(&self) {
        let mut state = self.inner.state.write();
        for container in state.threads.values_mut() {
            container.clear_post_hashes();
        }
    }

    /// Get a post.
    pub fn get_post(&self, post_id: &PostId) -> Option<Post> {
        let post = self
            .read()
            .threads
            .get(post_id.thread())
            .and_then(|container| container.get_post(post_id));
        match post {
            Some(_) => self.inner.metrics.hit.increment(1),
            None => self.inner.metrics.miss.increment(1),
        }
        post
    }

    /// Get a post by number from a thread or a catalog.
    ///
    /// In a catalog only original posts are listed, so `post_no` is looked up as the thread number of one of the
    /// catalog threads and that thread's original post is returned.
    pub fn get_post_by_no(&self, descriptor: &ChanDescriptor, post_no: u64) -> Option<Post> {
        match descriptor {
            ChanDescriptor::Thread(thread_id) => self.get_post(&thread_id.post(post_no)),
            ChanDescriptor::Catalog(catalog_id) => {
                let thread_id = self
                    .inner
                    .projector
                    .resolve_thread_ids(catalog_id)?
                    .into_iter()
                    .find(|thread_id| thread_id.thread_no() == post_no)?;
                self.get_original_post(&thread_id).map(Post::Original)
            }
        }
    }

    /// Get the original post of a thread.
    pub fn get_original_post(&self, thread_id: &ThreadId) -> Option<Arc<OriginalPost>> {
        self.read()
            .threads
            .get(thread_id)
            .and_then(|container| container.original_post().cloned())
    }

    /// Get the original post of the thread a post belongs to.
    pub fn get_original_post_by_post_id(&self, post_id: &PostId) -> Option<Arc<OriginalPost>> {
        self.get_original_post(post_id.thread())
    }

    /// Snapshot of a thread's container.
    ///
    /// The snapshot shares posts with the cache but later writes to the cache do not show up in it.
    pub fn get_thread(&self, thread_id: &ThreadId) -> Option<PostContainer> {
        self.read().threads.get(thread_id).cloned()
    }

    /// Run `f` over a thread's container while holding the read lock.
    ///
    /// `f` may read from the cache, reads never queue behind a pending writer. It must not write to the cache, a
    /// write from inside `f` deadlocks.
    pub fn with_thread<R>(&self, thread_id: &ThreadId, f: impl FnOnce(&PostContainer) -> R) -> Option<R> {
        self.read().threads.get(thread_id).map(f)
    }

    /// Visit the posts of a thread in order while holding the read lock. Returns whether the thread is cached.
    ///
    /// Same contract as [`Self::with_thread`]: `visitor` may read from the cache but must not write to it.
    pub fn iterate_posts_ordered(&self, thread_id: &ThreadId, mut visitor: impl FnMut(Post)) -> bool {
        self.with_thread(thread_id, |container| container.iter_posts().for_each(&mut visitor))
            .is_some()
    }

    /// All posts of a thread in order. Empty if the thread is not cached.
    pub fn get_thread_posts(&self, thread_id: &ThreadId) -> Vec<Post> {
        self.with_thread(thread_id, PostContainer::get_posts)
            .unwrap_or_default()
    }

    /// Descriptors of the posts of a thread.
    pub fn get_thread_post_no_set(&self, thread_id: &ThreadId) -> BTreeSet<PostId> {
        self.with_thread(thread_id, |container| container.post_ids().collect())
            .unwrap_or_default()
    }

    /// The last post of a thread.
    pub fn get_last_post(&self, thread_id: &ThreadId) -> Option<Post> {
        self.with_thread(thread_id, PostContainer::last_post).flatten()
    }

    /// Best known post count of a thread: the cached posts, or the count the server reported with the original post
    /// if that is larger. `0` if the thread is not cached.
    pub fn get_thread_posts_count(&self, thread_id: &ThreadId) -> usize {
        self.with_thread(thread_id, |container| {
            let reported = container
                .original_post()
                .map(|post| post.stats.replies + 1)
                .unwrap_or_default();
            container.posts_count().max(reported)
        })
        .unwrap_or_default()
    }

    /// Posts of a thread held in memory, `None` if the thread is not cached.
    pub fn get_thread_cached_posts_count(&self, thread_id: &ThreadId) -> Option<usize> {
        self.with_thread(thread_id, PostContainer::posts_count)
    }

    /// Last recorded content hash of a post.
    pub fn get_post_hash(&self, post_id: &PostId) -> Option<PostHash> {
        self.with_thread(post_id.thread(), |container| container.get_post_hash(post_id))
            .flatten()
    }

    /// All recorded content hashes of a thread, ordered by post.
    pub fn get_thread_post_hashes(&self, thread_id: &ThreadId) -> Vec<(PostId, PostHash)> {
        self.with_thread(thread_id, |container| {
            container
                .post_hashes()
                .map(|(id, hash)| (id.clone(), *hash))
                .sorted_by(|a, b| a.0.cmp(&b.0))
                .collect_vec()
        })
        .unwrap_or_default()
    }

    /// Whether the thread was marked deleted. `false` if the thread is not cached.
    pub fn is_thread_deleted(&self, thread_id: &ThreadId) -> bool {
        self.with_thread(thread_id, PostContainer::is_deleted)
            .unwrap_or_default()
    }

    /// Last access time of a thread.
    pub fn get_last_access_time(&self, thread_id: &ThreadId) -> Option<Instant> {
        self.with_thread(thread_id, PostContainer::last_access_time)
    }

    /// Whether a thread, or any thread of a catalog, holds at least one post.
    pub fn contains(&self, descriptor: &ChanDescriptor) -> bool {
        match descriptor {
            ChanDescriptor::Thread(thread_id) => self
                .with_thread(thread_id, PostContainer::has_at_least_one_post)
                .unwrap_or_default(),
            ChanDescriptor::Catalog(catalog_id) => {
                let Some(thread_ids) = self.inner.projector.resolve_thread_ids(catalog_id) else {
                    return false;
                };
                let state = self.read();
                thread_ids.iter().any(|thread_id| {
                    state
                        .threads
                        .get(thread_id)
                        .is_some_and(PostContainer::has_at_least_one_post)
                })
            }
        }
    }

    /// Assemble a catalog view from the cached original posts, in the order the projector lists the threads.
    ///
    /// `None` if the projector does not know the catalog.
    pub fn get_catalog(&self, catalog_id: &CatalogId) -> Option<Catalog> {
        let thread_ids = self.inner.projector.resolve_thread_ids(catalog_id)?;
        let original_posts = self
            .get_catalog_posts_from_cache(&thread_ids)
            .into_iter()
            .map(|(_, post)| post)
            .collect_vec();
        Some(Catalog {
            id: catalog_id.clone(),
            original_posts,
        })
    }

    /// Cached original posts of the given threads, in input order. Threads without one are omitted.
    pub fn get_catalog_posts_from_cache(&self, thread_ids: &[ThreadId]) -> Vec<(ThreadId, Arc<OriginalPost>)> {
        let state = self.read();
        thread_ids
            .iter()
            .filter_map(|thread_id| {
                let post = state.threads.get(thread_id)?.original_post()?;
                Some((thread_id.clone(), post.clone()))
            })
            .collect_vec()
    }

    /// Descriptors of all cached threads, in no particular order.
    pub fn cached_thread_ids(&self) -> Vec<ThreadId> {
        self.read().threads.keys().cloned().collect_vec()
    }

    /// Posts held in memory across all threads.
    pub fn get_total_cached_posts_count(&self) -> usize {
        self.read().total_posts()
    }

    /// Number of cached threads.
    pub fn get_cached_threads_count(&self) -> usize {
        self.read().threads.len()
    }

    /// Number of cached threads holding more than one post.
    pub fn get_threads_with_more_than_one_post_count(&self) -> usize {
        self.read()
            .threads
            .values()
            .filter(|container| container.posts_count() > 1)
            .count()
    }

    /// Reads take the lock recursively, so a read nested in a [`Self::with_thread`] callback does not wait for a
    /// writer queued behind the outer read.
    fn read(&self) -> RwLockReadGuard<'_, ThreadCacheState> {
        self.inner.state.read_recursive()
    }

    fn publish_usage(&self, state: &ThreadCacheState) {
        self.inner.metrics.set_usage(state.threads.len(), state.total_posts());
    }

    fn with_thread_mut<R>(&self, thread_id: &ThreadId, f: impl FnOnce(&mut PostContainer) -> R) -> Option<R> {
        self.inner.state.write().threads.get_mut(thread_id).map(f)
    }

    /// Must be called with the write lock held, `state` being the guarded value.
    fn evict_if_needed(&self, state: &mut ThreadCacheState, now: Instant, garbages: &mut Garbages) {
        strict_assert!(self.inner.state.is_locked_exclusive());

        if !self.inner.policy.should_scan(state.last_eviction, now) {
            return;
        }
        state.last_eviction = Some(now);
        self.inner.metrics.eviction_scan.increment(1);

        let usages = state
            .threads
            .iter()
            .map(|(thread_id, container)| ThreadUsage {
                thread_id: thread_id.clone(),
                last_access: container.last_access_time(),
                posts_count: container.posts_count(),
            })
            .collect_vec();
        let posts = usages.iter().map(|usage| usage.posts_count).sum::<usize>();

        let Some(plan) = self.inner.policy.plan(usages) else {
            return;
        };
        if plan.victim_posts < plan.amount_to_evict {
            tracing::warn!(
                "[eviction]: candidates run out, only {} of {} posts can be evicted, bound: {}",
                plan.victim_posts,
                plan.amount_to_evict,
                self.inner.policy.max_cache_size()
            );
        }

        let mut evicted_posts = 0;
        for thread_id in plan.victims {
            if let Some(container) = state.threads.remove(&thread_id) {
                evicted_posts += container.posts_count();
                garbages.push((Event::Evict, thread_id, container.posts_count()));
            }
        }

        self.inner.metrics.evicted_threads.increment(garbages.len() as u64);
        self.inner.metrics.evicted_posts.increment(evicted_posts as u64);
        tracing::debug!(
            "[eviction]: evicted {} threads with {evicted_posts} posts (target {}), {} posts left",
            garbages.len(),
            plan.amount_to_evict,
            posts - evicted_posts
        );
    }

    fn notify(&self, garbages: Garbages) {
        let Some(listener) = self.inner.event_listener.as_ref() else {
            return;
        };
        for (event, thread_id, posts_count) in garbages {
            listener.on_leave(event, &thread_id, posts_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use chancache_common::clock::ManualClock;
    use metrics::{Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        catalog::MemoryCatalogProjector,
        post::PostContent,
        test_utils::{board, original_post, post_nos, reply, reply_with_comment, thread, thread_posts},
    };

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<ThreadCache>();
    }

    #[derive(Debug, Default)]
    struct RecordingListener {
        events: Mutex<Vec<(Event, ThreadId, usize)>>,
    }

    impl EventListener for RecordingListener {
        fn on_leave(&self, event: Event, thread: &ThreadId, posts_count: usize) {
            self.events.lock().push((event, thread.clone(), posts_count));
        }
    }

    fn cache_for_test(max_cache_size: usize, immunity_count: usize, clock: Arc<ManualClock>) -> ThreadCache {
        ThreadCacheBuilder::new(max_cache_size)
            .with_immunity_count(immunity_count)
            .with_strict_checks(true)
            .with_clock(clock)
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_max_cache_size_rejected() {
        let res = ThreadCacheBuilder::new(0).build();
        assert!(matches!(res, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_defaults() {
        let config = ThreadCacheConfig::new(1000);
        assert_eq!(config.immunity_count, 8);
        assert_eq!(config.eviction_cooldown, Duration::from_secs(15));
    }

    #[test_log::test]
    fn test_put_thread_posts_orders_replies() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);

        let persisted = cache.put_thread_posts(
            vec![original_post(&t), reply(&t, 3), reply(&t, 2)],
            CacheOptions::InMemory,
        );

        assert_eq!(post_nos(&persisted), vec![1, 2, 3]);
        assert_eq!(post_nos(&cache.get_thread_posts(&t)), vec![1, 2, 3]);
        assert_eq!(cache.get_thread_cached_posts_count(&t), Some(3));
        assert_eq!(cache.get_total_cached_posts_count(), 3);
        assert_eq!(cache.get_last_post(&t).unwrap().id().post_no(), 3);
    }

    #[test]
    fn test_put_thread_posts_original_post_only() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);

        let persisted = cache.put_thread_posts(
            vec![original_post(&t), reply(&t, 5), reply(&t, 2), reply(&t, 5)],
            CacheOptions::OriginalPostOnly,
        );

        assert_eq!(post_nos(&persisted), vec![1, 2, 5]);
        assert_eq!(post_nos(&cache.get_thread_posts(&t)), vec![1]);
        assert_eq!(cache.get_thread_cached_posts_count(&t), Some(1));
    }

    #[test]
    fn test_original_post_only_drops_cached_replies() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);
        cache.put_thread_posts(thread_posts(1, 2), CacheOptions::InMemory);
        cache.put_post_hash(&t.post(2), PostHash(2));

        let persisted = cache.put_thread_posts(
            vec![original_post(&t), reply_with_comment(&t, 2, "edited")],
            CacheOptions::OriginalPostOnly,
        );

        assert_eq!(post_nos(&persisted), vec![1, 2]);
        assert_eq!(persisted[1].content().comment, "edited");
        assert_eq!(post_nos(&cache.get_thread_posts(&t)), vec![1]);
        assert!(cache.get_post(&t.post(2)).is_none());
        assert_eq!(cache.get_post_hash(&t.post(2)), Some(PostHash(2)));
    }

    #[test]
    fn test_put_empty_batch() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        assert!(cache.put_thread_posts(vec![], CacheOptions::InMemory).is_empty());
        assert_eq!(cache.get_cached_threads_count(), 0);
    }

    #[test]
    #[should_panic]
    fn test_batch_must_start_with_original_post() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);
        cache.put_thread_posts(vec![reply(&t, 2), original_post(&t)], CacheOptions::InMemory);
    }

    #[test]
    #[should_panic]
    fn test_batch_must_not_mix_threads() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);
        cache.put_thread_posts(vec![original_post(&t), reply(&thread(2), 3)], CacheOptions::InMemory);
    }

    #[test]
    fn test_put_catalog_original_posts_returns_merged() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);

        let mut fresh = OriginalPost::new(&t, PostContent::with_comment("fresh"));
        fresh.last_modified = 10;
        fresh.stats.replies = 99;
        cache.put_catalog_original_posts([fresh]);

        let stale = OriginalPost::new(&t, PostContent::with_comment("stale"));
        let updated = cache.put_catalog_original_posts([stale]);

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].stats.replies, 99);
        assert_eq!(cache.get_thread_posts_count(&t), 100);
        assert_eq!(cache.get_thread_cached_posts_count(&t), Some(1));
    }

    #[test]
    fn test_reads_on_missing_thread() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);

        assert!(cache.get_post(&t.original_post()).is_none());
        assert!(cache.get_original_post(&t).is_none());
        assert!(cache.get_thread(&t).is_none());
        assert!(cache.get_thread_posts(&t).is_empty());
        assert!(cache.get_thread_post_no_set(&t).is_empty());
        assert!(cache.get_last_post(&t).is_none());
        assert_eq!(cache.get_thread_posts_count(&t), 0);
        assert_eq!(cache.get_thread_cached_posts_count(&t), None);
        assert!(!cache.contains(&ChanDescriptor::Thread(t.clone())));
        assert!(!cache.iterate_posts_ordered(&t, |_| unreachable!()));
        assert!(!cache.update_last_access_time(&t));
        assert!(!cache.mark_thread_as_deleted(&t, true));
        assert!(!cache.put_post_hash(&t.original_post(), PostHash(1)));
        assert!(!cache.delete_thread(&t));
        assert!(cache.delete_post(&t.original_post()).is_none());
    }

    #[test]
    fn test_delete_post_and_thread() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);
        cache.put_thread_posts(thread_posts(1, 3), CacheOptions::InMemory);

        assert!(cache.delete_post(&t.post(3)).is_some());
        assert_eq!(post_nos(&cache.get_thread_posts(&t)), vec![1, 2, 4]);

        assert!(cache.delete_post(&t.original_post()).is_some());
        assert!(cache.get_original_post(&t).is_none());
        assert_eq!(cache.get_cached_threads_count(), 1);

        assert!(cache.delete_thread(&t));
        assert_eq!(cache.get_cached_threads_count(), 0);
        assert!(!cache.delete_thread(&t));
    }

    #[test]
    fn test_delete_threads_notifies_listener() {
        let listener = Arc::new(RecordingListener::default());
        let cache = ThreadCacheBuilder::new(1000)
            .with_event_listener(listener.clone())
            .build()
            .unwrap();
        for no in [1, 10, 20] {
            cache.put_thread_posts(thread_posts(no, 2), CacheOptions::InMemory);
        }

        let removed = cache.delete_threads(&[thread(1), thread(20), thread(30)]);
        assert_eq!(removed, 2);
        assert_eq!(cache.cached_thread_ids(), vec![thread(10)]);

        let events = listener.events.lock().clone();
        assert_eq!(
            events,
            vec![(Event::Remove, thread(1), 3), (Event::Remove, thread(20), 3)]
        );
    }

    #[test]
    fn test_thread_flags_and_hashes() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);
        cache.put_thread_posts(thread_posts(1, 2), CacheOptions::InMemory);

        assert!(cache.mark_thread_as_deleted(&t, true));
        assert!(cache.is_thread_deleted(&t));

        assert!(cache.put_post_hash(&t.post(3), PostHash(3)));
        assert!(cache.put_post_hash(&t.post(2), PostHash(2)));
        assert_eq!(
            cache.get_thread_post_hashes(&t),
            vec![(t.post(2), PostHash(2)), (t.post(3), PostHash(3))]
        );

        cache.delete_post(&t.post(2));
        assert_eq!(cache.get_post_hash(&t.post(2)), Some(PostHash(2)));

        cache.clear_post_hashes();
        assert_eq!(cache.get_post_hash(&t.post(3)), None);
        assert_eq!(cache.get_thread_cached_posts_count(&t), Some(2));
    }

    #[test]
    fn test_get_thread_is_snapshot() {
        let cache = cache_for_test(1000, 8, Arc::new(ManualClock::new()));
        let t = thread(1);
        cache.put_thread_posts(thread_posts(1, 1), CacheOptions::InMemory);

        let snapshot = cache.get_thread(&t).unwrap();
        cache.put_thread_posts(vec![original_post(&t), reply(&t, 5)], CacheOptions::InMemory);

        assert_eq!(snapshot.posts_count(), 2);
        assert_eq!(cache.get_thread_cached_posts_count(&t), Some(3));
        assert_eq!(cache.with_thread(&t, PostContainer::replies_count), Some(2));
    }

    #[test]
    fn test_catalog_reads() {
        let projector = MemoryCatalogProjector::default();
        let cache = ThreadCacheBuilder::new(1000)
            .with_catalog_projector(projector.clone())
            .build()
            .unwrap();
        let catalog = CatalogId::from(board());

        assert!(cache.get_catalog(&catalog).is_none());

        cache.put_catalog_original_posts([3, 1].map(|no| OriginalPost::new(&thread(no), PostContent::default())));
        projector.set_snapshot(catalog.clone(), vec![thread(3), thread(2), thread(1)]);

        let view = cache.get_catalog(&catalog).unwrap();
        assert_eq!(
            view.original_posts.iter().map(|post| post.thread_id().thread_no()).collect_vec(),
            vec![3, 1]
        );
        assert!(view.find_thread(1).is_some());
        assert!(cache.contains(&ChanDescriptor::Catalog(catalog.clone())));

        let posts = cache.get_catalog_posts_from_cache(&[thread(2), thread(1)]);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, thread(1));

        let by_no = cache.get_post_by_no(&ChanDescriptor::Catalog(catalog.clone()), 3).unwrap();
        assert_eq!(by_no.id(), &thread(3).original_post());
        assert!(cache.get_post_by_no(&ChanDescriptor::Catalog(catalog.clone()), 2).is_none());
        assert!(cache.get_post_by_no(&ChanDescriptor::Catalog(catalog), 4).is_none());
    }

    #[test]
    fn test_catalog_contains_requires_posts() {
        let projector = MemoryCatalogProjector::default();
        let cache = ThreadCacheBuilder::new(1000)
            .with_catalog_projector(projector.clone())
            .build()
            .unwrap();
        let catalog = CatalogId::from(board());
        projector.set_snapshot(catalog.clone(), vec![thread(1)]);

        assert!(!cache.contains(&ChanDescriptor::Catalog(catalog.clone())));

        cache.put_thread_posts(thread_posts(1, 0), CacheOptions::InMemory);
        assert!(cache.contains(&ChanDescriptor::Catalog(catalog.clone())));

        cache.delete_post(&thread(1).original_post());
        assert!(!cache.contains(&ChanDescriptor::Catalog(catalog)));
    }

    #[test_log::test]
    fn test_eviction_keeps_recently_accessed_thread() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_for_test(6, 1, clock.clone());
        let a = thread(1);
        let b = thread(100);

        // The first write runs a scan right away, nothing to evict yet.
        cache.put_thread_posts(thread_posts(1, 4), CacheOptions::InMemory);
        clock.advance(Duration::from_secs(1));
        cache.put_thread_posts(thread_posts(100, 2), CacheOptions::InMemory);
        clock.advance(Duration::from_secs(1));
        assert!(cache.update_last_access_time(&b));
        assert_eq!(cache.get_total_cached_posts_count(), 8);

        clock.advance(ThreadCacheConfig::DEFAULT_EVICTION_COOLDOWN);
        cache.put_catalog_original_posts([OriginalPost::new(&b, PostContent::default())]);

        assert_eq!(cache.get_thread_cached_posts_count(&a), None);
        assert_eq!(cache.get_thread_cached_posts_count(&b), Some(3));
        assert!(cache.get_total_cached_posts_count() <= 6);
    }

    #[test]
    fn test_eviction_cooldown() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_for_test(4, 0, clock.clone());

        // The first write scans right away and opens the cooldown window.
        cache.put_thread_posts(thread_posts(1, 4), CacheOptions::InMemory);
        assert_eq!(cache.get_cached_threads_count(), 0);

        cache.put_thread_posts(thread_posts(10, 4), CacheOptions::InMemory);
        clock.advance(Duration::from_secs(14));
        cache.put_thread_posts(thread_posts(20, 4), CacheOptions::InMemory);
        // Still inside the window.
        assert_eq!(cache.get_cached_threads_count(), 2);

        clock.advance(Duration::from_secs(1));
        cache.put_thread_posts(thread_posts(30, 4), CacheOptions::InMemory);
        assert_eq!(cache.get_cached_threads_count(), 0);
    }

    #[test]
    fn test_delete_all_resets_cooldown() {
        let listener = Arc::new(RecordingListener::default());
        let clock = Arc::new(ManualClock::new());
        let cache = ThreadCacheBuilder::new(4)
            .with_immunity_count(0)
            .with_clock(clock.clone())
            .with_event_listener(listener.clone())
            .build()
            .unwrap();

        cache.put_thread_posts(thread_posts(1, 1), CacheOptions::InMemory);
        assert_eq!(cache.delete_all(), 1);
        assert_eq!(cache.get_total_cached_posts_count(), 0);
        assert_eq!(listener.events.lock().as_slice(), &[(Event::Clear, thread(1), 2)]);

        // No time passed, yet the scan runs.
        cache.put_thread_posts(thread_posts(1, 9), CacheOptions::InMemory);
        assert_eq!(cache.get_cached_threads_count(), 0);
        assert_eq!(listener.events.lock().last(), Some(&(Event::Evict, thread(1), 10)));
    }

    #[test]
    fn test_read_inside_visitor_with_queued_writer() {
        let cache = ThreadCacheBuilder::new(1000).build().unwrap();
        let t = thread(1);
        cache.put_thread_posts(thread_posts(1, 2), CacheOptions::InMemory);

        let (tx, rx) = mpsc::channel();
        let reader = {
            let cache = cache.clone();
            let t = t.clone();
            std::thread::spawn(move || {
                let mut writer = None;
                let mut found = vec![];
                cache.iterate_posts_ordered(&t, |post| {
                    if writer.is_none() {
                        let cache = cache.clone();
                        let t = t.clone();
                        writer = Some(std::thread::spawn(move || cache.mark_thread_as_deleted(&t, true)));
                        // Let the writer queue up on the lock.
                        std::thread::sleep(Duration::from_millis(200));
                    }
                    found.push(cache.get_post(post.id()).is_some());
                });
                tx.send(found).unwrap();
                writer.unwrap().join().unwrap()
            })
        };

        let found = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("read inside the visitor is blocked by the queued writer");
        assert_eq!(found, vec![true; 3]);
        assert!(reader.join().unwrap());
        assert!(cache.is_thread_deleted(&t));
    }

    #[derive(Debug, Default)]
    struct RecordedGauge(Mutex<f64>);

    impl GaugeFn for RecordedGauge {
        fn increment(&self, value: f64) {
            *self.0.lock() += value;
        }

        fn decrement(&self, value: f64) {
            *self.0.lock() -= value;
        }

        fn set(&self, value: f64) {
            *self.0.lock() = value;
        }
    }

    #[derive(Debug, Default)]
    struct GaugeRecorder {
        gauges: Mutex<HashMap<String, Arc<RecordedGauge>>>,
    }

    impl GaugeRecorder {
        fn value(&self, name: &str) -> f64 {
            self.gauges.lock().get(name).map(|gauge| *gauge.0.lock()).unwrap_or_default()
        }
    }

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let gauge = self.gauges.lock().entry(key.name().to_string()).or_default().clone();
            Gauge::from_arc(gauge)
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_usage_gauges_follow_every_write() {
        let recorder = GaugeRecorder::default();
        let cache = metrics::with_local_recorder(&recorder, || {
            ThreadCacheBuilder::new(1000)
                .with_name("usage")
                .with_clock(ManualClock::new())
                .build()
                .unwrap()
        });
        let usage = || {
            (
                recorder.value("chancache_cached_threads"),
                recorder.value("chancache_cached_posts"),
            )
        };

        cache.put_thread_posts(thread_posts(1, 3), CacheOptions::InMemory);
        assert_eq!(usage(), (1.0, 4.0));

        // Inside the cooldown window, no scan runs.
        cache.put_thread_posts(thread_posts(10, 1), CacheOptions::InMemory);
        assert_eq!(usage(), (2.0, 6.0));

        cache.delete_post(&thread(1).post(2));
        assert_eq!(usage(), (2.0, 5.0));

        cache.put_catalog_original_posts([OriginalPost::new(&thread(20), PostContent::default())]);
        assert_eq!(usage(), (3.0, 6.0));

        cache.delete_threads(&[thread(10)]);
        assert_eq!(usage(), (2.0, 4.0));

        cache.delete_all();
        assert_eq!(usage(), (0.0, 0.0));
    }
}
