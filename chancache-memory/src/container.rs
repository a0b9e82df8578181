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

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use chancache_common::descriptor::{PostId, ThreadId};
use hashbrown::HashMap;

use crate::post::{OriginalPost, Post, PostHash, ReplyPost};

/// Posts of exactly one thread.
///
/// The container has no lock of its own. It is owned by the thread cache and only touched under the cache lock.
///
/// Invariants:
///
/// - Iteration yields the original post first (if known), then replies ascending by `(post_no, post_sub_no)`.
/// - A [`PostId`] maps to at most one post.
/// - `posts_count() == original.is_some() as usize + replies_count()`.
///
/// Cloning a container produces a snapshot that shares the immutable posts with the original.
#[derive(Debug, Clone)]
pub struct PostContainer {
    thread_id: ThreadId,

    original: Option<Arc<OriginalPost>>,
    /// Keyed by [`PostId::ordinal`], all replies share `thread_id`.
    replies: BTreeMap<(u64, u64), Arc<ReplyPost>>,

    /// Independent of the posts: entries may outlive the post they were computed for.
    hashes: HashMap<PostId, PostHash>,

    deleted: bool,
    last_access: Instant,

    strict_checks: bool,
}

impl PostContainer {
    /// Create an empty container for `thread_id`.
    ///
    /// With `strict_checks`, every post written is validated against `thread_id` and a mismatch panics.
    pub fn new(thread_id: ThreadId, now: Instant, strict_checks: bool) -> Self {
        Self {
            thread_id,
            original: None,
            replies: BTreeMap::new(),
            hashes: HashMap::new(),
            deleted: false,
            last_access: now,
            strict_checks,
        }
    }

    /// Descriptor of the thread.
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    fn check_owned(&self, id: &PostId) {
        if self.strict_checks {
            assert_eq!(
                id.thread(),
                &self.thread_id,
                "post {id} written into the container of thread {}",
                self.thread_id
            );
        }
    }

    /// Insert the original post, or replace the known one.
    ///
    /// The server counters and `last_modified` are only taken from the incoming post if it is not older than the
    /// known one, so a stale catalog snapshot cannot roll them back.
    ///
    /// Returns the stored post.
    pub fn set_or_update_original_post(&mut self, post: Arc<OriginalPost>) -> Arc<OriginalPost> {
        self.check_owned(post.id());
        if self.strict_checks {
            assert!(
                post.id().is_original_post(),
                "post {} is not the original post of its thread",
                post.id()
            );
        }

        let stored = match &self.original {
            Some(known) if known.last_modified > post.last_modified => {
                let mut merged = OriginalPost::clone(&post);
                merged.stats = known.stats;
                merged.last_modified = known.last_modified;
                Arc::new(merged)
            }
            _ => post,
        };
        self.original = Some(stored.clone());
        stored
    }

    /// Insert new posts and replace known ones, last write wins for duplicates.
    ///
    /// Input order does not matter, replies are kept ordered by post number.
    pub fn add_or_update_posts(&mut self, posts: impl IntoIterator<Item = Post>) {
        for post in posts {
            match post {
                Post::Original(post) => {
                    self.set_or_update_original_post(post);
                }
                Post::Reply(reply) => {
                    self.check_owned(reply.id());
                    if reply.id().is_original_post() {
                        if self.strict_checks {
                            panic!("reply {} claims the original post slot", reply.id());
                        }
                        tracing::warn!("[post container]: skip reply {} claiming the original post slot", reply.id());
                        continue;
                    }
                    self.replies.insert(reply.id().ordinal(), reply);
                }
            }
        }
    }

    /// Get a post by descriptor.
    pub fn get_post(&self, id: &PostId) -> Option<Post> {
        if id.thread() != &self.thread_id {
            return None;
        }
        if id.is_original_post() {
            return self.original.clone().map(Post::Original);
        }
        self.replies.get(&id.ordinal()).cloned().map(Post::Reply)
    }

    /// Whether a post with the descriptor is stored.
    pub fn contains_post(&self, id: &PostId) -> bool {
        if id.thread() != &self.thread_id {
            return false;
        }
        if id.is_original_post() {
            return self.original.is_some();
        }
        self.replies.contains_key(&id.ordinal())
    }

    /// The original post, `None` until it has been set.
    pub fn original_post(&self) -> Option<&Arc<OriginalPost>> {
        self.original.as_ref()
    }

    /// The reply with the highest post number, else the original post.
    pub fn last_post(&self) -> Option<Post> {
        match self.replies.last_key_value() {
            Some((_, reply)) => Some(Post::Reply(reply.clone())),
            None => self.original.clone().map(Post::Original),
        }
    }

    /// Iterate posts in thread order without collecting them.
    pub fn iter_posts(&self) -> impl Iterator<Item = Post> + '_ {
        self.original
            .iter()
            .cloned()
            .map(Post::Original)
            .chain(self.replies.values().cloned().map(Post::Reply))
    }

    /// All posts in thread order.
    pub fn get_posts(&self) -> Vec<Post> {
        let mut posts = Vec::with_capacity(self.posts_count());
        posts.extend(self.iter_posts());
        posts
    }

    /// All posts in thread order, as currently held in memory.
    ///
    /// Used by the persistence layer to decide what to write.
    pub fn get_all_posts_for_database_persisting(&self) -> Vec<Post> {
        self.get_posts()
    }

    /// Descriptors of all posts in thread order.
    pub fn post_ids(&self) -> impl Iterator<Item = PostId> + '_ {
        self.original
            .iter()
            .map(|post| post.id().clone())
            .chain(self.replies.values().map(|reply| reply.id().clone()))
    }

    /// Remove a post. Removing the original post keeps the container, [`Self::original_post`] returns `None`
    /// afterwards.
    ///
    /// The hash of the post, if any, is kept.
    pub fn delete_post(&mut self, id: &PostId) -> Option<Post> {
        if id.thread() != &self.thread_id {
            return None;
        }
        if id.is_original_post() {
            return self.original.take().map(Post::Original);
        }
        self.replies.remove(&id.ordinal()).map(Post::Reply)
    }

    /// Remove all replies, keeping the original post and the hashes. Returns how many were removed.
    pub fn clear_replies(&mut self) -> usize {
        let removed = self.replies.len();
        self.replies.clear();
        removed
    }

    /// Record the content hash of a post.
    pub fn put_post_hash(&mut self, id: PostId, hash: PostHash) {
        self.check_owned(&id);
        self.hashes.insert(id, hash);
    }

    /// Last recorded content hash of a post, even if the post itself is gone.
    pub fn get_post_hash(&self, id: &PostId) -> Option<PostHash> {
        self.hashes.get(id).copied()
    }

    /// All recorded hashes, in no particular order.
    pub fn post_hashes(&self) -> impl Iterator<Item = (&PostId, &PostHash)> {
        self.hashes.iter()
    }

    /// Number of recorded hashes.
    pub fn post_hashes_count(&self) -> usize {
        self.hashes.len()
    }

    /// Forget all hashes. Posts are untouched.
    pub fn clear_post_hashes(&mut self) {
        self.hashes.clear();
    }

    /// Mark the whole thread deleted on the server.
    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Whether the whole thread was deleted on the server.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Refresh the access time. Never moves it backwards.
    pub fn update_last_access_time(&mut self, now: Instant) {
        self.last_access = self.last_access.max(now);
    }

    /// Last access time.
    pub fn last_access_time(&self) -> Instant {
        self.last_access
    }

    /// Whether the original post is known or at least one reply is stored.
    pub fn has_at_least_one_post(&self) -> bool {
        self.original.is_some() || !self.replies.is_empty()
    }

    /// Stored posts, the original post included.
    pub fn posts_count(&self) -> usize {
        usize::from(self.original.is_some()) + self.replies.len()
    }

    /// Stored replies.
    pub fn replies_count(&self) -> usize {
        self.replies.len()
    }
}
