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

use std::{fmt::Display, sync::Arc};

use chancache_common::descriptor::{PostId, ThreadId};
use serde::{Deserialize, Serialize};

/// Attachment of a post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostImage {
    /// File name on the image server.
    pub server_filename: String,
    /// File extension without the dot.
    pub extension: String,
    /// File size in bytes.
    pub size: u64,
}

/// Content of a post. Opaque to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostContent {
    /// Poster name.
    pub name: String,
    /// Subject line.
    pub subject: Option<String>,
    /// Comment body.
    pub comment: String,
    /// Unix timestamp in seconds.
    pub posted_at: u64,
    /// Attachments.
    pub images: Vec<PostImage>,
}

impl PostContent {
    /// Content made of a comment only.
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..Default::default()
        }
    }
}

/// Fields shared by original posts and replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostData {
    /// Post descriptor.
    pub id: PostId,
    /// Post content.
    pub content: PostContent,
    /// Whether the post was deleted on the server.
    pub deleted: bool,
}

impl PostData {
    /// Create a live post.
    pub fn new(id: PostId, content: PostContent) -> Self {
        Self {
            id,
            content,
            deleted: false,
        }
    }
}

/// Server reported counters of a thread, carried by its original post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreadStats {
    /// Replies in the thread, the original post excluded.
    pub replies: usize,
    /// Images in the thread.
    pub images: usize,
    /// Distinct posters.
    pub unique_ips: usize,
}

/// Root post of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalPost {
    /// Common post fields.
    pub data: PostData,
    /// Thread counters.
    pub stats: ThreadStats,
    /// Pinned to the top of the catalog.
    pub sticky: bool,
    /// Closed for new replies.
    pub closed: bool,
    /// Moved to the archive.
    pub archived: bool,
    /// Unix timestamp in seconds of the last server side modification. `0` if unknown.
    pub last_modified: i64,
}

impl OriginalPost {
    /// Create the original post of `thread`.
    pub fn new(thread: &ThreadId, content: PostContent) -> Self {
        Self {
            data: PostData::new(thread.original_post(), content),
            stats: ThreadStats::default(),
            sticky: false,
            closed: false,
            archived: false,
            last_modified: 0,
        }
    }

    /// Descriptor of the post.
    pub fn id(&self) -> &PostId {
        &self.data.id
    }

    /// Descriptor of the thread.
    pub fn thread_id(&self) -> &ThreadId {
        self.data.id.thread()
    }
}

/// Any non-root post of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPost {
    /// Common post fields.
    pub data: PostData,
}

impl ReplyPost {
    /// Create a reply.
    pub fn new(id: PostId, content: PostContent) -> Self {
        Self {
            data: PostData::new(id, content),
        }
    }

    /// Descriptor of the post.
    pub fn id(&self) -> &PostId {
        &self.data.id
    }
}

/// A post held by the cache.
///
/// Posts are immutable once shared. Cloning a post only bumps a reference count, so posts handed out by the cache are
/// cheap immutable views of its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Post {
    /// Root post of a thread.
    Original(Arc<OriginalPost>),
    /// Non-root post of a thread.
    Reply(Arc<ReplyPost>),
}

impl From<OriginalPost> for Post {
    fn from(post: OriginalPost) -> Self {
        Self::Original(Arc::new(post))
    }
}

impl From<Arc<OriginalPost>> for Post {
    fn from(post: Arc<OriginalPost>) -> Self {
        Self::Original(post)
    }
}

impl From<ReplyPost> for Post {
    fn from(post: ReplyPost) -> Self {
        Self::Reply(Arc::new(post))
    }
}

impl From<Arc<ReplyPost>> for Post {
    fn from(post: Arc<ReplyPost>) -> Self {
        Self::Reply(post)
    }
}

impl Post {
    /// Common post fields.
    pub fn data(&self) -> &PostData {
        match self {
            Post::Original(post) => &post.data,
            Post::Reply(post) => &post.data,
        }
    }

    /// Descriptor of the post.
    pub fn id(&self) -> &PostId {
        &self.data().id
    }

    /// Descriptor of the thread the post belongs to.
    pub fn thread_id(&self) -> &ThreadId {
        self.id().thread()
    }

    /// Post content.
    pub fn content(&self) -> &PostContent {
        &self.data().content
    }

    /// Whether the post was deleted on the server.
    pub fn is_deleted(&self) -> bool {
        self.data().deleted
    }

    /// Whether the post is the root post of its thread.
    pub fn is_original(&self) -> bool {
        matches!(self, Post::Original(_))
    }

    /// The original post, if this is one.
    pub fn as_original(&self) -> Option<&Arc<OriginalPost>> {
        match self {
            Post::Original(post) => Some(post),
            Post::Reply(_) => None,
        }
    }
}

/// 128-bit content hash of a post, computed by the change detection logic outside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PostHash(pub u128);

impl From<u128> for PostHash {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Display for PostHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}
