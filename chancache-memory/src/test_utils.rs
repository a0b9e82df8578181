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

//! Utilities for testing.

use chancache_common::descriptor::{BoardId, ThreadId};

use crate::post::{OriginalPost, Post, PostContent, ReplyPost};

/// Board every test thread lives on.
pub fn board() -> BoardId {
    BoardId::new("test", "b")
}

/// Thread `thread_no` of the test board.
pub fn thread(thread_no: u64) -> ThreadId {
    board().thread(thread_no)
}

/// Original post of `thread`.
pub fn original_post(thread: &ThreadId) -> Post {
    Post::from(OriginalPost::new(thread, PostContent::with_comment(format!("op {thread}"))))
}

/// Reply `post_no` of `thread`.
pub fn reply(thread: &ThreadId, post_no: u64) -> Post {
    reply_with_comment(thread, post_no, format!("reply {post_no}"))
}

/// Reply `post_no` of `thread` with the given comment.
pub fn reply_with_comment(thread: &ThreadId, post_no: u64, comment: impl Into<String>) -> Post {
    Post::from(ReplyPost::new(thread.post(post_no), PostContent::with_comment(comment)))
}

/// The original post of thread `thread_no` followed by `replies` replies numbered after it.
pub fn thread_posts(thread_no: u64, replies: u64) -> Vec<Post> {
    let thread = thread(thread_no);
    std::iter::once(original_post(&thread))
        .chain((1..=replies).map(|i| reply(&thread, thread_no + i)))
        .collect()
}

/// Post numbers of `posts`, in order.
pub fn post_nos(posts: &[Post]) -> Vec<u64> {
    posts.iter().map(|post| post.id().post_no()).collect()
}
