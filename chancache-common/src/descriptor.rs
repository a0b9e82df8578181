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

//! Identifiers of boards, catalogs, threads and posts.
//!
//! All descriptors are small immutable values. The string parts are reference counted, so cloning a descriptor
//! never copies the site or board name.

use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// A board of a site, e.g. `4chan/g`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoardId {
    site: Arc<str>,
    code: Arc<str>,
}

impl BoardId {
    /// Create a board descriptor from the site name and the board code.
    pub fn new(site: impl Into<Arc<str>>, code: impl Into<Arc<str>>) -> Self {
        Self {
            site: site.into(),
            code: code.into(),
        }
    }

    /// Site name.
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Board code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Descriptor of the thread `thread_no` on this board.
    pub fn thread(&self, thread_no: u64) -> ThreadId {
        ThreadId::new(self.clone(), thread_no)
    }
}

impl Display for BoardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.site, self.code)
    }
}

/// A thread of a board.
///
/// Threads of the same board are ordered by thread number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId {
    board: BoardId,
    thread_no: u64,
}

impl ThreadId {
    /// Create a thread descriptor.
    pub fn new(board: BoardId, thread_no: u64) -> Self {
        Self { board, thread_no }
    }

    /// The board the thread lives on.
    pub fn board(&self) -> &BoardId {
        &self.board
    }

    /// Thread number. Equals the post number of the thread's original post.
    pub fn thread_no(&self) -> u64 {
        self.thread_no
    }

    /// Descriptor of the post `post_no` in this thread.
    pub fn post(&self, post_no: u64) -> PostId {
        PostId::new(self.clone(), post_no)
    }

    /// Descriptor of the original post of this thread.
    pub fn original_post(&self) -> PostId {
        PostId::new(self.clone(), self.thread_no)
    }
}

impl Display for ThreadId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.board, self.thread_no)
    }
}

/// A post of a thread.
///
/// `post_sub_no` is `0` for regular posts. Archives may expose several "ghost" posts under the same post number, they
/// are told apart by the sub number. Posts of a thread are ordered by `(post_no, post_sub_no)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostId {
    thread: ThreadId,
    post_no: u64,
    post_sub_no: u64,
}

impl PostId {
    /// Create a post descriptor with sub number `0`.
    pub fn new(thread: ThreadId, post_no: u64) -> Self {
        Self {
            thread,
            post_no,
            post_sub_no: 0,
        }
    }

    /// Set the sub number of the post.
    pub fn with_sub_no(mut self, post_sub_no: u64) -> Self {
        self.post_sub_no = post_sub_no;
        self
    }

    /// The thread the post belongs to.
    pub fn thread(&self) -> &ThreadId {
        &self.thread
    }

    /// Post number.
    pub fn post_no(&self) -> u64 {
        self.post_no
    }

    /// Post sub number.
    pub fn post_sub_no(&self) -> u64 {
        self.post_sub_no
    }

    /// Position of the post inside its thread.
    pub fn ordinal(&self) -> (u64, u64) {
        (self.post_no, self.post_sub_no)
    }

    /// Whether the descriptor points at the original post of its thread.
    pub fn is_original_post(&self) -> bool {
        self.post_no == self.thread.thread_no && self.post_sub_no == 0
    }
}

impl Display for PostId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.post_sub_no == 0 {
            write!(f, "{}/{}", self.thread, self.post_no)
        } else {
            write!(f, "{}/{},{}", self.thread, self.post_no, self.post_sub_no)
        }
    }
}

/// A catalog: the listing of threads of one board, or of several boards combined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CatalogId {
    /// Catalog of a single board.
    Board(BoardId),
    /// User assembled catalog built from multiple boards.
    Composite(Arc<[BoardId]>),
}

impl CatalogId {
    /// Create a composite catalog descriptor.
    pub fn composite(boards: impl IntoIterator<Item = BoardId>) -> Self {
        Self::Composite(boards.into_iter().collect())
    }

    /// Boards the catalog is made of.
    pub fn boards(&self) -> &[BoardId] {
        match self {
            CatalogId::Board(board) => std::slice::from_ref(board),
            CatalogId::Composite(boards) => boards,
        }
    }
}

impl From<BoardId> for CatalogId {
    fn from(board: BoardId) -> Self {
        Self::Board(board)
    }
}

impl Display for CatalogId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogId::Board(board) => write!(f, "{board}"),
            CatalogId::Composite(boards) => {
                write!(f, "composite[")?;
                for (i, board) in boards.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{board}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Either a thread or a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChanDescriptor {
    /// A thread.
    Thread(ThreadId),
    /// A catalog.
    Catalog(CatalogId),
}

impl From<ThreadId> for ChanDescriptor {
    fn from(thread: ThreadId) -> Self {
        Self::Thread(thread)
    }
}

impl From<CatalogId> for ChanDescriptor {
    fn from(catalog: CatalogId) -> Self {
        Self::Catalog(catalog)
    }
}

impl Display for ChanDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChanDescriptor::Thread(thread) => write!(f, "thread {thread}"),
            ChanDescriptor::Catalog(catalog) => write!(f, "catalog {catalog}"),
        }
    }
}
