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

use crate::descriptor::ThreadId;

/// Reason a thread left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Dropped by the eviction routine.
    Evict,
    /// Deleted explicitly.
    Remove,
    /// Dropped by a full cache clear.
    Clear,
}

/// Trait for the customized event listener.
///
/// Listeners are always invoked after the cache lock is released, so they may call back into the cache.
pub trait EventListener: Send + Sync + 'static {
    /// Called when a thread leaves the cache, with the number of posts it held.
    #[expect(unused_variables)]
    fn on_leave(&self, event: Event, thread: &ThreadId, posts_count: usize) {}
}
