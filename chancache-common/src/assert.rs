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

//! Assertions for invariants whose violation means a caller bug.
//!
//! Each crate using these macros forwards its own `strict_assertions` feature, since `cfg` is evaluated in the crate
//! the macro expands in.

/// `assert!` with feature "strict_assertions", `debug_assert!` without.
#[macro_export]
macro_rules! strict_assert {
    ($($arg:tt)*) => {
        #[cfg(feature = "strict_assertions")]
        assert!($($arg)*);
        #[cfg(not(feature = "strict_assertions"))]
        debug_assert!($($arg)*);
    }
}

/// Whether strict checks are compiled in by default.
///
/// Runtime checks that are too expensive for every build (e.g. validating every post of a batch) consult this value
/// unless the caller overrides it.
pub const fn strict_checks_by_default() -> bool {
    cfg!(any(debug_assertions, feature = "strict_assertions"))
}
