// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Either [`std::time::Instant`] or, under test, a clock that only moves when the test says
//! so. Close-command deadlines are measured against this, which is how the timeout tests
//! stay deterministic.

#[cfg(not(test))]
pub use std::time::Instant;
#[cfg(test)]
pub use test::Instant;
