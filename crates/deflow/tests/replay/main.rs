//! Decision cycles replayed over synthetic histories.
//!
//! Each scenario records the history a workflow run would have produced up to
//! some point, runs one decision cycle over it and checks the batch.

mod branching;
mod lifecycle;
mod logging;
mod properties;
mod recovery;
mod support;
