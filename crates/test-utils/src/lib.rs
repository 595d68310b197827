//! Shared test helpers for deflow.
//!
//! - [`HistoryBuilder`] records synthetic workflow histories the way the
//!   orchestrating service would, so decision cycles can be replayed in tests.

mod history;

pub use history::HistoryBuilder;
