//! Filesystem watcher: observes a root directory recursively and emits
//! one analysis job per meaningful change, after ignore filtering and
//! per-file debouncing.

pub mod debounce;
pub mod watcher;

pub use codeloom_common::PathFilter;
pub use debounce::Debouncer;
