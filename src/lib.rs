//! Purpose: Streaming CSV engine backing the `csvcache` CLI and tests.
//! Exports: `api` (readers, cache, view, options, typed values, errors) and `notice`.
//! Role: `core` holds the implementation; `api` is the supported public path.
//! Invariants: Records are parsed eagerly, one logical record per read.
//! Invariants: Output never depends on the configured buffer size.
pub mod api;
pub mod core;
pub mod notice;
