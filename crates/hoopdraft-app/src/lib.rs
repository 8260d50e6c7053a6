// Library root for the hoopdraft binary: configuration, storage, and the
// match runner. Exposed as a library so integration tests can drive them.

pub mod config;
pub mod db;
pub mod runner;
pub mod sse;
