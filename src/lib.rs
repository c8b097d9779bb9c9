//! Capability-token gated image delivery.
//!
//! Clients obtain short-lived signed tokens bound to a gallery (optionally to
//! one image in it) and present them when fetching images. Each fetch is
//! verified, checked against the replay registry so a token is accepted only
//! once, and then streamed from a sandboxed directory tree with HTTP Range
//! support.

pub mod config;
pub mod error;
pub mod logging;
pub mod replay;
pub mod server;
pub mod storage;
pub mod token;
