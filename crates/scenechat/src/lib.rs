//! An assistant for a 3D content-creation tool that answers in speech and
//! runnable scripts.
//!
//! The crate bundles host integrations (script interpreters and audio
//! players) and a terminal front end. It can also be used as a library to
//! bring the assistant into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod host;

/// Re-exports of [`scenechat_core`] crate.
pub mod core {
    pub use scenechat_core::*;
}
