//! Domain models for the plugin host
//!
//! Identifiers, digests and contexts without any I/O concerns beyond
//! reading a file to digest it.

mod context;
mod digest;
mod id;

pub use context::{Context, ContextError};
pub use digest::FileDigest;
pub use id::{IdError, PluginId, PluginName};
