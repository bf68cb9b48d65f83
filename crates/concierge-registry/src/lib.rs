//! Static directory of the vendor integration apps.
//!
//! The host runtime links this crate, builds the builtin registry once,
//! and routes every tool invocation and webhook delivery through it.

pub mod registry;

pub use registry::AppRegistry;
