//! shell-core
//!
//! Shared data model for Shell Reserve: fundamental identifier types,
//! protocol constants, the consensus error taxonomy, and the block header
//! wire format. Every other crate in the workspace builds on this one.

pub mod constants;
pub mod error;
pub mod header;
pub mod types;

pub use error::ShellError;
pub use header::BlockHeader;
pub use types::{Amount, Hash256, OutPoint, PubKey, Signature, Timestamp};
