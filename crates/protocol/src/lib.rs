//! Shared protocol crate for the cellarena server.
//!
//! This crate contains:
//! - Binary reading/writing utilities
//! - Client packet parsing and encoding
//! - Server packet builders and the records they carry

mod binary;
mod error;
pub mod packets;

pub use binary::{BinaryReader, BinaryWriter, MAX_STRING_LEN};
pub use error::ProtocolError;

/// A 2D world position using glam's Vec2.
pub type Position = glam::Vec2;
