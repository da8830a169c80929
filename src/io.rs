//! Input decoding.
//!
//! - [`compression`] - codec detection and decompressing readers for the
//!   index and dump files

pub mod compression;

pub use compression::{CompressionCodec, detect_codec, open_decoded};
