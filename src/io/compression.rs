//! Codec detection for the index and dump inputs.
//!
//! Both inputs are compressed, usually with multistream bzip2. A codec is
//! picked from the file extension first and from the leading magic bytes when
//! the extension is not recognized; anything else is read as plain bytes.
//!
//! ## Built-in Codecs
//!
//! - **Bzip2** (`.bz2`) - always available, multistream aware
//! - **Gzip** (`.gz`) - via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` (feature: `compression-zstd`)
//! - **Xz** (`.xz`) - via `xz2` (feature: `compression-xz`)
//!
//! Every decoder accepts concatenated streams, so a byte range holding one or
//! more whole compression blocks decodes the same as the full file would.

use crate::error::{ConvertError, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Boxed decompressing reader that can move between threads.
pub type DynRead = Box<dyn Read + Send>;

/// Boxed compressing writer.
pub type DynWrite = Box<dyn Write + Send>;

/// A compression format understood by the converter.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "bzip2").
    fn name(&self) -> &'static str;

    /// Lowercase file extensions including the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Signature at the start of a compressed stream, if the format has one.
    fn magic_bytes(&self) -> Option<&'static [u8]>;

    /// Wrap a reader with decompression.
    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead>;

    /// Wrap a writer with compression.
    fn wrap_writer(&self, writer: DynWrite) -> std::io::Result<DynWrite>;
}

static CODECS: &[&dyn CompressionCodec] = &[
    &Bzip2Codec,
    #[cfg(feature = "compression-gzip")]
    &GzipCodec,
    #[cfg(feature = "compression-zstd")]
    &ZstdCodec,
    #[cfg(feature = "compression-xz")]
    &XzCodec,
];

/// Pass-through codec for uncompressed input.
pub static PLAIN: &dyn CompressionCodec = &PlainCodec;

/// The codecs compiled into this build, in detection order.
#[must_use]
pub fn builtin_codecs() -> &'static [&'static dyn CompressionCodec] {
    CODECS
}

/// Codec whose extension matches `path`, case-insensitively.
#[must_use]
pub fn codec_for_extension(path: impl AsRef<Path>) -> Option<&'static dyn CompressionCodec> {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    CODECS
        .iter()
        .copied()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
}

/// Codec whose magic bytes prefix `head`.
#[must_use]
pub fn codec_for_magic(head: &[u8]) -> Option<&'static dyn CompressionCodec> {
    CODECS.iter().copied().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| head.starts_with(magic))
    })
}

/// Pick the codec for a file on disk: extension first, then the leading
/// bytes of the file, falling back to [`PLAIN`].
///
/// # Errors
/// Returns [`ConvertError::Io`] if the file cannot be opened or read.
pub fn detect_codec(path: impl AsRef<Path>) -> Result<&'static dyn CompressionCodec> {
    let path = path.as_ref();
    if let Some(codec) = codec_for_extension(path) {
        return Ok(codec);
    }
    let mut file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let mut head = [0u8; 8];
    let mut filled = 0;
    while filled < head.len() {
        let n = file
            .read(&mut head[filled..])
            .map_err(|e| ConvertError::io(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(codec_for_magic(&head[..filled]).unwrap_or(PLAIN))
}

/// Open `path` and wrap it with the detected decompressor.
///
/// # Errors
/// Returns [`ConvertError::Io`] if the file cannot be opened or the
/// decompressor cannot be set up.
pub fn open_decoded(path: impl AsRef<Path>) -> Result<DynRead> {
    let path = path.as_ref();
    let codec = detect_codec(path)?;
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    codec
        .wrap_reader(Box::new(file))
        .map_err(|e| ConvertError::io(path, e))
}

/// Create `path` and wrap it with the compressor matching its extension.
/// Unknown extensions produce a plain buffered writer.
///
/// # Errors
/// Returns [`ConvertError::Io`] if the file cannot be created.
pub fn create_encoded(path: impl AsRef<Path>) -> Result<DynWrite> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
    let codec = codec_for_extension(path).unwrap_or(PLAIN);
    codec
        .wrap_writer(Box::new(BufWriter::new(file)))
        .map_err(|e| ConvertError::io(path, e))
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

struct PlainCodec;

impl CompressionCodec for PlainCodec {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn magic_bytes(&self) -> Option<&'static [u8]> {
        None
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        Ok(reader)
    }

    fn wrap_writer(&self, writer: DynWrite) -> std::io::Result<DynWrite> {
        Ok(writer)
    }
}

struct Bzip2Codec;

impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&'static [u8]> {
        Some(b"BZh")
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        use bzip2::read::MultiBzDecoder;
        Ok(Box::new(MultiBzDecoder::new(reader)))
    }

    fn wrap_writer(&self, writer: DynWrite) -> std::io::Result<DynWrite> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&'static [u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer(&self, writer: DynWrite) -> std::io::Result<DynWrite> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&'static [u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as DynRead)
    }

    fn wrap_writer(&self, writer: DynWrite) -> std::io::Result<DynWrite> {
        zstd::stream::write::Encoder::new(writer, 3).map(|e| Box::new(e.auto_finish()) as DynWrite)
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &'static str {
        "xz"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&'static [u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        use xz2::read::XzDecoder;
        Ok(Box::new(XzDecoder::new_multi_decoder(reader)))
    }

    fn wrap_writer(&self, writer: DynWrite) -> std::io::Result<DynWrite> {
        use xz2::write::XzEncoder;
        Ok(Box::new(XzEncoder::new(writer, 6)))
    }
}
