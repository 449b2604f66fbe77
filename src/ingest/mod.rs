//! Upload decoding.
//!
//! This module is responsible for:
//! - Decoding the uploaded byte buffer in-memory
//! - Normalizing every upload to a 3-channel RGB8 pixel array
//!
//! It MUST NOT:
//! - Touch the filesystem
//! - Retain pixels beyond the request that carried them

use anyhow::{Context, Result};
use image::RgbImage;

/// Decode an uploaded image (any format the `image` crate understands)
/// into tightly-packed RGB8.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes).context("failed to decode uploaded image")?;
    Ok(decoded.to_rgb8())
}
