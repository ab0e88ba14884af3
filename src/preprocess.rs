//! Brand-logo preparation: decode, key out a flat background, report the ratio.
//!
//! The keying is a corner-sample heuristic. It assumes the top-left pixel is
//! background, and only runs when that pixel is close to opaque. Logos on
//! gradients or with a subject touching the corner are not handled.

use image::{GenericImageView, RgbaImage};

/// Corner alpha above which the background is treated as opaque and keyed.
pub const OPAQUE_THRESHOLD: u8 = 200;
/// Per-channel distance from the corner color that counts as background.
pub const CHANNEL_TOLERANCE: u8 = 40;

/// Optional brand image as supplied by the asset store.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoAsset {
    pub bytes: Vec<u8>,
    /// Width / height remembered from a previous decode, if any.
    pub cached_ratio: Option<f32>,
}

impl LogoAsset {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            cached_ratio: None,
        }
    }

    pub fn with_ratio(bytes: Vec<u8>, ratio: f32) -> Self {
        Self {
            bytes,
            cached_ratio: Some(ratio),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedLogo {
    /// Decoded and keyed pixels, or `None` when decoding failed.
    pub image: Option<RgbaImage>,
    pub aspect_ratio: f32,
    pub keyed: bool,
}

impl PreparedLogo {
    pub fn is_drawable(&self) -> bool {
        self.image.is_some()
    }
}

/// Never fails: an undecodable logo yields no pixels and a best-effort ratio.
pub fn prepare_logo(asset: &LogoAsset) -> PreparedLogo {
    let fallback_ratio = asset
        .cached_ratio
        .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
        .unwrap_or(1.0);
    let decoded = match image::load_from_memory(&asset.bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::warn!("logo decode failed, continuing without logo: {err}");
            return PreparedLogo {
                image: None,
                aspect_ratio: fallback_ratio,
                keyed: false,
            };
        }
    };
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        log::warn!("logo has no pixels, continuing without logo");
        return PreparedLogo {
            image: None,
            aspect_ratio: fallback_ratio,
            keyed: false,
        };
    }
    let mut pixels = decoded.to_rgba8();
    let keyed = strip_background(&mut pixels);
    log::debug!("logo prepared: {width}x{height}, background keyed: {keyed}");
    PreparedLogo {
        image: Some(pixels),
        aspect_ratio: width as f32 / height as f32,
        keyed,
    }
}

/// Zeroes the alpha of every pixel within tolerance of the top-left color.
/// Returns false (image untouched) when the corner is already transparent.
pub fn strip_background(pixels: &mut RgbaImage) -> bool {
    let Some(corner) = pixels.get_pixel_checked(0, 0).copied() else {
        return false;
    };
    if corner[3] <= OPAQUE_THRESHOLD {
        return false;
    }
    for pixel in pixels.pixels_mut() {
        let close = (0..3).all(|channel| pixel[channel].abs_diff(corner[channel]) <= CHANNEL_TOLERANCE);
        if close {
            pixel[3] = 0;
        }
    }
    true
}
