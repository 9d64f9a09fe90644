//! Crop and resize transforms applied before storage.

use image::imageops::FilterType;
use image::DynamicImage;

/// Stored images are bounded to this box, aspect preserved.
pub const MAX_WIDTH: u32 = 600;
pub const MAX_HEIGHT: u32 = 600;

/// Per-source crop variant applied before the resize.
///
/// Auction house 2 watermarks a banner across the top and bottom of its
/// photos; the brand profile trims those bands off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropProfile {
    #[default]
    None,
    Brand,
}

impl CropProfile {
    /// Profile for a source auction house.
    pub fn for_auc_num(auc_num: i64) -> Self {
        if auc_num == 2 {
            Self::Brand
        } else {
            Self::None
        }
    }

    /// Filename suffix tag, if the profile crops.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Brand => Some("brand"),
        }
    }

    /// Pixels trimmed from (top, bottom, left, right).
    fn insets(&self) -> (u32, u32, u32, u32) {
        match self {
            Self::None => (0, 0, 0, 0),
            Self::Brand => (40, 40, 0, 0),
        }
    }
}

/// Apply the crop profile, then shrink into the size box if needed.
/// Images already inside the box are never enlarged.
pub fn transform(img: DynamicImage, crop: CropProfile) -> DynamicImage {
    let (top, bottom, left, right) = crop.insets();

    let img = if top + bottom < img.height() && left + right < img.width() {
        let width = img.width() - left - right;
        let height = img.height() - top - bottom;
        if (top, bottom, left, right) == (0, 0, 0, 0) {
            img
        } else {
            img.crop_imm(left, top, width, height)
        }
    } else {
        // Image smaller than the crop bands; leave it alone.
        img
    };

    if img.width() > MAX_WIDTH || img.height() > MAX_HEIGHT {
        img.resize(MAX_WIDTH, MAX_HEIGHT, FilterType::Lanczos3)
    } else {
        img
    }
}

/// Encode to lossless WebP.
pub fn encode_webp(img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let rgba = img.to_rgba8();
    let mut out = Vec::new();
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut out);
    encoder.encode(
        rgba.as_raw(),
        rgba.width(),
        rgba.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::new(width, height))
    }

    #[test]
    fn brand_profile_only_for_auction_house_two() {
        assert_eq!(CropProfile::for_auc_num(1), CropProfile::None);
        assert_eq!(CropProfile::for_auc_num(2), CropProfile::Brand);
        assert_eq!(CropProfile::for_auc_num(3), CropProfile::None);
    }

    #[test]
    fn brand_crop_trims_top_and_bottom() {
        let out = transform(blank(500, 400), CropProfile::Brand);
        assert_eq!(out.width(), 500);
        assert_eq!(out.height(), 320);
    }

    #[test]
    fn oversized_images_fit_inside_box() {
        let out = transform(blank(1200, 900), CropProfile::None);
        assert!(out.width() <= MAX_WIDTH);
        assert!(out.height() <= MAX_HEIGHT);
        // Aspect ratio preserved: 4:3 stays 4:3.
        assert_eq!(out.width(), 600);
        assert_eq!(out.height(), 450);
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let out = transform(blank(200, 150), CropProfile::None);
        assert_eq!((out.width(), out.height()), (200, 150));
    }

    #[test]
    fn crop_skipped_when_image_smaller_than_bands() {
        let out = transform(blank(100, 60), CropProfile::Brand);
        assert_eq!((out.width(), out.height()), (100, 60));
    }

    #[test]
    fn webp_roundtrip() {
        let data = encode_webp(&blank(20, 20)).unwrap();
        let back = image::load_from_memory(&data).unwrap();
        assert_eq!((back.width(), back.height()), (20, 20));
    }
}
