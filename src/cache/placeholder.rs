/// Synthetic "unavailable" image
///
/// Served in place of an image that is neither cached nor reachable,
/// so a card always has something to decode.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Edge length of the placeholder (square)
const PLACEHOLDER_SIZE: u32 = 64;

const BACKGROUND: Rgba<u8> = Rgba([38, 38, 42, 255]);
const STROKE: Rgba<u8> = Rgba([90, 90, 98, 255]);

/// Encode the placeholder as PNG bytes.
/// Returns an empty body if encoding fails; callers treat that like a broken image.
pub fn unavailable_png() -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, BACKGROUND);

    // Draw an "X" so it reads as "missing" at any scale
    for i in 0..PLACEHOLDER_SIZE {
        img.put_pixel(i, i, STROKE);
        img.put_pixel(PLACEHOLDER_SIZE - 1 - i, i, STROKE);
    }

    let mut bytes = Vec::new();
    match img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png) {
        Ok(()) => bytes,
        Err(e) => {
            log::warn!("Failed to encode placeholder image: {}", e);
            Vec::new()
        }
    }
}
