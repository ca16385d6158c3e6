//! PNG dumps of captured frames for inspecting the vision pipeline.

use image::{ImageBuffer, Luma};
use ndarray::Array2;
use std::path::Path;

/// 16-bit grayscale image buffer
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Converts an `Array2<u16>` to a 16-bit grayscale image.
///
/// Array indices `[y, x]` map to pixel coordinates `(x, y)`.
pub fn array2_to_gray16(arr: &Array2<u16>) -> Gray16Image {
    let (height, width) = arr.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        Luma([arr[[y as usize, x as usize]]])
    })
}

/// Write a frame as a 16-bit PNG
pub fn save_frame_png(frame: &Array2<u16>, path: &Path) -> Result<(), image::ImageError> {
    array2_to_gray16(frame).save(path)
}
