//! Generated images: QR codes and blanks, encoded as PNG.

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;

/// QR code for `payload` as a greyscale image, 6 px per module with a
/// 4-module quiet zone.
pub fn qr_image(payload: &str) -> DynamicImage {
    let code = qrcode::QrCode::new(payload.as_bytes()).unwrap();
    let width = code.width();
    let colors = code.to_colors();
    let (scale, quiet) = (6usize, 4usize);
    let size = ((width + 2 * quiet) * scale) as u32;

    let img = GrayImage::from_fn(size, size, |x, y| {
        let mx = (x as usize / scale).checked_sub(quiet);
        let my = (y as usize / scale).checked_sub(quiet);
        match (mx, my) {
            (Some(mx), Some(my)) if mx < width && my < width => {
                if colors[my * width + mx] == qrcode::Color::Dark {
                    Luma([0])
                } else {
                    Luma([255])
                }
            }
            _ => Luma([255]),
        }
    });
    DynamicImage::ImageLuma8(img)
}

/// [`qr_image`] encoded as PNG bytes.
pub fn qr_png(payload: &str) -> Vec<u8> {
    png_bytes(&qr_image(payload))
}

/// A white 120×80 PNG with nothing on it.
pub fn blank_png() -> Vec<u8> {
    png_bytes(&DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 80, Luma([255]))))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
