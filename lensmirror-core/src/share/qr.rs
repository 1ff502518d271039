//! QR codes for share links

use image::{GrayImage, Luma};
use qrcode::types::Color;
use qrcode::QrCode;
use std::path::Path;
use tracing::debug;

use crate::config::MAX_QR_MODULE_SIZE;
use crate::error::{MirrorError, Result, ResultExt};

/// Light modules around the code, per the QR standard
const QUIET_ZONE: u32 = 4;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// A QR code encoding a share link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCode {
    text: String,
    width: usize,
    modules: Vec<bool>,
}

impl ShareCode {
    /// Encode `text`
    pub fn new(text: &str) -> Result<Self> {
        let code = QrCode::new(text.as_bytes())?;
        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        debug!("Encoded {} byte link as {}x{} QR code", text.len(), width, width);

        Ok(Self {
            text: text.to_string(),
            width,
            modules,
        })
    }

    /// The encoded text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Modules per side, without the quiet zone
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the module at (`x`, `y`) is dark; out of range is light
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }

    /// Render as a greyscale image with `module_size` pixels per module
    ///
    /// The module size is clamped to `1..=MAX_QR_MODULE_SIZE`.
    pub fn render(&self, module_size: u32) -> GrayImage {
        let module_size = module_size.clamp(1, MAX_QR_MODULE_SIZE);
        let side = (self.width as u32 + QUIET_ZONE * 2) * module_size;

        GrayImage::from_fn(side, side, |px, py| {
            let x = (px / module_size) as i64 - QUIET_ZONE as i64;
            let y = (py / module_size) as i64 - QUIET_ZONE as i64;
            if x >= 0 && y >= 0 && self.is_dark(x as usize, y as usize) {
                DARK
            } else {
                LIGHT
            }
        })
    }

    /// Render and save as PNG
    pub fn save_png(&self, path: &Path, module_size: u32) -> Result<()> {
        self.render(module_size)
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(MirrorError::from)
            .context(format!("Failed to save QR code to {}", path.display()))
    }

    /// Render with half-block characters, two module rows per line
    ///
    /// Dark modules are drawn as blank space, so the code reads correctly on
    /// a dark terminal background.
    pub fn to_terminal(&self) -> String {
        let quiet = QUIET_ZONE as i64;
        let side = self.width as i64 + quiet * 2;
        let light = |x: i64, y: i64| {
            let (mx, my) = (x - quiet, y - quiet);
            !(mx >= 0 && my >= 0 && self.is_dark(mx as usize, my as usize))
        };

        let mut out = String::new();
        let mut y = 0;
        while y < side {
            for x in 0..side {
                let top = light(x, y);
                let bottom = y + 1 < side && light(x, y + 1);
                out.push(match (top, bottom) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            out.push('\n');
            y += 2;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dimensions() {
        let code = ShareCode::new("https://temp.sh/abc/image.jpg").unwrap();
        let image = code.render(3);
        let expected = (code.width() as u32 + 8) * 3;
        assert_eq!(image.dimensions(), (expected, expected));

        // Quiet zone is light, finder pattern corner is dark
        assert_eq!(image.get_pixel(0, 0), &LIGHT);
        assert_eq!(image.get_pixel(4 * 3, 4 * 3), &DARK);
    }

    #[test]
    fn test_oversized_module_is_clamped() {
        let code = ShareCode::new("hi").unwrap();
        let image = code.render(u32::MAX);
        let expected = (code.width() as u32 + 8) * MAX_QR_MODULE_SIZE;
        assert_eq!(image.dimensions(), (expected, expected));
    }

    #[test]
    fn test_terminal_rows() {
        let code = ShareCode::new("hi").unwrap();
        let text = code.to_terminal();
        let rows = text.lines().count();
        assert_eq!(rows, (code.width() + 8).div_ceil(2));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.png");
        ShareCode::new("https://example.com").unwrap().save_png(&path, 2).unwrap();

        let loaded = image::open(&path).unwrap();
        assert!(loaded.width() > 0);
    }
}
