use serde::Serialize;

use crate::sprite::Sprite;

/// Shading ramp used for text rendering, darkest first.
const RAMP: &[u8] = b" .:-=+*#%@";

/// Brightness levels for every LED of the matrix, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixFrame {
    width: usize,
    height: usize,
    levels: Vec<u8>,
}

impl MatrixFrame {
    /// Place `sprite` at the matrix origin, cropping anything that does not
    /// fit. LEDs not covered by the sprite stay dark.
    pub fn compose(sprite: &Sprite, width: usize, height: usize) -> Self {
        let mut levels = vec![0; width * height];
        for (row, pixels) in sprite.rows().take(height).enumerate() {
            for (col, pixel) in pixels.iter().take(width).enumerate() {
                let peak = u32::from(pixel.r.max(pixel.g).max(pixel.b));
                let level = (peak * u32::from(pixel.a) + 127) / 255;
                levels[row * width + col] = level as u8;
            }
        }
        Self {
            width,
            height,
            levels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    pub fn level(&self, row: usize, col: usize) -> Option<u8> {
        if row < self.height && col < self.width {
            Some(self.levels[row * self.width + col])
        } else {
            None
        }
    }

    pub fn is_blank(&self) -> bool {
        self.levels.iter().all(|&l| l == 0)
    }

    /// One line of text per matrix row.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.levels.chunks(self.width.max(1)).take(self.height) {
            for &level in row {
                let idx = (usize::from(level) * (RAMP.len() - 1) + 127) / 255;
                out.push(RAMP[idx] as char);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::parse;

    fn sprite(json: &str) -> Sprite {
        parse(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_levels_follow_alpha() {
        let s = sprite(
            r#"{"dimensions": {"width": 3, "height": 1},
                "frames": [{"pixels": [
                    {"index": "0-0", "opacity": 1.0},
                    {"index": "0-1", "opacity": 0.5}
                ]}]}"#,
        );
        let frame = MatrixFrame::compose(&s, 3, 1);
        assert_eq!(frame.levels(), &[255, 128, 0]);
    }

    #[test]
    fn test_compose_crops_and_pads() {
        let s = sprite(
            r#"{"dimensions": {"width": 3, "height": 3},
                "frames": [{"pixels": [
                    {"index": "0-0", "opacity": 1.0},
                    {"index": "2-2", "opacity": 1.0}
                ]}]}"#,
        );
        let small = MatrixFrame::compose(&s, 2, 2);
        assert_eq!(small.levels(), &[255, 0, 0, 0]);

        let large = MatrixFrame::compose(&s, 4, 4);
        assert_eq!(large.level(0, 0), Some(255));
        assert_eq!(large.level(2, 2), Some(255));
        assert_eq!(large.level(3, 3), Some(0));
        assert_eq!(large.level(4, 0), None);
    }

    #[test]
    fn test_blank_sprite_is_blank_frame() {
        let frame = MatrixFrame::compose(&Sprite::new(5, 5), 5, 5);
        assert!(frame.is_blank());
    }

    #[test]
    fn test_ascii_rendering() {
        let s = sprite(
            r#"{"dimensions": {"width": 5, "height": 3},
                "shape": [1, 3, 5],
                "frames": [{"pixels": [
                    {"index": "0-0", "opacity": 1.0},
                    {"index": "1-0", "opacity": 0.5},
                    {"index": "1-1", "opacity": 1.0},
                    {"index": "1-2", "opacity": 0.5},
                    {"index": "2-0", "opacity": 0.2},
                    {"index": "2-4", "opacity": 0.2}
                ]}]}"#,
        );
        let frame = MatrixFrame::compose(&s, 5, 3);
        let text = frame.to_ascii().replace(' ', "_");
        insta::assert_snapshot!(text.trim_end(), @r"
        __@__
        _+@+_
        :___:
        ");
    }
}
