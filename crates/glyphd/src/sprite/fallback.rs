//! Procedurally drawn sprites, used when a descriptor cannot be loaded.

use super::bitmap::Rgba;
use super::bitmap::Sprite;

/// Side length of the procedural sprites (the Glyph matrix is 25x25).
pub const SIZE: usize = 25;

/// Filled circle.
pub fn on_sprite() -> Sprite {
    let mut sprite = Sprite::new(SIZE, SIZE);
    let center = (SIZE / 2) as i64;
    let radius = 10_i64;
    for row in 0..SIZE {
        for col in 0..SIZE {
            let dy = row as i64 - center;
            let dx = col as i64 - center;
            if dx * dx + dy * dy <= radius * radius {
                sprite.set(row, col, Rgba::GREEN);
            }
        }
    }
    sprite
}

/// Two crossed lines inset from the edges.
pub fn off_sprite() -> Sprite {
    let mut sprite = Sprite::new(SIZE, SIZE);
    let (start, end) = (5, SIZE - 5);
    for i in start..end {
        let mirror = SIZE - 1 - i;
        sprite.set(i, i, Rgba::GRAY);
        sprite.set(i, mirror, Rgba::GRAY);
        // Second pixel column gives the strokes a width of 2
        sprite.set(i, i + 1, Rgba::GRAY);
        sprite.set(i, mirror.saturating_sub(1), Rgba::GRAY);
    }
    sprite
}

/// Corner-to-corner diagonal cross.
pub fn error_sprite() -> Sprite {
    let mut sprite = Sprite::new(SIZE, SIZE);
    for i in 0..SIZE {
        sprite.set(i, i, Rgba::RED);
        sprite.set(i, SIZE - 1 - i, Rgba::RED);
    }
    sprite
}
