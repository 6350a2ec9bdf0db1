//! Sprite descriptor parsing.
//!
//! A descriptor is a JSON document:
//!
//! ```json
//! {
//!   "dimensions": { "width": 25, "height": 25 },
//!   "shape": [7, 11, 15],
//!   "frames": [ { "pixels": [ { "index": "0-3", "opacity": 1.0 } ] } ]
//! }
//! ```
//!
//! Without `shape`, each `index` is an absolute `row-col` position. With
//! `shape`, row `r` has `shape[r]` active columns centered in the bitmap and
//! `index` addresses columns within that active span.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use super::SpriteError;
use super::bitmap::Rgba;
use super::bitmap::Sprite;

/// Largest accepted width or height.
pub const MAX_DIMENSION: usize = 1024;

#[derive(Debug, Deserialize)]
struct Descriptor {
    dimensions: Dimensions,
    #[serde(default)]
    shape: Option<serde_json::Value>,
    /// Only frame 0 is rendered; later frames are kept opaque.
    frames: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Dimensions {
    width: usize,
    height: usize,
}

/// One lit entry from a frame's pixel list.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PixelEntry {
    row: i64,
    col: i64,
    opacity: f64,
}

/// Parse descriptor bytes into a sprite.
///
/// Fails only when the descriptor as a whole is unusable (not JSON, missing or
/// mistyped `dimensions`/`frames`, degenerate size). Bad pixel entries are
/// skipped with a warning.
pub fn parse(bytes: &[u8]) -> Result<Sprite, SpriteError> {
    let descriptor: Descriptor =
        serde_json::from_slice(bytes).map_err(|e| SpriteError::Malformed(e.to_string()))?;

    let Dimensions { width, height } = descriptor.dimensions;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(SpriteError::Malformed(format!(
            "unsupported dimensions {}x{}",
            width, height
        )));
    }

    let entries = match descriptor.frames.first() {
        Some(frame) => frame_entries(frame)?,
        None => Vec::new(),
    };

    let mut sprite = Sprite::new(width, height);
    match &descriptor.shape {
        Some(serde_json::Value::Array(shape)) => fill_shaped(&mut sprite, shape, &entries),
        None | Some(serde_json::Value::Null) => fill_dense(&mut sprite, &entries),
        Some(other) => {
            warn!("Ignoring shape {}: not an array, using dense layout", other);
            fill_dense(&mut sprite, &entries);
        }
    }
    Ok(sprite)
}

/// Horizontal offset that centers `active` columns within `width`.
pub fn center_offset(width: usize, active: usize) -> usize {
    width.saturating_sub(active) / 2
}

fn frame_entries(frame: &serde_json::Value) -> Result<Vec<PixelEntry>, SpriteError> {
    let frame = frame
        .as_object()
        .ok_or_else(|| SpriteError::Malformed("frame 0 is not an object".to_string()))?;

    let pixels = match frame.get("pixels") {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(pixels)) => pixels,
        Some(_) => {
            return Err(SpriteError::Malformed(
                "frame 0 pixels is not an array".to_string(),
            ))
        }
    };

    let mut entries = Vec::with_capacity(pixels.len());
    for (i, value) in pixels.iter().enumerate() {
        match parse_entry(value) {
            Ok(entry) => entries.push(entry),
            Err(reason) => warn!("Skipping pixel entry {}: {}", i, reason),
        }
    }
    Ok(entries)
}

fn parse_entry(value: &serde_json::Value) -> Result<PixelEntry, String> {
    let index = value
        .get("index")
        .and_then(|v| v.as_str())
        .ok_or("missing index")?;
    let (row, col) = parse_index(index).ok_or_else(|| format!("invalid index {:?}", index))?;

    let opacity = value
        .get("opacity")
        .and_then(|v| v.as_f64())
        .ok_or("missing opacity")?;
    if !(0.0..=1.0).contains(&opacity) {
        return Err(format!("opacity {} outside [0, 1]", opacity));
    }

    Ok(PixelEntry { row, col, opacity })
}

/// Parse `"row-col"`: exactly two integers joined by a single `-`.
fn parse_index(index: &str) -> Option<(i64, i64)> {
    let (row, col) = index.split_once('-')?;
    if col.contains('-') {
        return None;
    }
    Some((row.parse().ok()?, col.parse().ok()?))
}

fn alpha(opacity: f64) -> u8 {
    (opacity * 255.0).round() as u8
}

fn fill_dense(sprite: &mut Sprite, entries: &[PixelEntry]) {
    for entry in entries {
        let (Ok(row), Ok(col)) = (usize::try_from(entry.row), usize::try_from(entry.col)) else {
            warn!("Skipping pixel {}-{}: negative index", entry.row, entry.col);
            continue;
        };
        if row >= sprite.height() || col >= sprite.width() {
            warn!("Skipping pixel {}-{}: outside bitmap", row, col);
            continue;
        }
        sprite.set(row, col, Rgba::white(alpha(entry.opacity)));
    }
}

fn fill_shaped(sprite: &mut Sprite, shape: &[serde_json::Value], entries: &[PixelEntry]) {
    // Last entry wins for duplicate positions
    let opacities: HashMap<(i64, i64), f64> = entries
        .iter()
        .map(|e| ((e.row, e.col), e.opacity))
        .collect();

    let width = sprite.width();
    for (row, active) in shape.iter().enumerate().take(sprite.height()) {
        let Some(active) = active.as_u64() else {
            warn!("Skipping shape row {}: {} is not a column count", row, active);
            continue;
        };
        let active = (active as usize).min(width);
        let offset = center_offset(width, active);

        for col in 0..active {
            if let Some(opacity) = opacities.get(&(row as i64, col as i64)) {
                sprite.set(row, offset + col, Rgba::white(alpha(*opacity)));
            }
        }
    }
}
