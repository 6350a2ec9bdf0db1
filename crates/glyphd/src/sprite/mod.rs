//! Sprite model: the descriptor format, in-memory bitmaps and the default
//! sprite set.

mod bitmap;
mod descriptor;
mod fallback;
mod set;

use std::path::PathBuf;

pub use bitmap::Rgba;
pub use bitmap::Sprite;
pub use descriptor::MAX_DIMENSION;
pub use descriptor::center_offset;
pub use descriptor::parse;
pub use set::SpriteKind;
pub use set::SpriteSet;

#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    #[error("Malformed sprite descriptor: {0}")]
    Malformed(String),

    #[error("Failed to read sprite {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}
