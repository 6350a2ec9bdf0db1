use std::path::Path;
use std::sync::Arc;

use strum::Display;
use strum::EnumIter;
use strum::IntoEnumIterator;
use tracing::info;
use tracing::warn;

use super::SpriteError;
use super::bitmap::Sprite;
use super::descriptor;
use super::fallback;

/// The visual states the display can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum SpriteKind {
    On,
    Off,
    Error,
}

impl SpriteKind {
    /// Descriptor location relative to the assets directory.
    pub fn asset_path(&self) -> &'static str {
        match self {
            SpriteKind::On => "sprites/HA-on.json",
            SpriteKind::Off => "sprites/HA-off.json",
            SpriteKind::Error => "sprites/HA-error.json",
        }
    }

    pub fn fallback(&self) -> Sprite {
        match self {
            SpriteKind::On => fallback::on_sprite(),
            SpriteKind::Off => fallback::off_sprite(),
            SpriteKind::Error => fallback::error_sprite(),
        }
    }
}

/// The on/off/error sprites, parsed once and shared for the monitor's lifetime.
#[derive(Debug, Clone)]
pub struct SpriteSet {
    on: Arc<Sprite>,
    off: Arc<Sprite>,
    error: Arc<Sprite>,
}

impl SpriteSet {
    pub fn new(on: Sprite, off: Sprite, error: Sprite) -> Self {
        Self {
            on: Arc::new(on),
            off: Arc::new(off),
            error: Arc::new(error),
        }
    }

    /// Only the procedural sprites.
    pub fn procedural() -> Self {
        Self::new(
            SpriteKind::On.fallback(),
            SpriteKind::Off.fallback(),
            SpriteKind::Error.fallback(),
        )
    }

    /// Load every sprite from `assets_dir`, substituting the procedural sprite
    /// for any descriptor that is missing or malformed.
    pub fn load(assets_dir: &Path) -> Self {
        let mut set = Self::procedural();
        for kind in SpriteKind::iter() {
            match load_descriptor(assets_dir, kind) {
                Ok(sprite) => {
                    info!(
                        "Loaded {} sprite ({}x{})",
                        kind,
                        sprite.width(),
                        sprite.height()
                    );
                    *set.slot_mut(kind) = Arc::new(sprite);
                }
                Err(e) => {
                    warn!("Using default {} sprite: {}", kind, e);
                }
            }
        }
        set
    }

    pub fn get(&self, kind: SpriteKind) -> &Arc<Sprite> {
        match kind {
            SpriteKind::On => &self.on,
            SpriteKind::Off => &self.off,
            SpriteKind::Error => &self.error,
        }
    }

    fn slot_mut(&mut self, kind: SpriteKind) -> &mut Arc<Sprite> {
        match kind {
            SpriteKind::On => &mut self.on,
            SpriteKind::Off => &mut self.off,
            SpriteKind::Error => &mut self.error,
        }
    }
}

fn load_descriptor(assets_dir: &Path, kind: SpriteKind) -> Result<Sprite, SpriteError> {
    let path = assets_dir.join(kind.asset_path());
    let bytes = std::fs::read(&path).map_err(|e| SpriteError::Io(path.clone(), e))?;
    descriptor::parse(&bytes)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::sprite::Rgba;

    #[test]
    fn test_missing_assets_use_fallbacks() {
        let temp_dir = TempDir::new().unwrap();
        let set = SpriteSet::load(temp_dir.path());

        assert_eq!(**set.get(SpriteKind::On), fallback::on_sprite());
        assert_eq!(**set.get(SpriteKind::Off), fallback::off_sprite());
        assert_eq!(**set.get(SpriteKind::Error), fallback::error_sprite());
    }

    #[test]
    fn test_malformed_asset_falls_back_per_kind() {
        let temp_dir = TempDir::new().unwrap();
        let sprites = temp_dir.path().join("sprites");
        fs::create_dir_all(&sprites).unwrap();
        fs::write(
            sprites.join("HA-on.json"),
            r#"{"dimensions": {"width": 1, "height": 1},
                "frames": [{"pixels": [{"index": "0-0", "opacity": 1.0}]}]}"#,
        )
        .unwrap();
        fs::write(sprites.join("HA-off.json"), r#"{"frames": []}"#).unwrap();

        let set = SpriteSet::load(temp_dir.path());

        let on = set.get(SpriteKind::On);
        assert_eq!(on.width(), 1);
        assert_eq!(on.pixel(0, 0), Some(Rgba::WHITE));
        assert_eq!(**set.get(SpriteKind::Off), fallback::off_sprite());
        assert_eq!(**set.get(SpriteKind::Error), fallback::error_sprite());
    }

    #[test]
    fn test_bundled_assets_parse() {
        let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets");
        for kind in SpriteKind::iter() {
            let sprite = load_descriptor(&assets, kind).unwrap();
            assert_eq!((sprite.width(), sprite.height()), (25, 25));
            assert!(sprite.lit_count() > 0, "{} sprite is blank", kind);
            // Round matrix: corners are outside the shape
            assert!(sprite.pixel(0, 0).unwrap().is_transparent());
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(SpriteKind::On.to_string(), "on");
        assert_eq!(SpriteKind::Error.asset_path(), "sprites/HA-error.json");
    }
}
