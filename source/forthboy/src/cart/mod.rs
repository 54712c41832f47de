//! The cart text format.
//!
//! A cart is program source followed by its assets, wrapped in a forth
//! comment so the whole file still reads as a program:
//!
//! ```text
//! <source>(
//! --SPRITE DATA------
//! <sprite sheet hex>
//! --SOUND DATA--------
//! <sound bank hex>
//! )
//! ```

use core::fmt;

mod sounds;
mod sprites;

pub use self::sounds::{SoundBank, SoundEffect, MAX_SOUND_EFFECTS, NOTES_PER_EFFECT};
pub use self::sprites::{SpriteSheet, BLOCK_SIZE, SHEET_BLOCKS, SHEET_HEIGHT, SHEET_WIDTH};

pub const SPRITE_DELIMITER: &str = "\n--SPRITE DATA------\n";
pub const SOUND_DELIMITER: &str = "\n--SOUND DATA--------\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// One or both asset delimiters are missing.
    MissingAssets,
    /// The sound section starts before the sprite section.
    MisorderedAssets,
    BadSpriteDigit { ch: char, offset: usize },
}

impl fmt::Display for CartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartError::MissingAssets => f.write_str("cart is missing its sprite or sound data"),
            CartError::MisorderedAssets => f.write_str("cart sound data comes before sprite data"),
            CartError::BadSpriteDigit { ch, offset } => {
                write!(f, "invalid sprite pixel {ch:?} at offset {offset}")
            }
        }
    }
}

impl std::error::Error for CartError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    pub source: String,
    pub sprites: SpriteSheet,
    pub sounds: SoundBank,
}

impl Cart {
    /// A cart with the given source and blank assets.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Parses a complete cart. Both asset sections must be present.
    ///
    /// The source is everything before the last `(` preceding the sprite
    /// section, which is the comment opener [`Cart::to_text`] writes.
    pub fn parse(text: &str) -> Result<Self, CartError> {
        let (Some(sprite_at), Some(sound_at)) =
            (text.find(SPRITE_DELIMITER), text.find(SOUND_DELIMITER))
        else {
            return Err(CartError::MissingAssets);
        };
        let sprites_start = sprite_at + SPRITE_DELIMITER.len();
        if sound_at < sprites_start {
            return Err(CartError::MisorderedAssets);
        }

        let source_end = text[..sprite_at].rfind('(').unwrap_or(0);
        let sprites = SpriteSheet::decode(&text[sprites_start..sound_at])?;
        let sounds = SoundBank::decode(&text[sound_at + SOUND_DELIMITER.len()..]);
        tracing::debug!(source_bytes = source_end, "parsed cart");
        Ok(Self {
            source: text[..source_end].to_string(),
            sprites,
            sounds,
        })
    }

    /// Like [`Cart::parse`], but text with no asset sections at all is
    /// taken as bare program source.
    pub fn parse_or_source(text: &str) -> Result<Self, CartError> {
        if !text.contains(SPRITE_DELIMITER) && !text.contains(SOUND_DELIMITER) {
            return Ok(Self::from_source(text));
        }
        Self::parse(text)
    }

    pub fn to_text(&self) -> String {
        let sprites = self.sprites.encode();
        let sounds = self.sounds.encode();
        let mut out = String::with_capacity(
            self.source.len()
                + SPRITE_DELIMITER.len()
                + sprites.len()
                + SOUND_DELIMITER.len()
                + sounds.len()
                + 4,
        );
        out.push_str(&self.source);
        out.push('(');
        out.push_str(SPRITE_DELIMITER);
        out.push_str(&sprites);
        out.push_str(SOUND_DELIMITER);
        out.push_str(&sounds);
        out.push_str("\n)\n");
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Cart {
        let mut cart = Cart::from_source(": draw_frame ( -- ) 1 cls ;\n");
        cart.sprites.set(3, 2, 7);
        cart.sprites.set(127, 127, 15);
        let fx = cart.sounds.get_mut(5).unwrap();
        fx.note_duration = 4;
        fx.pitches[0] = 60;
        fx.amplitudes[0] = 200;
        cart
    }

    #[test]
    fn round_trip() {
        let cart = sample();
        let text = cart.to_text();
        assert!(text.ends_with("\n)\n"));
        assert_eq!(Cart::parse(&text).unwrap(), cart);
    }

    #[test]
    fn round_trip_blank_assets() {
        let cart = Cart::from_source("1 2 +");
        assert_eq!(Cart::parse(&cart.to_text()).unwrap(), cart);
    }

    #[test]
    fn source_may_contain_parens() {
        let cart = Cart::from_source("( a comment ) : x ( n -- n ) ;");
        assert_eq!(Cart::parse(&cart.to_text()).unwrap().source, cart.source);
    }

    #[test]
    fn missing_sections() {
        assert_eq!(Cart::parse("1 2 +"), Err(CartError::MissingAssets));
        let only_sprites = format!("({SPRITE_DELIMITER}00\n)");
        assert_eq!(Cart::parse(&only_sprites), Err(CartError::MissingAssets));
        let backwards = format!("({SOUND_DELIMITER}{SPRITE_DELIMITER})");
        assert_eq!(Cart::parse(&backwards), Err(CartError::MisorderedAssets));
    }

    #[test]
    fn bare_source_is_accepted_when_asked() {
        let cart = Cart::parse_or_source(": draw_frame ;").unwrap();
        assert_eq!(cart.source, ": draw_frame ;");
        assert_eq!(cart.sprites, SpriteSheet::new());

        let only_sprites = format!("({SPRITE_DELIMITER}00\n)");
        assert!(Cart::parse_or_source(&only_sprites).is_err());
    }

    #[test]
    fn bad_sprite_data() {
        let text = format!("({SPRITE_DELIMITER}0x{SOUND_DELIMITER})");
        assert!(matches!(
            Cart::parse(&text),
            Err(CartError::BadSpriteDigit { ch: 'x', .. })
        ));
    }
}
