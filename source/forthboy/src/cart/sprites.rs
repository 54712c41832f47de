use crate::{cart::CartError, palette};

/// Width and height of one sprite block, in pixels.
pub const BLOCK_SIZE: usize = 8;
/// The sheet is this many blocks wide and tall.
pub const SHEET_BLOCKS: usize = 16;
pub const SHEET_WIDTH: usize = BLOCK_SIZE * SHEET_BLOCKS;
pub const SHEET_HEIGHT: usize = BLOCK_SIZE * SHEET_BLOCKS;

/// A 128x128 grid of palette indices, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct SpriteSheet {
    pixels: Box<[u8]>,
}

impl Default for SpriteSheet {
    fn default() -> Self {
        Self {
            pixels: vec![palette::TRANSPARENT; SHEET_WIDTH * SHEET_HEIGHT].into_boxed_slice(),
        }
    }
}

impl core::fmt::Debug for SpriteSheet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let used = self.pixels.iter().filter(|&&p| p != palette::TRANSPARENT).count();
        f.debug_struct("SpriteSheet")
            .field("opaque_pixels", &used)
            .finish()
    }
}

impl SpriteSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Palette index at `(x, y)`, or `None` outside the sheet.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= SHEET_WIDTH {
            return None;
        }
        self.pixels.get(y * SHEET_WIDTH + x).copied()
    }

    /// Sets `(x, y)` to `color`, keeping only its palette bits. Writes
    /// outside the sheet are ignored.
    pub fn set(&mut self, x: usize, y: usize, color: i32) {
        if x >= SHEET_WIDTH {
            return;
        }
        if let Some(px) = self.pixels.get_mut(y * SHEET_WIDTH + x) {
            *px = palette::palette_index(color);
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Top-left pixel of sprite block `index`, counting left to right and
    /// then top to bottom. `None` if the index is off the sheet.
    pub fn block_origin(index: i32) -> Option<(usize, usize)> {
        let index = usize::try_from(index).ok()?;
        if index >= SHEET_BLOCKS * SHEET_BLOCKS {
            return None;
        }
        Some((
            (index % SHEET_BLOCKS) * BLOCK_SIZE,
            (index / SHEET_BLOCKS) * BLOCK_SIZE,
        ))
    }

    /// One hex digit per pixel, stopping after the last non-transparent
    /// pixel, with a line break after every full row.
    pub fn encode(&self) -> String {
        let Some(last) = self.pixels.iter().rposition(|&p| p != palette::TRANSPARENT) else {
            return String::new();
        };
        let mut out = String::with_capacity(last + 1 + (last + 1) / SHEET_WIDTH);
        for (i, &px) in self.pixels[..=last].iter().enumerate() {
            if let Some(digit) = char::from_digit(u32::from(px), 16) {
                out.push(digit);
            }
            if i % SHEET_WIDTH == SHEET_WIDTH - 1 {
                out.push('\n');
            }
        }
        out
    }

    /// Reads hex digits into the sheet in row-major order. Whitespace and
    /// `)` are skipped, pixels past the end of the data stay transparent,
    /// and digits beyond the sheet are dropped.
    pub fn decode(text: &str) -> Result<Self, CartError> {
        let mut sheet = Self::default();
        let mut next = 0;
        let mut dropped = 0usize;
        for (offset, ch) in text.char_indices() {
            if ch.is_whitespace() || ch == ')' {
                continue;
            }
            let digit = ch
                .to_digit(16)
                .ok_or(CartError::BadSpriteDigit { ch, offset })?;
            match sheet.pixels.get_mut(next) {
                Some(px) => *px = digit as u8,
                None => dropped += 1,
            }
            next += 1;
        }
        if dropped > 0 {
            tracing::warn!(dropped, "sprite data longer than the sheet");
        }
        Ok(sheet)
    }
}
