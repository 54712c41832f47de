use core::fmt::Write;

pub const MAX_SOUND_EFFECTS: usize = 32;
pub const NOTES_PER_EFFECT: usize = 32;

/// A short tune: one pitch and amplitude per note, each note lasting
/// `note_duration` ticks of the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundEffect {
    pub note_duration: u8,
    pub pitches: [u8; NOTES_PER_EFFECT],
    pub amplitudes: [u8; NOTES_PER_EFFECT],
}

impl SoundEffect {
    pub const SILENT: Self = Self {
        note_duration: 0,
        pitches: [0; NOTES_PER_EFFECT],
        amplitudes: [0; NOTES_PER_EFFECT],
    };

    pub fn is_silent(&self) -> bool {
        *self == Self::SILENT
    }
}

impl Default for SoundEffect {
    fn default() -> Self {
        Self::SILENT
    }
}

/// The fixed set of sound effects a cart carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBank {
    effects: [SoundEffect; MAX_SOUND_EFFECTS],
}

impl Default for SoundBank {
    fn default() -> Self {
        Self {
            effects: [SoundEffect::SILENT; MAX_SOUND_EFFECTS],
        }
    }
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&SoundEffect> {
        self.effects.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SoundEffect> {
        self.effects.get_mut(index)
    }

    pub fn effects(&self) -> &[SoundEffect] {
        &self.effects
    }

    /// One line per effect, each a run of two-digit hex bytes: the note
    /// duration, then the pitches, then the amplitudes. Trailing silent
    /// effects are left out.
    pub fn encode(&self) -> String {
        let used = self
            .effects
            .iter()
            .rposition(|fx| !fx.is_silent())
            .map_or(0, |last| last + 1);
        let mut out = String::with_capacity(used * (1 + 2 * NOTES_PER_EFFECT) * 2 + used);
        for (i, fx) in self.effects[..used].iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let bytes = core::iter::once(&fx.note_duration)
                .chain(fx.pitches.iter())
                .chain(fx.amplitudes.iter());
            for byte in bytes {
                // Writing to a String cannot fail.
                let _ = write!(out, "{byte:02x}");
            }
        }
        out
    }

    /// Reads effects back from hex text. Anything that is not a hex digit
    /// is ignored. Decoding stops at the first effect with no data left,
    /// and a truncated final effect is zero-filled.
    pub fn decode(text: &str) -> Self {
        let digits: Vec<u8> = text
            .chars()
            .filter_map(|ch| ch.to_digit(16))
            .map(|d| d as u8)
            .collect();
        let mut bytes = digits
            .chunks(2)
            .map(|pair| pair.iter().fold(0u8, |acc, &d| (acc << 4) | d));

        let mut bank = Self::default();
        for fx in bank.effects.iter_mut() {
            let Some(note_duration) = bytes.next() else {
                break;
            };
            fx.note_duration = note_duration;
            for pitch in fx.pitches.iter_mut() {
                *pitch = bytes.next().unwrap_or(0);
            }
            for amp in fx.amplitudes.iter_mut() {
                *amp = bytes.next().unwrap_or(0);
            }
        }
        bank
    }
}
