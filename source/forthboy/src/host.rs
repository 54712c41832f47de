//! The seam between a running game and whatever presents it.

/// A request to copy a rectangle of sprite blocks to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteBlit {
    pub x: i32,
    pub y: i32,
    /// First sprite block, see [`SpriteSheet::block_origin`](crate::SpriteSheet::block_origin).
    pub index: i32,
    /// Width, in sprite blocks.
    pub w: i32,
    /// Height, in sprite blocks.
    pub h: i32,
    pub flip_x: bool,
    pub flip_y: bool,
}

/// Everything a game program can do to the outside world.
///
/// Colors are raw program values; hosts map them through
/// [`palette::rgba`](crate::palette::rgba).
pub trait GameHost {
    /// Fills the whole screen with `color`.
    fn cls(&mut self, color: i32);
    /// Sets the color used by later line, rect and text drawing.
    fn set_color(&mut self, color: i32);
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32);
    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32);
    fn draw_sprite(&mut self, blit: SpriteBlit);
    fn draw_text(&mut self, x: i32, y: i32, text: &str);
    /// Receives everything the program writes to its output.
    fn write_output(&mut self, text: &str);
    /// Currently held buttons, as a mask of the `BUTTON_*` bits.
    fn buttons(&mut self) -> i32;
    /// Starts playing sound effect `index`. Indices are always in range.
    fn sfx(&mut self, index: usize);
}

/// A drawing or sound request, as captured by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommand {
    Cls(i32),
    SetColor(i32),
    Line { x0: i32, y0: i32, x1: i32, y1: i32 },
    FillRect { x: i32, y: i32, w: i32, h: i32 },
    Sprite(SpriteBlit),
    Text { x: i32, y: i32, text: String },
    Sfx(usize),
}

/// A headless host that records every request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingHost {
    pub commands: Vec<DrawCommand>,
    pub output: String,
    /// The mask reported by `buttons`.
    pub buttons: i32,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buttons(buttons: i32) -> Self {
        Self {
            buttons,
            ..Self::default()
        }
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        core::mem::take(&mut self.commands)
    }

    pub fn take_output(&mut self) -> String {
        core::mem::take(&mut self.output)
    }
}

impl GameHost for RecordingHost {
    fn cls(&mut self, color: i32) {
        self.commands.push(DrawCommand::Cls(color));
    }

    fn set_color(&mut self, color: i32) {
        self.commands.push(DrawCommand::SetColor(color));
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        self.commands.push(DrawCommand::Line { x0, y0, x1, y1 });
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.commands.push(DrawCommand::FillRect { x, y, w, h });
    }

    fn draw_sprite(&mut self, blit: SpriteBlit) {
        self.commands.push(DrawCommand::Sprite(blit));
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        self.commands.push(DrawCommand::Text {
            x,
            y,
            text: text.to_string(),
        });
    }

    fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn buttons(&mut self) -> i32 {
        self.buttons
    }

    fn sfx(&mut self, index: usize) {
        self.commands.push(DrawCommand::Sfx(index));
    }
}
