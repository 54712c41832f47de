//! Colors and buttons shared by carts, hosts and game programs.

/// The 16-entry RGBA palette. Programs pick colors by index.
pub const PALETTE: [[u8; 4]; 16] = [
    [0, 0, 0, 0],
    [0, 0, 0, 255],
    [255, 0, 0, 255],
    [0, 192, 0, 255],
    [0, 0, 255, 255],
    [255, 0, 255, 255],
    [255, 255, 0, 255],
    [0, 255, 255, 255],
    [128, 128, 128, 255],
    [0, 165, 255, 255],
    [255, 165, 0, 255],
    [128, 0, 128, 255],
    [0, 100, 0, 255],
    [160, 82, 45, 255],
    [217, 113, 98, 255],
    [255, 255, 255, 255],
];

/// Names the prelude defines for each palette index.
pub const COLOR_NAMES: [&str; 16] = [
    "C_TRANSPARENT",
    "C_BLACK",
    "C_RED",
    "C_LIGHT_GREEN",
    "C_BLUE",
    "C_MAGENTA",
    "C_YELLOW",
    "C_CYAN",
    "C_GRAY",
    "C_LIGHT_BLUE",
    "C_ORANGE",
    "C_PURPLE",
    "C_DARK_GREEN",
    "C_BROWN",
    "C_SALMON",
    "C_WHITE",
];

pub const TRANSPARENT: u8 = 0;

/// Only the low four bits of a color value select the palette entry.
pub fn palette_index(color: i32) -> u8 {
    (color & 0xF) as u8
}

pub fn rgba(color: i32) -> [u8; 4] {
    PALETTE[usize::from(palette_index(color))]
}

pub const BUTTON_LEFT: i32 = 1;
pub const BUTTON_RIGHT: i32 = 2;
pub const BUTTON_UP: i32 = 4;
pub const BUTTON_DOWN: i32 = 8;
pub const BUTTON_A: i32 = 16;
pub const BUTTON_B: i32 = 32;

/// Button bits and the names the prelude defines for them.
pub const BUTTONS: [(&str, i32); 6] = [
    ("BUTTON_L", BUTTON_LEFT),
    ("BUTTON_R", BUTTON_RIGHT),
    ("BUTTON_U", BUTTON_UP),
    ("BUTTON_D", BUTTON_DOWN),
    ("BUTTON_A", BUTTON_A),
    ("BUTTON_B", BUTTON_B),
];
