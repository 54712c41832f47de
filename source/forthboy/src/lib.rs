//! # forthboy
//!
//! A tiny fantasy console built on [`gameforth`].
//!
//! A [`Cart`] bundles a program's source with its [`SpriteSheet`] and
//! [`SoundBank`]. A [`Console`] loads the source into a fresh VM with the
//! game natives installed, then calls the program's frame word once per
//! [`tick`](Console::tick). Everything the program draws, prints or plays
//! goes through a [`GameHost`].

pub mod cart;
pub mod console;
pub mod host;
pub mod palette;

pub use crate::cart::{Cart, CartError, SoundBank, SoundEffect, SpriteSheet};
pub use crate::console::{Console, ConsoleSettings, LoadError};
pub use crate::host::{DrawCommand, GameHost, RecordingHost, SpriteBlit};
