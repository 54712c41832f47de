use core::fmt;

use gameforth::{Error, Forth, ForthParams, NativeArgs};
use serde::{Deserialize, Serialize};

use crate::{
    cart::MAX_SOUND_EFFECTS,
    host::{GameHost, SpriteBlit},
    palette,
};

/// Label used for diagnostics raised while loading the prelude.
pub const PRELUDE_LABEL: &str = "game-builtins";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleSettings {
    /// Word called once per frame.
    pub entry_point: String,
    pub screen_width: i32,
    pub screen_height: i32,
    /// Time between frames when running in real time.
    pub tick_interval_ms: u64,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            entry_point: "draw_frame".to_string(),
            screen_width: 128,
            screen_height: 128,
            tick_interval_ms: 33,
        }
    }
}

/// Returned when a console fails to load, handing the host back.
pub struct LoadError<H> {
    pub error: Error,
    pub host: H,
}

impl<H> fmt::Debug for LoadError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<H> fmt::Display for LoadError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<H> std::error::Error for LoadError<H> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A game program running on a VM with the console natives installed.
pub struct Console<H: GameHost + 'static> {
    forth: Forth<H>,
    entry_point: String,
    entry: Option<usize>,
    ticks: u64,
}

impl<H: GameHost + 'static> Console<H> {
    /// Creates a console with the natives and prelude installed but no
    /// program loaded.
    pub fn boot(host: H, settings: &ConsoleSettings, params: ForthParams) -> Result<Self, LoadError<H>> {
        let mut forth = Forth::new(params, host, Forth::FULL_BUILTINS);
        let res = install_natives(&mut forth)
            .and_then(|()| forth.interpret_source(&prelude(settings), PRELUDE_LABEL));
        let mut console = Self {
            forth,
            entry_point: settings.entry_point.clone(),
            entry: None,
            ticks: 0,
        };
        match res {
            Ok(()) => Ok(console),
            Err(error) => {
                console.flush_output();
                Err(console.fail(error))
            }
        }
    }

    /// Boots a console, interprets `source` and resolves the entry word.
    ///
    /// Output the program prints while loading is forwarded to the host,
    /// even when loading fails.
    #[tracing::instrument(level = "debug", skip(host, source, settings, params))]
    pub fn load(
        host: H,
        source: &str,
        label: &str,
        settings: &ConsoleSettings,
        params: ForthParams,
    ) -> Result<Self, LoadError<H>> {
        let mut console = Self::boot(host, settings, params)?;
        if let Err(error) = console.interpret(source, label) {
            return Err(console.fail(error));
        }
        match console.resolve_entry() {
            Ok(entry) => {
                tracing::debug!(entry, words = console.forth.dictionary().len(), "program loaded");
                Ok(console)
            }
            Err(error) => Err(console.fail(error)),
        }
    }

    /// Interprets more source on the running VM.
    pub fn interpret(&mut self, source: &str, label: &str) -> Result<(), Error> {
        let res = self.forth.interpret_source(source, label);
        self.flush_output();
        // the new source may have redefined the entry word
        self.entry = None;
        res
    }

    /// Runs one frame by calling the entry word.
    ///
    /// An error leaves the VM usable, but the frame is abandoned part way
    /// through; callers normally stop ticking.
    pub fn tick(&mut self) -> Result<(), Error> {
        let entry = match self.entry {
            Some(entry) => entry,
            None => self.resolve_entry()?,
        };
        let res = self.forth.call_word(entry);
        self.flush_output();
        self.ticks += 1;
        if let Err(error) = &res {
            tracing::warn!(%error, tick = self.ticks, "frame aborted");
        }
        res
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn forth(&self) -> &Forth<H> {
        &self.forth
    }

    pub fn host(&self) -> &H {
        &self.forth.host_ctxt
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.forth.host_ctxt
    }

    pub fn into_host(self) -> H {
        self.forth.release()
    }

    fn resolve_entry(&mut self) -> Result<usize, Error> {
        let entry = self
            .forth
            .lookup_word(&self.entry_point)
            .ok_or_else(|| Error::MissingEntryPoint(self.entry_point.clone()))?;
        self.entry = Some(entry);
        Ok(entry)
    }

    fn flush_output(&mut self) {
        if !self.forth.output.is_empty() {
            let text = self.forth.output.take();
            self.forth.host_ctxt.write_output(&text);
        }
    }

    fn fail(self, error: Error) -> LoadError<H> {
        LoadError {
            error,
            host: self.into_host(),
        }
    }
}

/// Constants every game program starts with.
pub fn prelude(settings: &ConsoleSettings) -> String {
    let buttons = palette::BUTTONS
        .iter()
        .map(|(name, bit)| format!("{bit} constant {name}\n"));
    let colors = palette::COLOR_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{idx} constant {name}\n"));
    let screen = [
        format!("{} constant SCREEN_WIDTH\n", settings.screen_width),
        format!("{} constant SCREEN_HEIGHT\n", settings.screen_height),
    ];
    buttons.chain(colors).chain(screen).collect()
}

fn install_natives<H: GameHost + 'static>(forth: &mut Forth<H>) -> Result<(), Error> {
    forth.create_builtin_word("cls", 1, |host: &mut H, args: NativeArgs<'_>| {
        host.cls(args[0]);
        Ok(None)
    })?;
    forth.create_builtin_word("set_color", 1, |host: &mut H, args: NativeArgs<'_>| {
        host.set_color(args[0]);
        Ok(None)
    })?;
    forth.create_builtin_word("draw_line", 4, |host: &mut H, args: NativeArgs<'_>| {
        host.draw_line(args[0], args[1], args[2], args[3]);
        Ok(None)
    })?;
    forth.create_builtin_word("fill_rect", 4, |host: &mut H, args: NativeArgs<'_>| {
        host.fill_rect(args[0], args[1], args[2], args[3]);
        Ok(None)
    })?;
    forth.create_builtin_word("draw_sprite", 7, |host: &mut H, args: NativeArgs<'_>| {
        host.draw_sprite(SpriteBlit {
            x: args[0],
            y: args[1],
            index: args[2],
            w: args[3],
            h: args[4],
            flip_x: args[5] != 0,
            flip_y: args[6] != 0,
        });
        Ok(None)
    })?;
    forth.create_builtin_word("draw_text", 4, |host: &mut H, args: NativeArgs<'_>| {
        let text = String::from_utf8_lossy(args.bytes(args[2], args[3])?);
        host.draw_text(args[0], args[1], &text);
        Ok(None)
    })?;
    forth.create_builtin_word(".", 1, |_host: &mut H, mut args: NativeArgs<'_>| {
        let line = format!("{}\n", args[0]);
        args.output().push_str(&line)?;
        Ok(None)
    })?;
    forth.create_builtin_word("buttons", 0, |host: &mut H, _args: NativeArgs<'_>| {
        Ok(Some(host.buttons()))
    })?;
    forth.create_builtin_word("sfx", 1, |host: &mut H, args: NativeArgs<'_>| {
        match usize::try_from(args[0]) {
            Ok(index) if index < MAX_SOUND_EFFECTS => host.sfx(index),
            _ => tracing::debug!(index = args[0], "ignoring out of range sound effect"),
        }
        Ok(None)
    })?;
    Ok(())
}
