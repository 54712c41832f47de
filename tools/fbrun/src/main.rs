use std::{
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use forthboy::{Cart, Console, LoadError, RecordingHost};
use miette::{Context, IntoDiagnostic};
use tracing::level_filters::LevelFilter;

use crate::config::Config;

mod config;
mod repl;

/// Label used for source that did not come from a named file.
const UNNAMED_SOURCE: &str = "<game source>";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// path to a TOML file with `[forth]` and `[console]` settings.
    #[arg(short, long, global = true, env = "FORTHBOY_CONFIG")]
    config: Option<PathBuf>,

    /// a comma-separated list of `tracing` targets and levels to enable.
    ///
    /// for example, `info,gameforth=debug` enables the `INFO` level
    /// globally and the `DEBUG` level for the forth runtime.
    ///
    /// see <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/targets/struct.Targets.html#filtering-with-targets>
    /// for more details on this syntax.
    #[arg(
        short,
        long = "trace",
        global = true,
        env = "FORTHBOY_TRACE",
        default_value_t = tracing_subscriber::filter::Targets::new().with_default(LevelFilter::INFO),
    )]
    trace_filter: tracing_subscriber::filter::Targets,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Load a cart and run it for a number of frames, printing its output.
    Run(RunArgs),
    /// Check that a cart parses, compiles and defines its entry word.
    Check {
        /// the cart (or bare source file) to check.
        cart: PathBuf,
    },
    /// Open a prompt on a console with the game natives installed.
    Repl,
}

#[derive(clap::Args)]
struct RunArgs {
    /// the cart (or bare source file) to run.
    cart: PathBuf,

    /// how many frames to run.
    #[arg(short, long, default_value_t = 1)]
    ticks: u64,

    /// button mask reported to the game on every frame.
    #[arg(short, long, default_value_t = 0)]
    buttons: i32,

    /// wait the configured tick interval between frames.
    #[arg(long)]
    realtime: bool,

    /// print every draw and sound request.
    #[arg(long)]
    dump: bool,
}

fn main() -> miette::Result<()> {
    use tracing_subscriber::prelude::*;

    let Args {
        cmd,
        config,
        trace_filter,
    } = Args::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .with(trace_filter)
        .init();

    let config = Config::load(config.as_deref())?;
    match cmd {
        Command::Run(args) => run(args, &config),
        Command::Check { cart } => check(&cart, &config),
        Command::Repl => repl::run(&config),
    }
}

fn run(args: RunArgs, config: &Config) -> miette::Result<()> {
    let cart = read_cart(&args.cart)?;
    let mut console = load(&args.cart, &cart, config, args.buttons)?;
    drain(&mut console, args.dump);

    let interval = Duration::from_millis(config.console.tick_interval_ms);
    for _ in 0..args.ticks {
        let started = Instant::now();
        let res = console.tick();
        drain(&mut console, args.dump);
        res.into_diagnostic()
            .wrap_err_with(|| format!("game halted on frame {}", console.ticks()))?;
        if args.realtime {
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }
    tracing::info!(ticks = console.ticks(), "finished");
    Ok(())
}

fn check(path: &Path, config: &Config) -> miette::Result<()> {
    let cart = read_cart(path)?;
    let mut console = load(path, &cart, config, 0)?;
    drain(&mut console, false);

    let forth = console.forth();
    let opaque = cart.sprites.pixels().iter().filter(|&&px| px != 0).count();
    let sounds = cart.sounds.effects().iter().filter(|fx| !fx.is_silent()).count();
    println!(
        "{}: ok ({} words, {} bytes used, {opaque} sprite pixels, {sounds} sound effects)",
        path.display(),
        forth.dictionary().visible().count(),
        forth.memory().here(),
    );
    Ok(())
}

fn read_cart(path: &Path) -> miette::Result<Cart> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Cart::parse_or_source(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse cart {}", path.display()))
}

fn load(
    path: &Path,
    cart: &Cart,
    config: &Config,
    buttons: i32,
) -> miette::Result<Console<RecordingHost>> {
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNNAMED_SOURCE.to_string());
    match Console::load(
        RecordingHost::with_buttons(buttons),
        &cart.source,
        &label,
        &config.console,
        config.forth.clone(),
    ) {
        Ok(console) => Ok(console),
        Err(LoadError { error, host }) => {
            print!("{}", host.output);
            Err(error)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to load {}", path.display()))
        }
    }
}

/// Prints whatever the game wrote, and the requests it made if asked to.
fn drain(console: &mut Console<RecordingHost>, dump: bool) {
    let frame = console.ticks();
    let host = console.host_mut();
    print!("{}", host.take_output());
    let commands = host.take_commands();
    tracing::debug!(frame, commands = commands.len(), "drained frame");
    if dump {
        for cmd in &commands {
            println!("[{frame}] {cmd:?}");
        }
    }
}

#[cfg(test)]
mod test {
    use forthboy::{palette, DrawCommand};

    use super::*;

    const BOUNCER: &str = include_str!("../carts/bouncer.fb");

    #[test]
    fn bundled_cart_runs() {
        let cart = Cart::parse(BOUNCER).unwrap();
        assert_eq!(cart.sprites.get(2, 0), Some(9));
        assert!(!cart.sounds.get(0).unwrap().is_silent());
        assert_eq!(Cart::parse(&cart.to_text()).unwrap(), cart);

        let mut console = load(
            Path::new("bouncer.fb"),
            &cart,
            &Config::default(),
            palette::BUTTON_RIGHT,
        )
        .unwrap();
        for _ in 0..300 {
            console.tick().unwrap();
        }
        let commands = console.host_mut().take_commands();
        let bounces = commands
            .iter()
            .filter(|cmd| **cmd == DrawCommand::Sfx(0))
            .count();
        assert_eq!(bounces, 2);
        assert!(commands.contains(&DrawCommand::Text {
            x: 2,
            y: 2,
            text: "BOUNCER".to_string(),
        }));
    }
}
