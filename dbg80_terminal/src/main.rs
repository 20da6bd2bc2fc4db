use anyhow::{bail, Context, Result};
use clap::Parser;
use dbg80_core::debugger::frontends::terminal::TerminalDebugger;
use dbg80_core::expr::parse_number;
use dbg80_core::{Debugger, DebuggerConfig, Machine, SavedState};
use flexi_logger::Logger;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Parser, Debug)]
#[command(name = "dbg80", version, about = "Interactive debugger for an emulated 8080")]
struct Args {
    /// Raw binary image to load
    image: Option<PathBuf>,

    /// Load address of the image (hex unless prefixed with #)
    #[arg(short = 'l', long = "load", default_value = "0")]
    load: String,

    /// Initial program counter, defaults to the load address
    #[arg(short = 'e', long = "entry")]
    entry: Option<String>,

    /// JSON symbol file (one group or an array of groups)
    #[arg(short = 's', long = "symbols")]
    symbols: Vec<PathBuf>,

    /// JSON debugger configuration
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Debugger state file, restored at startup and saved on exit
    #[arg(long = "state")]
    state: Option<PathBuf>,

    /// Log specification used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "warn")]
    log_level: String,

    /// Commands to run before reading from stdin
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Exit after running the -c commands
    #[arg(long = "batch", default_value_t = false)]
    batch: bool,
}

fn address_arg(text: &str) -> Result<u16> {
    match parse_number(text) {
        Some(value) if (0..=0xFFFF).contains(&value) => Ok(value as u16),
        _ => bail!("invalid address: {}", text),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _logger = Logger::try_with_env_or_str(&args.log_level)?
        .start()
        .context("starting logger")?;

    let config = match args.config {
        Some(ref path) => DebuggerConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => DebuggerConfig::default(),
    };

    let mut machine = Machine::new();
    let mut debugger = Debugger::new(config);

    if let Some(ref path) = args.state {
        if path.exists() {
            let state = SavedState::load(path).with_context(|| format!("reading state {}", path.display()))?;
            debugger.restore_state(&state)?;
        }
    }

    for path in &args.symbols {
        let text = fs::read_to_string(path).with_context(|| format!("reading symbols {}", path.display()))?;
        let groups = debugger
            .symbols
            .load_json(&text)
            .with_context(|| format!("parsing symbols {}", path.display()))?;
        log::info!("{} symbol groups from {}", groups, path.display());
    }

    let load = address_arg(&args.load)?;
    if let Some(ref path) = args.image {
        let len = machine
            .load_image_file(path, load)
            .with_context(|| format!("loading image {}", path.display()))?;
        log::info!("{} bytes loaded at {:04X}", len, load);
    }

    let entry = match args.entry {
        Some(ref entry) => address_arg(entry)?,
        None => load,
    };
    machine.set_entry_point(entry);
    machine.power_on();
    debugger.on_power(&mut machine, true);

    // Ctrl-C ends a running `g` or `t` at the next chunk boundary
    let stop = machine.stop_handle();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)).context("installing Ctrl-C handler")?;

    for command in &args.commands {
        debugger.do_command(&mut machine, command);
    }

    if !args.batch {
        let stdin = io::stdin();
        TerminalDebugger::new().start_listening(&mut debugger, &mut machine, stdin.lock())?;
    }

    if let Some(ref path) = args.state {
        debugger
            .save_state()?
            .save(path)
            .with_context(|| format!("writing state {}", path.display()))?;
    }

    Ok(())
}
