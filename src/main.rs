//! Stream Deck sample client
//!
//! Prints pressed keys and paints keys from commands read on stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use stream_deck_hid::{core::config::Config, hid::HidApiHandle, StreamDeck};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "Commands:
  s                stop listening
  e                start listening
  c R G B KEY      paint KEY a solid color
  i KEY PATH       paint KEY with an image file
  q                quit";

/// One line of stdin input
#[derive(Debug, PartialEq)]
enum Command {
    Stop,
    Start,
    Color { r: u8, g: u8, b: u8, key: u8 },
    Image { key: u8, path: PathBuf },
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(None);
        };

        let command = match name {
            "s" => Command::Stop,
            "e" => Command::Start,
            "q" => Command::Quit,
            "c" => {
                let args: Vec<u8> = parts
                    .map(|p| p.parse::<u8>().with_context(|| format!("Invalid number: {p}")))
                    .collect::<Result<_>>()?;
                let &[r, g, b, key] = &args[..] else {
                    bail!("Usage: c R G B KEY");
                };
                Command::Color { r, g, b, key }
            }
            "i" => {
                let key = parts.next().context("Usage: i KEY PATH")?;
                let key = key
                    .parse::<u8>()
                    .with_context(|| format!("Invalid key: {key}"))?;
                let path: Vec<&str> = parts.collect();
                if path.is_empty() {
                    bail!("Usage: i KEY PATH");
                }
                Command::Image {
                    key,
                    path: PathBuf::from(path.join(" ")),
                }
            }
            other => bail!("Unknown command: {other}"),
        };
        Ok(Some(command))
    }
}

fn run_command(deck: &StreamDeck<HidApiHandle>, command: Command) -> Result<()> {
    match command {
        Command::Stop => deck.stop_listening()?,
        Command::Start => deck.start_listening()?,
        Command::Color { r, g, b, key } => deck.write_color(r, g, b, key)?,
        Command::Image { key, path } => deck.write_image_file(key, &path)?,
        Command::Quit => {}
    }
    Ok(())
}

fn run() -> Result<ExitCode> {
    let config = Config::load()?;
    info!("Configuration loaded");

    let Some(deck) = StreamDeck::discover_hid(&config.device)? else {
        eprintln!(
            "No {} {} found. Is it plugged in?",
            config.device.manufacturer, config.device.product
        );
        return Ok(ExitCode::FAILURE);
    };

    deck.listen(|event| {
        for key in event.keys.iter() {
            println!("Key: {key} pressed");
        }
    })?;

    println!("{USAGE}");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match Command::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = run_command(&deck, command) {
                    warn!("Command failed: {:#}", e);
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{e:#}"),
        }
        io::stdout().flush()?;
    }

    deck.dispose()?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    info!("Starting Stream Deck client");

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
