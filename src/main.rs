use suboverlay::{active_text, Parser, RenderSink, Session, SessionConfig, TimeSource};

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::{info, warn};

fn main() {
    match run() {
        Ok(()) => (),
        Err(err) => {
            eprintln!("An error occurred: {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("    {}", cause);
            }
        }
    }
}

#[derive(ClapParser)]
#[command(about = "Show SRT subtitles in sync with a playback clock")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "The file to read from. If not supplied, the subtitles will be read from standard input.",
        default_value = "-"
    )]
    input: String,
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Shift every lookup by this many seconds to correct out-of-sync subtitles.",
        default_value_t = 0.0,
        allow_negative_numbers = true
    )]
    offset: f64,
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Print the subtitles showing at this playback time. May be repeated.",
        conflicts_with = "play",
        allow_negative_numbers = true
    )]
    at: Vec<f64>,
    #[arg(
        long,
        help = "Play the subtitles against the wall clock, printing each change."
    )]
    play: bool,
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Playback position to start playing from.",
        default_value_t = 0.0
    )]
    start: f64,
    #[arg(
        long,
        value_name = "SECONDS",
        help = "How long to play for.",
        default_value_t = 10.0
    )]
    duration: f64,
    #[arg(
        long,
        value_name = "MS",
        help = "Interval between subtitle updates while playing.",
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Log more. May be repeated."
    )]
    verbose: u8,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    let data = if cli.input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&cli.input)
            .context(format!("Failed to open input file: '{}'", cli.input))?
    };

    if cli.play {
        return play(&cli, &data);
    }

    let mut parser = Parser::new();
    let track = parser.parse(&data);
    if track.is_empty() {
        warn!("No subtitles found in '{}'", cli.input);
    }
    if !parser.anomalies().is_empty() {
        info!("{} problems found while parsing", parser.anomalies().len());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.at.is_empty() {
        for record in &track {
            writeln!(out, "{:.3} --> {:.3}\t{}", record.from, record.to, record.text)?;
        }
    } else {
        for time in &cli.at {
            writeln!(out, "{:.3}\t{}", time, active_text(&track, time + cli.offset))?;
        }
    }
    Ok(())
}

fn play(cli: &Cli, data: &str) -> Result<()> {
    let config = SessionConfig {
        tick_interval: Duration::from_millis(cli.interval_ms),
    };
    let clock = WallClock {
        started: Instant::now(),
        start_at: cli.start,
        offset: cli.offset,
    };
    let mut session = Session::new(config);
    let cues = session
        .load(data, clock, StdoutSink::default())
        .context(format!("Failed to load subtitles from '{}'", cli.input))?;
    info!("Playing {} cues from {:.3}s", cues, cli.start);

    let duration = Duration::try_from_secs_f64(cli.duration)
        .context(format!("Invalid play duration: {}", cli.duration))?;
    thread::sleep(duration);
    session.clear();
    Ok(())
}

/// Playback position that advances in real time from `start_at`.
struct WallClock {
    started: Instant,
    start_at: f64,
    offset: f64,
}

impl TimeSource for WallClock {
    fn current_time(&self) -> Option<f64> {
        Some(self.start_at + self.started.elapsed().as_secs_f64())
    }

    fn offset(&self) -> f64 {
        self.offset
    }
}

/// Prints the overlay whenever it changes.
#[derive(Default)]
struct StdoutSink {
    started: Option<Instant>,
    shown: String,
}

impl RenderSink for StdoutSink {
    fn render(&mut self, markup: &str) {
        let started = *self.started.get_or_insert_with(Instant::now);
        if markup == self.shown {
            return;
        }
        self.shown = markup.to_string();
        println!("[{:>8.3}] {}", started.elapsed().as_secs_f64(), markup);
    }
}

fn setup_logger(level: u8) {
    let log_level = match level {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();
}
