use std::thread;
use std::time::Duration;

use clap::Parser;
use colored::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chime_core::TonePattern;
use chime_engine::{AudioPlayer, EngineError, ToneSequencer};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::Result;
use crate::shell::Shell;

mod cli;
mod config;
mod display;
mod error;
mod shell;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if cli.no_color {
        colored::control::set_override(false);
    }
    let use_color = !cli.no_color && display::supports_color();

    let cfg = Config::load()?;
    info!(
        sample_rate = cfg.engine.audio.sample_rate,
        alarm_pattern = %cfg.engine.audio.alarm_pattern,
        "configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run {
        no_sound: false,
        no_notify: false,
    }) {
        Commands::Run {
            no_sound,
            no_notify,
        } => {
            let sequencer = (cfg.engine.audio.enabled && !no_sound).then(|| sequencer_for(&cfg));
            let notify = cfg.notifications && !no_notify;
            Shell::new(cfg, sequencer, notify, use_color)?.run()?;
        }
        Commands::Play { pattern, loop_secs } => {
            let pattern: TonePattern = pattern.parse()?;
            let sequencer = sequencer_for(&cfg);
            match loop_secs {
                None => sequencer
                    .play_once(pattern)
                    .join()
                    .map_err(|_| EngineError::playback("tone playback thread panicked"))?,
                Some(secs) => {
                    let handle = sequencer.start_loop(pattern);
                    thread::sleep(Duration::from_secs(secs));
                    handle.cancel();
                    handle.join();
                }
            }
        }
        Commands::Patterns => {
            for pattern in TonePattern::ALL {
                let name = if use_color {
                    pattern.name().cyan().bold().to_string()
                } else {
                    pattern.name().to_string()
                };
                println!(
                    "{:<10} {} tone(s), {} ms",
                    name,
                    pattern.steps().len(),
                    pattern.duration().as_millis()
                );
            }
        }
        Commands::Config => {
            let path = Config::path()?;
            println!("Config file: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

fn sequencer_for(cfg: &Config) -> ToneSequencer {
    let player = AudioPlayer::with_default_output(cfg.engine.audio.sample_rate);
    ToneSequencer::new(player, &cfg.engine.audio)
}

/// Logs go to stderr so they never interleave with prompts on stdout.
/// `RUST_LOG` overrides the verbosity flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "chime=error,chime_engine=error",
        (false, 0) => "chime=warn,chime_engine=warn",
        (false, 1) => "chime=info,chime_engine=info",
        (false, _) => "chime=debug,chime_engine=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
