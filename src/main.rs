//! pmbus-iccmax - raise ICC_MAX on PMBus VRM controllers
//!
//! Runs against a Linux i2c-dev bus. Status lines go to stdout, diagnostics to the log.

mod cli;

use std::{
    fmt,
    io::{self, Write as _},
    process::ExitCode,
};

use clap::Parser;
use cli::{Cli, Commands};
use linux_embedded_hal::{Delay, I2cdev};
use pmbus_iccmax::{Engine, EngineConfig, StatusLines};

/// Unbuffered stdout, so every status line shows as soon as it happens.
struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut stdout = io::stdout().lock();
        stdout.write_all(s.as_bytes()).map_err(|_| fmt::Error)?;
        stdout.flush().map_err(|_| fmt::Error)
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(cli::normalize_legacy_args(std::env::args_os()));

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let bus = I2cdev::new(&cli.bus)
        .map_err(|e| format!("failed to open {}: {e}", cli.bus.display()))?;
    let config = EngineConfig::new().with_retries(cli.retries);
    let mut engine = Engine::with_config(bus, Delay, config);
    let mut lines = StatusLines::new(Console);

    let success = match &cli.command {
        Commands::Scan { start, end } => {
            let found = engine.scan(*start, *end, &mut lines);
            log::info!("{found} devices answered");
            true
        }
        command => match command.modify() {
            Some((family, args)) => engine
                .run_targets(family, &args.targets(), &mut lines)
                .success(),
            None => false,
        },
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
