use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use regpeek::config::Config;
use regpeek::{DevMem, RegisterReader};

/// Returns whether every address was read.
fn run(config: &Config, out: &mut impl Write, err: &mut impl Write) -> Result<bool> {
    // Opened before anything is printed: a missing device yields no output.
    let memory = DevMem::open(&config.device).context("cannot access physical memory")?;
    let reader = RegisterReader::new(memory)
        .with_width(config.width)
        .with_strict_alignment(config.strict_alignment);

    let mut all_read = true;
    for outcome in reader.read_all(&config.addresses) {
        match outcome.result {
            Ok(value) => writeln!(out, "{value}")?,
            Err(e) => {
                all_read = false;
                out.flush()?;
                writeln!(err, "{} {:#x}: {e}", "error:".red().bold(), outcome.address)?;
            }
        }
    }
    out.flush()?;

    Ok(all_read)
}

fn exit_status(result: &Result<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) | Err(_) => 1,
    }
}

fn main() -> ExitCode {
    let config = Config::parse();
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();

    let result = run(&config, &mut io::stdout().lock(), &mut io::stderr().lock());
    if let Err(e) = &result {
        eprintln!("{} {e:#}", "error:".red().bold());
    }
    ExitCode::from(exit_status(&result))
}
