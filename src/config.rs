use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use crate::mems::DEFAULT_DEVICE;
use crate::value::AccessWidth;

/// Read hardware registers through the physical memory device.
///
/// Prints one hexadecimal value per address. Needs enough privilege to
/// open the device read/write. Reading a register may have side effects
/// on the hardware behind it.
#[derive(Parser, Debug)]
#[command(name = "regpeek", version)]
pub struct Config {
    /// Physical memory device to map from
    #[arg(short, long, env = "REGPEEK_DEVICE", default_value = DEFAULT_DEVICE)]
    pub device: PathBuf,

    /// Access width in bytes (1, 2, 4 or 8)
    #[arg(short, long, default_value = "4", value_parser = parse_width)]
    pub width: AccessWidth,

    /// Reject addresses not aligned to the access width instead of
    /// reading them byte by byte
    #[arg(long)]
    pub strict_alignment: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Physical addresses in hexadecimal, e.g. 0x2030a00000
    #[arg(required = true, value_parser = parse_address)]
    pub addresses: Vec<u64>,
}

impl Config {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Parses a hexadecimal address, with or without a `0x` prefix.
pub fn parse_address(s: &str) -> Result<u64, String> {
    let digits = s
        .trim()
        .strip_prefix("0x")
        .or_else(|| s.trim().strip_prefix("0X"))
        .unwrap_or(s.trim())
        .replace('_', "");
    // from_str_radix alone would also take a leading '+'.
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'{s}' is not a hexadecimal address"));
    }
    u64::from_str_radix(&digits, 16).map_err(|e| format!("'{s}' is not a hexadecimal address: {e}"))
}

fn parse_width(s: &str) -> Result<AccessWidth, String> {
    let size: usize = s.parse().map_err(|e| format!("'{s}': {e}"))?;
    AccessWidth::try_from(size).map_err(|e| e.to_string())
}
