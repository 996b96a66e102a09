// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tw686x::{ChannelId, MAX_CHANNELS};

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s.split_once(['x', '*']).ok_or_else(|| {
        CliError::InvalidArgs(format!(
            "Invalid resolution format (expected WxH or W*H): {}",
            s
        ))
    })?;

    let width = width_str
        .trim()
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .trim()
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a channel list such as "0,2,5", "0-3" or "all"
pub fn parse_channels(s: &str) -> Result<Vec<ChannelId>, CliError> {
    if s.eq_ignore_ascii_case("all") {
        return Ok(ChannelId::all().collect());
    }

    let mut channels = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (first, last) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, s)?, parse_index(b, s)?),
            None => {
                let index = parse_index(part, s)?;
                (index, index)
            }
        };
        if first > last {
            return Err(CliError::InvalidArgs(format!(
                "Channel range runs backwards: {}",
                part
            )));
        }
        for index in first..=last {
            let channel = ChannelId::new(index)?;
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
    }

    if channels.is_empty() {
        return Err(CliError::InvalidArgs(format!("No channels in: {}", s)));
    }
    Ok(channels)
}

fn parse_index(part: &str, whole: &str) -> Result<usize, CliError> {
    part.trim().parse::<usize>().map_err(|_| {
        CliError::InvalidArgs(format!(
            "Invalid channel in {} (expected 0..{})",
            whole, MAX_CHANNELS
        ))
    })
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}
