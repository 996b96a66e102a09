// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils;
use clap::Args as ClapArgs;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tw686x::format::try_format;
use tw686x::pingpong::Field;
use tw686x::weave::weave_field;
use tw686x::{FieldMode, PixelFormat, VideoStandard};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Raw top field as written by the DMA engine
    top: PathBuf,

    /// Raw bottom field (omit to expand a single top field)
    bottom: Option<PathBuf>,

    /// Output frame file
    #[arg(short, long)]
    output: PathBuf,

    /// Frame resolution in WxH format
    #[arg(short, long, default_value = "720x480")]
    resolution: String,

    /// Pixel format FOURCC
    #[arg(long, default_value = "YUYV")]
    format: String,
}

#[derive(Debug, Serialize)]
struct WeaveSummary {
    output: String,
    format: String,
    field_bytes: usize,
    frame_bytes: usize,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let pixel_format: PixelFormat = args.format.parse()?;
    let field = if args.bottom.is_some() {
        FieldMode::Interlaced
    } else {
        FieldMode::Top
    };

    let standard = if height > VideoStandard::Ntsc.height() {
        VideoStandard::Pal
    } else {
        VideoStandard::Ntsc
    };
    let format = try_format(standard, width, height, pixel_format, field, false)?;
    if (format.width, format.height, format.field) != (width, height, field) {
        return Err(CliError::InvalidArgs(format!(
            "{}x{} {} is not a capture geometry, nearest is {}",
            width, height, field, format
        )));
    }

    let field_size = format.field_size();
    let mut frame = vec![0u8; format.size_image()];
    let single = field.is_single_field();

    let top = read_field(&args.top, field_size)?;
    weave_field(&top, &mut frame, &format, Field::Top, single);
    if let Some(path) = &args.bottom {
        let bottom = read_field(path, field_size)?;
        weave_field(&bottom, &mut frame, &format, Field::Bottom, false);
    }

    fs::write(&args.output, &frame)
        .map_err(|e| CliError::Io(format!("{}: {}", args.output.display(), e)))?;
    log::info!(
        "Wrote {} ({} bytes, {})",
        args.output.display(),
        frame.len(),
        format
    );

    if json {
        let summary = WeaveSummary {
            output: args.output.display().to_string(),
            format: format.to_string(),
            field_bytes: field_size,
            frame_bytes: frame.len(),
        };
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::General(format!("Failed to output JSON: {}", e)))?;
        println!("{}", json);
    }
    Ok(())
}

fn read_field(path: &PathBuf, field_size: usize) -> Result<Vec<u8>, CliError> {
    let data =
        fs::read(path).map_err(|e| CliError::Io(format!("{}: {}", path.display(), e)))?;
    if data.len() < field_size {
        return Err(CliError::InvalidArgs(format!(
            "{} holds {} bytes, one field needs {}",
            path.display(),
            data.len(),
            field_size
        )));
    }
    Ok(data)
}
