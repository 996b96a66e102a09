// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils;
use clap::Args as ClapArgs;
use serde::Serialize;
use tw686x::controls::frame_rates;
use tw686x::format::try_format;
use tw686x::{Control, FieldMode, PixelFormat, VideoStandard};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Only show this standard (ntsc or pal)
    #[arg(short, long)]
    standard: Option<String>,

    /// Negotiate this resolution (WxH) against each standard
    #[arg(short, long)]
    resolution: Option<String>,

    /// Field order to negotiate with --resolution
    #[arg(long, default_value = "any")]
    field: String,

    /// Pixel format to negotiate with --resolution
    #[arg(long, default_value = "YUYV")]
    format: String,

    /// Prefer interlaced over bottom-field capture for small heights
    #[arg(long)]
    no_single_field: bool,
}

#[derive(Debug, Serialize)]
struct PixelFormatInfo {
    fourcc: String,
    hardware_code: u32,
    description: &'static str,
    capturable: bool,
}

#[derive(Debug, Serialize)]
struct NegotiatedFormat {
    width: u32,
    height: u32,
    pixel_format: String,
    field: String,
    bytes_per_line: usize,
    size_image: usize,
}

#[derive(Debug, Serialize)]
struct StandardInfo {
    name: String,
    width: u32,
    height: u32,
    field_rate: u32,
    frame_rates: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negotiated: Option<NegotiatedFormat>,
}

#[derive(Debug, Serialize)]
struct ControlInfo {
    name: &'static str,
    min: i32,
    max: i32,
    default: i32,
}

#[derive(Debug, Serialize)]
struct FormatTable {
    pixel_formats: Vec<PixelFormatInfo>,
    standards: Vec<StandardInfo>,
    controls: Vec<ControlInfo>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    let standards = match &args.standard {
        Some(s) => vec![s.parse::<VideoStandard>()?],
        None => vec![VideoStandard::Ntsc, VideoStandard::Pal],
    };
    let request = args
        .resolution
        .as_deref()
        .map(utils::parse_resolution)
        .transpose()?;
    let field: FieldMode = args.field.parse()?;
    let pixel_format: PixelFormat = args.format.parse()?;

    let mut table = FormatTable {
        pixel_formats: PixelFormat::ALL
            .into_iter()
            .map(|pf| PixelFormatInfo {
                fourcc: pf.fourcc().to_string(),
                hardware_code: pf.hardware_code(),
                description: pf.description(),
                capturable: pf.is_capturable(),
            })
            .collect(),
        standards: Vec::with_capacity(standards.len()),
        controls: Control::ALL
            .into_iter()
            .map(|c| ControlInfo {
                name: c.name(),
                min: *c.range().start(),
                max: *c.range().end(),
                default: c.default_value(),
            })
            .collect(),
    };

    for standard in standards {
        let negotiated = match request {
            Some((width, height)) => {
                let fmt = try_format(
                    standard,
                    width,
                    height,
                    pixel_format,
                    field,
                    !args.no_single_field,
                )?;
                Some(NegotiatedFormat {
                    width: fmt.width,
                    height: fmt.height,
                    pixel_format: fmt.pixel_format.to_string(),
                    field: fmt.field.to_string(),
                    bytes_per_line: fmt.bytes_per_line(),
                    size_image: fmt.size_image(),
                })
            }
            None => None,
        };
        table.standards.push(StandardInfo {
            name: standard.to_string(),
            width: standard.width(),
            height: standard.height(),
            field_rate: standard.field_rate(),
            frame_rates: frame_rates(standard).to_vec(),
            negotiated,
        });
    }

    if json {
        let json = serde_json::to_string_pretty(&table)
            .map_err(|e| CliError::General(format!("Failed to output JSON: {}", e)))?;
        println!("{}", json);
    } else {
        print_text(&table);
    }
    Ok(())
}

fn print_text(table: &FormatTable) {
    println!("Pixel formats:");
    for pf in &table.pixel_formats {
        println!(
            "  {}  code {}  {:<22}{}",
            pf.fourcc,
            pf.hardware_code,
            pf.description,
            if pf.capturable { "" } else { " (not capturable)" }
        );
    }

    for standard in &table.standards {
        println!(
            "\n{}: {}x{}, {} fields/s",
            standard.name, standard.width, standard.height, standard.field_rate
        );
        let rates: Vec<String> = standard.frame_rates.iter().map(u32::to_string).collect();
        println!("  Frame rates: {}", rates.join(", "));
        if let Some(fmt) = &standard.negotiated {
            println!(
                "  Negotiated:  {}x{} {} {} ({} bytes/line, {} bytes)",
                fmt.width,
                fmt.height,
                fmt.pixel_format,
                fmt.field,
                fmt.bytes_per_line,
                fmt.size_image
            );
        }
    }

    println!("\nControls:");
    for control in &table.controls {
        println!(
            "  {:<11} {:>4} .. {:<4} default {}",
            control.name, control.min, control.max, control.default
        );
    }
}
