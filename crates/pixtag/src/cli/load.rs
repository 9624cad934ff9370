//! The `pixtag load` command.

use anyhow::Context;
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pixtag_core::{classify, Config, ImageLoader, LoadRequest, ResizeMode, Size, Source};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Resize mode as accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Stretch to the requested size
    #[default]
    Fill,
    /// Fit inside the requested size
    AspectFit,
    /// Cover the requested size, cropping overflow
    AspectFill,
}

impl From<Mode> for ResizeMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Fill => ResizeMode::Fill,
            Mode::AspectFit => ResizeMode::AspectFit,
            Mode::AspectFill => ResizeMode::AspectFill,
        }
    }
}

/// Arguments for the `load` command.
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Image tag: asset URL, ph:// id, http(s) URL, store key, path, or data URI
    #[arg(required = true)]
    pub tag: String,

    /// Target size in points as WIDTHxHEIGHT (omit for natural size)
    #[arg(short, long, value_parser = parse_size)]
    pub size: Option<Size>,

    /// Pixels per point (0 uses loader.default_scale)
    #[arg(long, default_value = "0")]
    pub scale: f64,

    /// How the image fits the target size
    #[arg(short, long, value_enum, default_value = "fill")]
    pub mode: Mode,

    /// Write the upright image (first frame for animations) to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// What `load` reports about the decoded image.
#[derive(Debug, Serialize)]
struct LoadSummary {
    tag: String,
    source: Source,
    width: u32,
    height: u32,
    scale: f64,
    orientation: String,
    frames: usize,
    elapsed_ms: u128,
}

/// Execute the load command.
pub async fn execute(args: LoadArgs, config: &Config) -> anyhow::Result<()> {
    let loader = ImageLoader::new(config)?;
    let source = classify(&args.tag);

    let mut request = LoadRequest::new(args.tag.clone())
        .scale(args.scale)
        .resize_mode(args.mode.into());
    if let Some(size) = args.size {
        request = request.size(size);
    }

    let progress = if source.is_remote() && !args.json {
        Some(create_progress_bar()?)
    } else {
        None
    };
    if let Some(pb) = &progress {
        let pb = pb.clone();
        request = request.on_progress(move |loaded, total| {
            if let Some(total) = total {
                pb.set_length(total);
            }
            pb.set_position(loaded);
        });
    }

    let start = Instant::now();
    let result = loader.load_async(request).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let image = result?;

    let (width, height) = image.pixel_size();
    let summary = LoadSummary {
        tag: args.tag.clone(),
        source,
        width,
        height,
        scale: image.scale,
        orientation: format!("{:?}", image.orientation),
        frames: image.frames.len().max(1),
        elapsed_ms: start.elapsed().as_millis(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Loaded {} via {}", summary.tag, summary.source);
        println!("  Pixels:      {}x{}", summary.width, summary.height);
        println!("  Scale:       {}", summary.scale);
        println!("  Orientation: {}", summary.orientation);
        println!("  Frames:      {}", summary.frames);
        println!("  Time:        {}ms", summary.elapsed_ms);
    }

    if let Some(path) = &args.output {
        image
            .oriented()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }

    Ok(())
}

/// Parse `WIDTHxHEIGHT` into a size in points.
fn parse_size(s: &str) -> Result<Size, String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let parse = |v: &str| -> Result<f64, String> {
        let value: f64 = v
            .trim()
            .parse()
            .map_err(|_| format!("invalid dimension '{v}'"))?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(format!("dimension must be non-negative, got '{v}'"))
        }
    };
    Ok(Size::new(parse(width)?, parse(height)?))
}

fn create_progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )?
            .progress_chars("##-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_accepts_width_by_height() {
        assert_eq!(parse_size("100x50").unwrap(), Size::new(100.0, 50.0));
        assert_eq!(parse_size("0X240").unwrap(), Size::new(0.0, 240.0));
        assert_eq!(parse_size("12.5x8").unwrap(), Size::new(12.5, 8.0));
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("100").is_err());
        assert!(parse_size("ax10").is_err());
        assert!(parse_size("-1x10").is_err());
    }

    #[test]
    fn mode_maps_to_resize_mode() {
        assert_eq!(ResizeMode::from(Mode::AspectFit), ResizeMode::AspectFit);
        assert_eq!(ResizeMode::from(Mode::default()), ResizeMode::Fill);
    }
}
