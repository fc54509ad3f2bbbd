use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use tracemark::{
    payload_bit_length, scan_files, ConfigOverrides, CropHint, DecodedWatermark,
    WatermarkConfig, WatermarkPayload, Watermarker,
};

/// tracemark — embed traceable viewer identities into images and recover them from leaks.
#[derive(Parser)]
#[command(name = "tracemark", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Mark parameters. Unset flags fall back to the TRACEMARK_* environment, then defaults.
#[derive(Args)]
struct MarkArgs {
    /// Secret key seeding the position schedule (must match between embed and extract)
    #[arg(long)]
    secret_key: Option<String>,

    /// Perturbation strength as a fraction of the channel range (default: 0.15)
    #[arg(long)]
    strength: Option<f64>,

    /// Repetitions per bit (default: 5)
    #[arg(long)]
    repetitions: Option<u32>,

    /// Minimum width and height in pixels (default: 64)
    #[arg(long)]
    min_image_size: Option<u32>,

    /// JPEG re-encoding quality (default: 90)
    #[arg(long)]
    output_quality: Option<u8>,
}

impl MarkArgs {
    fn into_config(self) -> Result<WatermarkConfig> {
        let overrides = ConfigOverrides {
            strength: self.strength,
            repetitions: self.repetitions,
            secret_key: self.secret_key,
            min_image_size: self.min_image_size,
            output_quality: self.output_quality,
        };
        let base = WatermarkConfig::from_env().context("invalid TRACEMARK_* environment")?;
        Ok(base.merged(&overrides))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a viewer watermark into an image
    Embed {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Viewer identifier (up to 28 ASCII characters)
        #[arg(long)]
        viewer_id: String,

        /// Screenshot/view identifier (up to 32 ASCII characters)
        #[arg(long)]
        screenshot_id: String,

        /// View time in milliseconds since the epoch (default: now)
        #[arg(long)]
        timestamp: Option<u64>,

        #[command(flatten)]
        mark: MarkArgs,
    },

    /// Extract a watermark from a candidate image
    Extract {
        /// Candidate image path
        #[arg(short, long)]
        input: PathBuf,

        /// Width of the marked image this candidate was cropped from
        #[arg(long, requires = "original_height")]
        original_width: Option<u32>,

        /// Height of the marked image this candidate was cropped from
        #[arg(long, requires = "original_width")]
        original_height: Option<u32>,

        /// Horizontal position of the crop in the marked image
        #[arg(long, default_value_t = 0)]
        offset_x: u32,

        /// Vertical position of the crop in the marked image
        #[arg(long, default_value_t = 0)]
        offset_y: u32,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        mark: MarkArgs,
    },

    /// Check whether an image is large enough to carry a watermark
    Capacity {
        /// Image path
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        mark: MarkArgs,
    },

    /// Extract watermarks from many candidate images in parallel
    Scan {
        /// Candidate image paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        mark: MarkArgs,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Embed {
            input,
            output,
            viewer_id,
            screenshot_id,
            timestamp,
            mark,
        } => {
            let marker = Watermarker::new(mark.into_config()?)?;
            let view_timestamp = match timestamp {
                Some(ts) => ts,
                None => now_millis()?,
            };
            let payload = WatermarkPayload::new(viewer_id, view_timestamp, screenshot_id);

            let original = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let marked = marker
                .embed(&original, &payload)
                .with_context(|| format!("failed to watermark {}", input.display()))?;
            fs::write(&output, &marked)
                .with_context(|| format!("failed to write {}", output.display()))?;

            info!("embed complete! output: {}", output.display());
        }

        Commands::Extract {
            input,
            original_width,
            original_height,
            offset_x,
            offset_y,
            json,
            mark,
        } => {
            let marker = Watermarker::new(mark.into_config()?)?;
            let candidate = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;

            let decoded = match original_width.zip(original_height) {
                Some((original_width, original_height)) => marker.extract_cropped(
                    &candidate,
                    CropHint {
                        original_width,
                        original_height,
                        offset_x,
                        offset_y,
                    },
                )?,
                None => marker.extract(&candidate)?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&decoded)?);
            } else {
                print_decoded(&decoded);
            }
        }

        Commands::Capacity { input, mark } => {
            let marker = Watermarker::new(mark.into_config()?)?;
            let image = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let fits = marker.has_capacity(&image);
            println!(
                "{}: {} ({} bits x {} repetitions)",
                input.display(),
                if fits { "has capacity" } else { "too small" },
                payload_bit_length(),
                marker.config().repetitions
            );
        }

        Commands::Scan { inputs, json, mark } => {
            let marker = Watermarker::new(mark.into_config()?)?;
            let reports = scan_files(&marker, &inputs, !json);

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    match (&report.decoded, &report.error) {
                        (Some(d), _) if d.valid => println!(
                            "{}: viewer={} screenshot={} timestamp={} confidence={:.3}",
                            report.path.display(),
                            d.viewer_id,
                            d.screenshot_id,
                            d.view_timestamp,
                            d.confidence
                        ),
                        (Some(d), _) => println!(
                            "{}: no valid watermark (confidence={:.3})",
                            report.path.display(),
                            d.confidence
                        ),
                        (None, Some(e)) => println!("{}: error: {}", report.path.display(), e),
                        (None, None) => {}
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_decoded(decoded: &DecodedWatermark) {
    println!("valid:          {}", decoded.valid);
    println!("confidence:     {:.3}", decoded.confidence);
    println!("viewer id:      {}", decoded.viewer_id);
    println!("screenshot id:  {}", decoded.screenshot_id);
    println!("view timestamp: {}", decoded.view_timestamp);
}

fn now_millis() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(elapsed.as_millis() as u64)
}
