use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use takeout_meta_core::{CancellationToken, CancelledError, ClassifyOptions, ProcessControl};

#[derive(Parser)]
#[command(
    name = "takeout-meta",
    version,
    about = "Match Google Photos Takeout media with their sidecar metadata"
)]
struct Cli {
    /// Unpacked Takeout directory
    input: Option<PathBuf>,

    /// JSON file with options; command line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable date guessing from filenames
    #[arg(long)]
    no_guess: bool,

    /// Do not read EXIF from media files
    #[arg(long)]
    no_exif: bool,

    /// Do not fall back to the year in the album name
    #[arg(long)]
    no_album_inference: bool,

    /// Write per-file results to this JSON file
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Write the report to this JSON file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> anyhow::Result<ClassifyOptions> {
        let mut options = match &self.config {
            Some(path) => ClassifyOptions::load(path)?,
            None => ClassifyOptions::default(),
        };
        if let Some(input) = &self.input {
            options.input = input.clone();
        }
        if options.input.as_os_str().is_empty() {
            anyhow::bail!("No input directory given");
        }
        options.no_guess |= self.no_guess;
        options.no_exif |= self.no_exif;
        options.no_album_inference |= self.no_album_inference;
        if self.manifest.is_some() {
            options.manifest = self.manifest.clone();
        }
        if self.report.is_some() {
            options.report = self.report.clone();
        }
        Ok(options)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let options = cli.options()?;

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            log::warn!("Interrupted, finishing files in flight");
            token.cancel();
        })
        .context("Cannot install Ctrl-C handler")?;
    }
    let control = ProcessControl::new().with_cancel_token(token);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {prefix} {wide_msg}")
            .context("Invalid progress template")?,
    );
    let bar = pb.clone();
    let outcome = takeout_meta_core::classify_with_control(
        &options,
        &control,
        &move |stage, current, total, message| {
            bar.set_prefix(stage.to_string());
            bar.set_length(total);
            bar.set_position(current);
            bar.set_message(message.to_string());
        },
    );
    pb.finish_and_clear();
    let outcome = outcome?;

    print!("{}", outcome.report);
    eprintln!(
        "Done! {} media files, {} need review ({:.2}s)",
        outcome.report.total,
        outcome.report.count(takeout_meta_core::StrategyTag::Unmapped),
        t_total.elapsed().as_secs_f64()
    );

    if outcome.cancelled {
        return Err(CancelledError.into());
    }
    Ok(())
}
