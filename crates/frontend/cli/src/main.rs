mod config;
mod dump;

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gbi_core::logging::{LogConfig, LogLevel};
use gbi_core::memory::parse_hex;
use gbi_core::{BackingImage, BankedImage, SegmentedAddress};

use config::SceneConfig;

#[derive(Parser)]
#[command(about = "Decode an F3DEX2 display list from a memory image")]
struct Args {
    /// Image containing the display list and the data it references
    image: PathBuf,

    /// Segmented start address of the display list, in hex (e.g. 06001230)
    start: String,

    /// JSON scene config with "banks" and "options"
    #[arg(long)]
    config: Option<PathBuf>,

    /// Map a segment: SEG=BASE[:SIZE] in hex; repeatable, overrides --config
    #[arg(long = "bank", value_name = "SEG=BASE[:SIZE]")]
    banks: Vec<String>,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write every decoded texture as a PNG into this directory
    #[arg(long, value_name = "DIR")]
    dump_textures: Option<PathBuf>,

    /// Decoder log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Send decoder logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not print the report
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let level = match LogLevel::from_str(&args.log_level) {
        Some(level) => level,
        None => bail!("Unknown log level: {}", args.log_level),
    };
    let log_config = LogConfig::global();
    log_config.set_global_level(level);
    if let Some(path) = &args.log_file {
        log_config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }

    let mut scene = match &args.config {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    scene.apply_bank_specs(&args.banks)?;
    if scene.banks.is_empty() {
        log::warn!("no banks mapped; every address will be unmapped");
    }

    let start = match parse_hex(&args.start).and_then(|v| u32::try_from(v).ok()) {
        Some(start) => SegmentedAddress(start),
        None => bail!("Invalid start address: {}", args.start),
    };

    let data = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    let image = BackingImage::load(&data)?;
    log::info!(
        "loaded {} ({} bytes), {} bank(s) mapped",
        args.image.display(),
        image.len(),
        scene.banks.len()
    );

    let memory = BankedImage::new(&image, &scene.banks);
    let result = gbi_f3dex2::decode(&memory, start, &scene.options);
    if let Some(reason) = &result.truncated {
        log::warn!("decode stopped early: {}", reason);
    }
    log::info!(
        "{} command(s), {} triangle(s), {} texture(s)",
        result.commands.len(),
        result.triangle_count(),
        result.textures.len()
    );

    if let Some(dir) = &args.dump_textures {
        let written = dump::dump_textures(dir, result.textures.iter().map(|t| t.as_ref()))?;
        log::info!("wrote {} texture(s) to {}", written.len(), dir.display());
    }

    let report = serde_json::to_string_pretty(&result.summary())?;
    match &args.report {
        Some(path) => {
            let mut f = File::create(path)
                .with_context(|| format!("creating report {}", path.display()))?;
            writeln!(f, "{}", report)?;
        }
        None if !args.quiet => println!("{}", report),
        None => {}
    }

    log_config.clear_log_file();
    Ok(())
}
