//! geozonal CLI - zonal statistics over raster time series

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geozonal_algorithms::pipeline::{run, RunConfig, RunSummary};
use geozonal_algorithms::temporal::{RasterCatalog, Reducer};
use geozonal_core::io::open_raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geozonal")]
#[command(author, version, about = "Zonal statistics over raster time series", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute zonal statistics of rasters against vector features
    Stats(StatsArgs),
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// List rasters in processing order with their date keys
    Catalog {
        /// Raster paths or glob patterns
        #[arg(required = true)]
        rasters: Vec<String>,
        /// Regex with one capture group around the date token
        #[arg(long)]
        date_pattern: Option<String>,
        /// chrono format of the date token (after removing '-' and '_')
        #[arg(long)]
        date_format: Option<String>,
    },
}

#[derive(Args)]
struct StatsArgs {
    /// JSON configuration file; flags given here override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vector file with polygon features (GeoJSON)
    #[arg(short, long)]
    geometry: Option<PathBuf>,

    /// Raster paths or glob patterns (quote globs)
    #[arg(short, long, num_args = 1..)]
    rasters: Vec<String>,

    /// Output vector file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write one time series CSV per feature
    #[arg(long)]
    export_csv: bool,

    /// Directory for the CSV files [default: timeseries_csv next to the output]
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Attribute holding a unique feature id [default: feature_<index>]
    #[arg(long)]
    id_field: Option<String>,

    /// Simplification tolerance, in the vector file's CRS units
    #[arg(long)]
    simplify: Option<f64>,

    /// Allow simplification to change topology (faster, may be invalid)
    #[arg(long)]
    no_preserve_topology: bool,

    /// Include every pixel touched by a polygon, not only pixel centers inside it
    #[arg(long)]
    all_touched: bool,

    /// Band names, in band order
    #[arg(long, value_delimiter = ',')]
    band_names: Vec<String>,

    /// Nodata value overriding the rasters' own
    #[arg(long, allow_negative_numbers = true)]
    nodata: Option<f64>,

    /// EPSG code of the vector file, overriding its declaration
    #[arg(long)]
    geometry_epsg: Option<u32>,

    /// Time series reducer for the output attributes: last, first, mean
    #[arg(long)]
    reducer: Option<String>,

    /// Embed each feature's time series as a `timeseries` property
    #[arg(long)]
    embed_timeseries: bool,

    /// Regex with one capture group around the date token
    #[arg(long)]
    date_pattern: Option<String>,

    /// chrono format of the date token (after removing '-' and '_')
    #[arg(long)]
    date_format: Option<String>,
}

impl StatsArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("Failed to read configuration {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(geometry) = self.geometry {
            config.geometry_path = geometry;
        }
        if !self.rasters.is_empty() {
            config.raster_paths = self.rasters;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if self.export_csv {
            config.export_csv = true;
        }
        if self.csv_dir.is_some() {
            config.csv_dir = self.csv_dir;
        }
        if self.id_field.is_some() {
            config.id_field = self.id_field;
        }
        if self.simplify.is_some() {
            config.simplify_tolerance = self.simplify;
        }
        if self.no_preserve_topology {
            config.preserve_topology = false;
        }
        if self.all_touched {
            config.all_touched = true;
        }
        if !self.band_names.is_empty() {
            config.band_names = self.band_names;
        }
        if self.nodata.is_some() {
            config.nodata = self.nodata;
        }
        if self.geometry_epsg.is_some() {
            config.geometry_epsg = self.geometry_epsg;
        }
        if let Some(reducer) = self.reducer {
            config.reducer = reducer.parse::<Reducer>().context("Invalid --reducer")?;
        }
        if self.embed_timeseries {
            config.embed_timeseries = true;
        }
        if let Some(pattern) = self.date_pattern {
            config.date_pattern = pattern;
        }
        if let Some(format) = self.date_format {
            config.date_format = format;
        }
        Ok(config)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")?;
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn done(summary: &RunSummary, output: &Path, elapsed: std::time::Duration) {
    println!(
        "Statistics for {} features over {} raster(s) saved to: {}",
        summary.features,
        summary.rasters_processed,
        output.display()
    );
    if !summary.rasters_failed.is_empty() {
        println!("  Rasters skipped: {}", summary.rasters_failed.len());
    }
    if summary.files_written.len() > 1 {
        println!("  Time series tables: {}", summary.files_written.len() - 1);
    }
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Stats ────────────────────────────────────────────────────
        Commands::Stats(args) => {
            let config = args.into_config()?;
            let start = Instant::now();
            let pb = spinner("Computing zonal statistics...");
            let result = run(&config);
            pb.finish_and_clear();
            let summary = result.context("Zonal statistics failed")?;
            let output = summary
                .files_written
                .first()
                .cloned()
                .unwrap_or_else(|| config.output_path.clone());
            done(&summary, &output, start.elapsed());
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let source = open_raster(&input)
                .with_context(|| format!("Failed to open raster {}", input.display()))?;
            let (rows, cols) = source.shape();
            let transform = source.transform();
            let bounds = transform.bounds(cols, rows);

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
            println!("Bands: {}", source.band_count());
            println!(
                "Pixel size: {} x {}",
                transform.pixel_width,
                transform.pixel_height.abs()
            );
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match source.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: undefined"),
            }
            for band in 0..source.band_count() {
                if let Some(nodata) = source.nodata(band) {
                    println!("NoData (band {}): {}", band + 1, nodata);
                }
            }
        }

        // ── Catalog ──────────────────────────────────────────────────
        Commands::Catalog {
            rasters,
            date_pattern,
            date_format,
        } => {
            let defaults = RunConfig::default();
            let config = RunConfig {
                date_pattern: date_pattern.unwrap_or(defaults.date_pattern),
                date_format: date_format.unwrap_or(defaults.date_format),
                ..RunConfig::default()
            };
            let dates = config.date_pattern().context("Invalid date pattern")?;
            let catalog = RasterCatalog::resolve(&rasters, &dates).context("Failed to build raster catalog")?;
            info!("{} raster(s)", catalog.len());
            for entry in catalog.iter() {
                println!("{}\t{}", entry.label(), entry.path.display());
            }
        }
    }

    Ok(())
}
