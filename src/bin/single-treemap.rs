//! Draw a tree map of one compound library.
//!
//! ```bash
//! single-treemap --library library.csv --output out/ --descriptors MolWeight RingCount
//! single-treemap --config tmap.yaml --matplotlib
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chemtreemap::*;
use clap::Parser;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "single-treemap")]
#[command(about = "Draw a minimum spanning tree map of a chemical library")]
#[command(version)]
struct Args {
    /// Library file with header in CSV format; needs `id` and `smiles` columns
    #[arg(long)]
    library: Option<PathBuf>,

    /// Output directory (created if missing)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Fingerprint type for creating the tree map [default: MHFP6]
    #[arg(long)]
    fingerprint: Option<String>,

    /// Fingerprint dimension [default: 1024]
    #[arg(short, long)]
    dimension: Option<usize>,

    /// Descriptors added as node features
    #[arg(long, num_args = 0..)]
    descriptors: Option<Vec<String>>,

    /// Additional feature table with header in CSV format, keyed by `id`
    #[arg(long)]
    features: Option<PathBuf>,

    /// Draw a static SVG instead of the interactive page
    #[arg(long)]
    matplotlib: bool,

    /// Seed for the placeholder column and bit-vector MinHash [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// Nearest neighbours per compound in the kNN graph [default: 10]
    #[arg(short = 'k', long)]
    neighbours: Option<usize>,

    /// Trees in the LSH forest [default: 8]
    #[arg(long)]
    trees: Option<usize>,

    /// Fail on the first invalid structure instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Log level
    #[arg(long, default_value = "debug")]
    log_level: String,

    /// YAML configuration; flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available fingerprints and descriptors, then exit
    #[arg(long)]
    list: bool,
}

impl Args {
    fn into_config(self) -> Result<TreemapConfig> {
        let mut config = match &self.config {
            Some(path) => TreemapConfig::from_file(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => TreemapConfig::default(),
        };
        if let Some(library) = self.library {
            config.library = library;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(fingerprint) = self.fingerprint {
            config.fingerprint = fingerprint;
        }
        if let Some(dimension) = self.dimension {
            config.dimension = dimension;
        }
        if let Some(descriptors) = self.descriptors {
            config.descriptors = descriptors;
        }
        if self.features.is_some() {
            config.features = self.features;
        }
        if self.matplotlib {
            config.render_mode = RenderMode::Static;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(neighbours) = self.neighbours {
            config.neighbours = neighbours;
        }
        if let Some(trees) = self.trees {
            config.trees = trees;
        }
        if self.strict {
            config.row_policy = RowPolicy::Strict;
        }
        Ok(config)
    }
}

fn list(toolbox: &Toolbox) {
    println!("fingerprints: {}", toolbox.fingerprints.list_available().join(", "));
    println!("descriptors: {}", toolbox.descriptors.list_available().join(", "));
}

fn main() -> Result<()> {
    let args = Args::parse();
    let toolbox = Toolbox::builtin();
    if args.list {
        list(&toolbox);
        return Ok(());
    }

    let log_level = args.log_level.clone();
    let config = args.into_config()?;
    config.validate(&toolbox).context("invalid arguments")?;

    std::fs::create_dir_all(&config.output)
        .with_context(|| format!("failed to create output directory {}", config.output.display()))?;
    init_logging_with_file(&log_level, &config.output.join(LOG_FILE))?;

    match draw_tmap(&config, &toolbox) {
        Ok(summary) => {
            println!(
                "{} compounds drawn to {} ({} skipped)",
                summary.compounds,
                summary.render_path.display(),
                summary.skipped.len()
            );
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            Err(e).with_context(|| format!("failed to draw a tree map of {}", config.library.display()))
        }
    }
}
