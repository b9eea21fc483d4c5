//! The `platter search` command.

use anyhow::Context;
use clap::{Args, ValueEnum};
use platter_core::{Config, OutputFormat as CoreOutputFormat, OutputWriter, Platter, RecipeBook};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array of results
    Json,
    /// One result object per line
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// Arguments for the `search` command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query image (any format the decoder sniffs: JPEG, PNG, WebP, ...)
    #[arg(required = true)]
    pub image: PathBuf,

    /// Number of results (defaults to search.default_k)
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Artifact bundle directory (overrides general.bundle_dir)
    #[arg(long, env = "PLATTER_BUNDLE")]
    pub bundle: Option<PathBuf>,

    /// JSON-lines recipe table (overrides recipes.table)
    #[arg(long)]
    pub recipes: Option<PathBuf>,

    /// Output format (defaults to output.format)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(mut config: Config, args: &SearchArgs) -> Config {
    if let Some(ref bundle) = args.bundle {
        config.general.bundle_dir = bundle.clone();
    }
    if let Some(ref recipes) = args.recipes {
        config.recipes.table = Some(recipes.clone());
    }
    config
}

fn output_format(config: &Config, args: &SearchArgs) -> CoreOutputFormat {
    args.format
        .map(CoreOutputFormat::from)
        .or_else(|| CoreOutputFormat::parse(&config.output.format))
        .unwrap_or_default()
}

/// Execute the search command.
pub async fn execute(config: Config, args: SearchArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Cannot read query image {:?}", args.image))?;

    let config = apply_overrides(config, &args);
    let format = output_format(&config, &args);
    let pretty = config.output.pretty;

    tracing::info!("Loading bundle from {:?}", config.bundle_dir());
    let platter = Platter::new(config).await?;
    if let Some(book) = platter.recipes() {
        log_recipe_coverage(book, platter.context().catalog().len());
    }

    let start = std::time::Instant::now();
    let results = platter.search(bytes, args.k).await?;
    tracing::info!("{} result(s) in {:?}", results.len(), start.elapsed());

    let sink: Box<dyn Write> = match args.output {
        Some(ref path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, format, pretty);
    writer.write_all(&results)?;
    writer.flush()?;

    if let Some(ref path) = args.output {
        tracing::info!("Output written to {:?}", path);
    }
    Ok(())
}

fn log_recipe_coverage(book: &RecipeBook, catalog_len: usize) {
    tracing::debug!(
        "Recipe table has {} dishes for {} catalog images",
        book.len(),
        catalog_len
    );
}
