//! The `platter bundle` command for checking artifact bundles.

use anyhow::Context;
use clap::{Args, Subcommand};
use platter_core::{BundleManifest, Config, InferenceContext};
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the `bundle` command.
#[derive(Args, Debug)]
pub struct BundleArgs {
    #[command(subcommand)]
    pub command: BundleCommand,
}

/// Subcommands for bundle inspection.
#[derive(Subcommand, Debug)]
pub enum BundleCommand {
    /// Load every artifact, cross-check shapes, and replay golden tensors
    Verify {
        /// Artifact bundle directory (overrides general.bundle_dir)
        #[arg(long, env = "PLATTER_BUNDLE")]
        bundle: Option<PathBuf>,
    },
}

/// Summary printed after a successful verification.
#[derive(Debug, Serialize)]
struct VerifySummary {
    bundle: PathBuf,
    images: usize,
    embedding_dim: usize,
    index_dim: usize,
    golden_checked: usize,
}

/// Execute the bundle command.
pub async fn execute(config: Config, args: BundleArgs) -> anyhow::Result<()> {
    match args.command {
        BundleCommand::Verify { bundle } => {
            let dir = bundle.unwrap_or_else(|| config.bundle_dir());
            verify(dir, config).await
        }
    }
}

async fn verify(dir: PathBuf, config: Config) -> anyhow::Result<()> {
    let limits = config.limits.clone();
    let bundle_dir = dir.clone();
    let (context, reports) = tokio::task::spawn_blocking(move || {
        let manifest = BundleManifest::load(&bundle_dir)?;
        let context = InferenceContext::load_manifest(&bundle_dir, &manifest, limits)?;
        let reports = context.verify_golden(&bundle_dir, &manifest)?;
        Ok::<_, platter_core::ArtifactError>((context, reports))
    })
    .await?
    .with_context(|| format!("Bundle at {:?} failed to load", dir))?;

    let failed: Vec<_> = reports.iter().filter(|r| !r.passed).collect();
    for report in &failed {
        tracing::error!(
            "Golden tensor mismatch for {:?}: max diff {:.3e} > {:.1e}",
            report.image,
            report.max_abs_diff,
            report.tolerance
        );
    }
    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} golden tensors differ from this build's preprocessing",
            failed.len(),
            reports.len()
        );
    }
    if reports.is_empty() {
        tracing::warn!("Bundle declares no golden tensors; preprocessing drift is unchecked");
    }

    let summary = VerifySummary {
        bundle: dir,
        images: context.catalog().len(),
        embedding_dim: context.embedder().dimension(),
        index_dim: context.index().dimension(),
        golden_checked: reports.len(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
