//! The `analyze` subcommand: fetch a profile, run the pipeline, print the
//! result and the credit charge the caller should bill.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;

use fitscore_core::{load_app_config, EnvSecrets};
use fitscore_engine::{
    to_credit_charge, AnalysisDepth, BusinessContext, EngineConfig, MemoryCache, ModelCatalog,
    Orchestrator, Profile, ProfileSource, ProfileSourceError, Verdict,
};

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Subject id; the profile is read from `<profiles-dir>/<subject>.json`.
    pub subject: String,

    /// Directory of normalized profile JSON files.
    #[arg(long, default_value = "./profiles")]
    pub profiles_dir: PathBuf,

    /// Path to the business context JSON file.
    #[arg(long, default_value = "./business.json")]
    pub business: PathBuf,

    /// Analysis depth: light, deep, or xray.
    #[arg(long, default_value = "deep")]
    pub depth: String,
}

/// Profile source backed by a directory of normalized JSON files. Stands in
/// for the scraping service this tool does not ship.
pub struct FileProfileSource {
    dir: PathBuf,
}

impl FileProfileSource {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ProfileSource for FileProfileSource {
    async fn fetch(
        &self,
        subject_id: &str,
        _depth: AnalysisDepth,
    ) -> Result<Profile, ProfileSourceError> {
        let path = self.dir.join(format!("{subject_id}.json"));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProfileSourceError::NotFound(subject_id.to_string())
            } else {
                ProfileSourceError::Source(format!("cannot read {}: {e}", path.display()))
            }
        })?;
        let profile: Profile = serde_json::from_str(&content)
            .map_err(|e| ProfileSourceError::Source(format!("malformed profile: {e}")))?;
        if profile.private {
            return Err(ProfileSourceError::PrivateOrRestricted(
                subject_id.to_string(),
            ));
        }
        Ok(profile)
    }
}

fn load_business(path: &Path) -> anyhow::Result<BusinessContext> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    let business = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("malformed business context: {e}"))?;
    Ok(business)
}

pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let depth: AnalysisDepth = args
        .depth
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let cfg = load_app_config()?;
    let catalog = Arc::new(ModelCatalog::load(&cfg.catalog_path)?);
    let orchestrator = Orchestrator::new(
        Arc::clone(&catalog),
        Arc::new(EnvSecrets),
        Arc::new(MemoryCache::new()),
        EngineConfig::from_app_config(&cfg),
    )?;

    let source = FileProfileSource::new(args.profiles_dir);
    let profile = source.fetch(&args.subject, depth).await?;
    let business = load_business(&args.business)?;

    let result = orchestrator.run_analysis(&profile, &business, depth).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    match result.verdict {
        Verdict::Success => {
            let total_tokens = result.cost.total_tokens_in + result.cost.total_tokens_out;
            let charge = to_credit_charge(
                depth,
                result.cost.total_cost_usd,
                total_tokens,
                catalog.billing(),
            );
            println!("suggested charge: {charge} credits");
            Ok(())
        }
        Verdict::Error => anyhow::bail!(
            "analysis failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
