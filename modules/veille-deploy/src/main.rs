use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use llm_client::{AnthropicClient, ArticleRewriter, MistralClient};
use veille_common::DeployConfig;
use veille_deploy::pipeline::DeployPipeline;
use veille_deploy::regen;

#[derive(Parser)]
#[command(name = "veille")]
#[command(about = "News artifact deploy pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scrape-and-publish pipeline once
    Run,
    /// Clean and re-translate artifact summaries in place
    Regenerate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("veille_deploy=info".parse()?)
                .add_directive("veille_common=info".parse()?)
                .add_directive("llm_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = DeployConfig::from_env();
    config.log_redacted();

    match cli.command {
        Commands::Run => {
            let report = DeployPipeline::new(config).run().await;
            if report.failed_hard() {
                error!("Run failed: {report}");
            }
            // Failures are swallowed on purpose: the scheduler must never
            // see a non-zero exit from a degraded run.
            Ok(())
        }
        Commands::Regenerate => {
            let rewriter = build_rewriter(&config);
            let artifact = config.artifact_abs();
            let stats = regen::regenerate(&artifact, rewriter.as_deref()).await?;
            info!("Regeneration complete. {stats}");
            Ok(())
        }
    }
}

/// Pick a rewrite provider from whichever key resolves: Anthropic first,
/// Mistral as fallback, clean-only when neither is configured.
fn build_rewriter(config: &DeployConfig) -> Option<Box<dyn ArticleRewriter>> {
    match config.anthropic_api_key.resolve() {
        Ok(Some(key)) => return Some(Box::new(AnthropicClient::new(key.expose()))),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Anthropic key unreadable"),
    }
    match config.mistral_api_key.resolve() {
        Ok(Some(key)) => return Some(Box::new(MistralClient::new(key.expose()))),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Mistral key unreadable"),
    }
    None
}
