use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::secrets::CredentialSource;

/// Deploy pipeline configuration. Loaded from environment variables in
/// production; every field is plain data so tests construct it directly.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Checkout the artifact lives in. All git commands run here, and the
    /// scrape subprocess uses it as its working directory.
    pub repo_dir: PathBuf,

    /// Artifact path, relative to `repo_dir`.
    pub artifact_path: PathBuf,

    /// Scrape command and arguments (whitespace-split, no shell quoting).
    pub scraper_command: Vec<String>,

    /// Wall-clock bound on the scrape subprocess. `None` disables the bound.
    pub scrape_timeout: Option<Duration>,

    /// Commit message template; `{timestamp}` is replaced at commit time.
    pub commit_message_template: String,

    /// Push remote template; `{token}` is replaced with the resolved push
    /// token each run. May also be a plain remote with no placeholder.
    pub push_remote_template: String,

    /// Directory run logs are written to. Never rotated or pruned.
    pub run_log_dir: PathBuf,

    // Credentials
    pub push_token: CredentialSource,
    pub anthropic_api_key: CredentialSource,
    pub mistral_api_key: CredentialSource,
}

pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_COMMIT_TEMPLATE: &str = "Auto-update news {timestamp}";

impl DeployConfig {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let timeout_secs: u64 = env::var("VEILLE_SCRAPE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_SCRAPE_TIMEOUT_SECS.to_string())
            .parse()
            .expect("VEILLE_SCRAPE_TIMEOUT_SECS must be a number");

        Self {
            repo_dir: PathBuf::from(env_or("VEILLE_REPO_DIR", ".")),
            artifact_path: PathBuf::from(env_or("VEILLE_ARTIFACT", "news.json")),
            scraper_command: split_command(&env_or(
                "VEILLE_SCRAPER_CMD",
                "python3 scraper/news_scraper.py",
            )),
            scrape_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            commit_message_template: env_or("VEILLE_COMMIT_TEMPLATE", DEFAULT_COMMIT_TEMPLATE),
            push_remote_template: required_env("VEILLE_PUSH_REMOTE"),
            run_log_dir: PathBuf::from(env_or("VEILLE_RUN_LOG_DIR", "data/deploy-runs")),
            push_token: CredentialSource::from_env_pair("GIT_PUSH_TOKEN"),
            anthropic_api_key: CredentialSource::from_env_pair("ANTHROPIC_API_KEY"),
            mistral_api_key: CredentialSource::from_env_pair("MISTRAL_API_KEY"),
        }
    }

    /// Absolute artifact path.
    pub fn artifact_abs(&self) -> PathBuf {
        self.repo_dir.join(&self.artifact_path)
    }

    /// Log the effective configuration. Credentials are logged as their
    /// source description, never their value.
    pub fn log_redacted(&self) {
        info!(
            repo_dir = %self.repo_dir.display(),
            artifact = %self.artifact_path.display(),
            scraper = %self.scraper_command.join(" "),
            timeout_secs = self.scrape_timeout.map(|d| d.as_secs()).unwrap_or(0),
            push_remote = %self.push_remote_template,
            push_token = %self.push_token.describe(),
            anthropic_api_key = %self.anthropic_api_key.describe(),
            mistral_api_key = %self.mistral_api_key.describe(),
            "Configuration loaded"
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_scraper_command_on_whitespace() {
        let parts = split_command("python3  scraper/news_scraper.py --full");
        assert_eq!(parts, vec!["python3", "scraper/news_scraper.py", "--full"]);
    }

    #[test]
    fn artifact_abs_joins_repo_dir() {
        let config = DeployConfig {
            repo_dir: PathBuf::from("/srv/site"),
            artifact_path: PathBuf::from("news.json"),
            scraper_command: vec!["true".to_string()],
            scrape_timeout: None,
            commit_message_template: DEFAULT_COMMIT_TEMPLATE.to_string(),
            push_remote_template: "origin".to_string(),
            run_log_dir: PathBuf::from("data/deploy-runs"),
            push_token: CredentialSource::None,
            anthropic_api_key: CredentialSource::None,
            mistral_api_key: CredentialSource::None,
        };
        assert_eq!(config.artifact_abs(), PathBuf::from("/srv/site/news.json"));
    }
}
