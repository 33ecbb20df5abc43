//! Serde model of the news artifact (`news.json`).
//!
//! The deploy pipeline only reads this for a sanity check; the `regenerate`
//! command rewrites it in place. Field names follow the artifact's wire
//! format, which the front-end site consumes as-is.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VeilleError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsFile {
    #[serde(rename = "lastUpdate", default)]
    pub last_update: String,

    /// Articles per category (`general`, `image`, `video`, `llm`, `audio`).
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<NewsArticle>>,

    #[serde(rename = "hotNews", default)]
    pub hot_news: Vec<HotNewsEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticle {
    /// French title. Equal to `title_en` when translation never happened.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_en: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub summary_en: String,
    #[serde(default)]
    pub long_summary: String,
    #[serde(default)]
    pub long_summary_en: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotNewsEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_en: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
}

impl NewsFile {
    pub fn load(path: &Path) -> Result<Self, VeilleError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VeilleError::Artifact(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            VeilleError::Artifact(format!("cannot parse {}: {e}", path.display()))
        })
    }

    /// Write pretty-printed, the way the original artifact is published.
    pub fn save(&self, path: &Path) -> Result<(), VeilleError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            VeilleError::Artifact(format!("cannot serialize artifact: {e}"))
        })?;
        std::fs::write(path, json).map_err(|e| {
            VeilleError::Artifact(format!("cannot write {}: {e}", path.display()))
        })
    }

    pub fn article_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn articles_mut(&mut self) -> impl Iterator<Item = &mut NewsArticle> + '_ {
        self.categories.values_mut().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_published_artifact_shape() {
        let raw = r#"{
            "lastUpdate": "13 February 2026 - 08:01",
            "categories": {
                "general": [{
                    "title": "Une percee en IA",
                    "title_en": "An AI breakthrough",
                    "summary": "Resume court.",
                    "summary_en": "Short summary.",
                    "long_summary": "Contexte.",
                    "long_summary_en": "Context.",
                    "image": "",
                    "source": "TechCrunch",
                    "url": "https://example.com/a",
                    "date": "13 February 2026"
                }],
                "llm": []
            },
            "hotNews": [{
                "title": "Une percee en IA",
                "title_en": "An AI breakthrough",
                "source": "TechCrunch",
                "url": "https://example.com/a",
                "date": "13 February 2026"
            }]
        }"#;

        let file: NewsFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.article_count(), 1);
        assert_eq!(file.hot_news.len(), 1);
        assert_eq!(file.categories["general"][0].source, "TechCrunch");
    }

    #[test]
    fn tolerates_empty_or_partial_files() {
        let file: NewsFile = serde_json::from_str("{}").unwrap();
        assert_eq!(file.article_count(), 0);
        assert!(file.last_update.is_empty());
    }

    #[test]
    fn pub_date_absent_is_not_serialized() {
        let article = NewsArticle::default();
        let json = serde_json::to_string(&article).unwrap();
        assert!(!json.contains("pub_date"));
    }
}
