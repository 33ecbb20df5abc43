//! Artifact maintenance: scrub leaked prompt-instruction fragments out of
//! every text field and re-translate articles whose French side never got
//! generated. Runs clean-only when no language-model key is configured.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};

use llm_client::{ArticleRewriter, RewriteRequest, RewrittenArticle};
use veille_common::{NewsArticle, NewsFile};

/// Instruction fragments the summarization prompt has been seen leaking
/// into published articles.
static LEAK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\[Contexte\s*:[^\]]*\]",
        r"(?i)\[Context\s*:[^\]]*\]",
        r"(?i)\[Conclusion\s*:[^\]]*\]",
        r"(?i)\[Fait important \d+\]",
        r"(?i)\[Key fact \d+\]",
        r"(?i)\[[^\]]*phrases qui expliquent[^\]]*\]",
        r"(?i)\[[^\]]*sentences explaining[^\]]*\]",
        r"(?i)\[[^\]]*implications[^\]]*\]",
        r"(?i)\[[^\]]*what this changes[^\]]*\]",
        r"(?m)^\[[^\]]*\][ \t]*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid leak pattern"))
    .collect()
});

static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Remove leaked prompt-instruction fragments from one text field.
pub fn scrub_leaks(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in LEAK_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    EXTRA_BLANK_LINES
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}

/// An article whose French title is still the English title was never
/// translated.
pub fn needs_translation(article: &NewsArticle) -> bool {
    !article.title.is_empty() && article.title == article.title_en
}

/// Scrub every text field in place without rewriting.
pub fn clean_article(article: &mut NewsArticle) {
    article.title = scrub_leaks(&article.title);
    article.title_en = scrub_leaks(&article.title_en);
    article.summary = scrub_leaks(&article.summary);
    article.summary_en = scrub_leaks(&article.summary_en);
    article.long_summary = scrub_leaks(&article.long_summary);
    article.long_summary_en = scrub_leaks(&article.long_summary_en);
}

fn apply_rewrite(article: &mut NewsArticle, rewritten: &RewrittenArticle) {
    fn put(target: &mut String, replacement: &str) {
        if !replacement.is_empty() {
            *target = scrub_leaks(replacement);
        } else {
            *target = scrub_leaks(target);
        }
    }
    put(&mut article.title, &rewritten.title);
    put(&mut article.title_en, &rewritten.title_en);
    put(&mut article.summary, &rewritten.summary);
    put(&mut article.summary_en, &rewritten.summary_en);
    put(&mut article.long_summary, &rewritten.long_summary);
    put(&mut article.long_summary_en, &rewritten.long_summary_en);
}

#[derive(Debug, Default)]
pub struct RegenStats {
    pub articles: u32,
    pub rewritten: u32,
    pub cleaned: u32,
    pub rewrite_failures: u32,
}

impl std::fmt::Display for RegenStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "articles={} rewritten={} cleaned={} rewrite_failures={}",
            self.articles, self.rewritten, self.cleaned, self.rewrite_failures
        )
    }
}

/// Clean the whole artifact in place, rewriting untranslated articles when a
/// rewriter is available. Articles whose rewrite fails are cleaned instead.
pub async fn regenerate(
    artifact_path: &Path,
    rewriter: Option<&dyn ArticleRewriter>,
) -> Result<RegenStats> {
    let mut file = NewsFile::load(artifact_path)?;
    let mut stats = RegenStats::default();

    match rewriter {
        Some(rewriter) => info!(provider = rewriter.name(), "Regenerating artifact"),
        None => info!("No LLM key configured, cleaning only"),
    }

    for article in file.articles_mut() {
        stats.articles += 1;

        if needs_translation(article) {
            if let Some(rewriter) = rewriter {
                let request = RewriteRequest {
                    title_en: pick(&article.title_en, &article.title),
                    summary_en: pick(&article.summary_en, &article.summary),
                };
                match rewriter.rewrite(&request).await {
                    Ok(rewritten) => {
                        apply_rewrite(article, &rewritten);
                        stats.rewritten += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(title = %request.title_en, error = %e, "Rewrite failed, cleaning instead");
                        stats.rewrite_failures += 1;
                    }
                }
            }
        }

        clean_article(article);
        stats.cleaned += 1;
    }

    file.last_update = Utc::now().format("%d %B %Y - %H:%M").to_string();
    file.save(artifact_path)?;
    info!(path = %artifact_path.display(), %stats, "Artifact saved");

    Ok(stats)
}

fn pick(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn scrubs_bracketed_instruction_fragments() {
        let text = "[Contexte: 1-2 phrases] OpenAI lance un nouveau modèle.\n\n[Conclusion: implications]";
        let cleaned = scrub_leaks(text);
        assert_eq!(cleaned, "OpenAI lance un nouveau modèle.");
    }

    #[test]
    fn scrubs_lines_that_are_only_a_bracket_fragment() {
        let text = "Premier point.\n[Fait important 2]\nDeuxième point.";
        let cleaned = scrub_leaks(text);
        assert!(!cleaned.contains("Fait important"));
        assert!(cleaned.contains("Premier point."));
        assert!(cleaned.contains("Deuxième point."));
    }

    #[test]
    fn collapses_extra_blank_lines() {
        let cleaned = scrub_leaks("a\n\n\n\nb");
        assert_eq!(cleaned, "a\n\nb");
    }

    #[test]
    fn keeps_legitimate_bracketless_text() {
        let text = "Mistral lève 600 M€ pour ses modèles ouverts.";
        assert_eq!(scrub_leaks(text), text);
    }

    #[test]
    fn untranslated_article_is_detected() {
        let article = NewsArticle {
            title: "An AI breakthrough".to_string(),
            title_en: "An AI breakthrough".to_string(),
            ..Default::default()
        };
        assert!(needs_translation(&article));
    }

    #[test]
    fn translated_article_is_left_alone() {
        let article = NewsArticle {
            title: "Une percée en IA".to_string(),
            title_en: "An AI breakthrough".to_string(),
            ..Default::default()
        };
        assert!(!needs_translation(&article));
    }

    struct StubRewriter;

    #[async_trait]
    impl ArticleRewriter for StubRewriter {
        async fn rewrite(&self, request: &RewriteRequest) -> Result<RewrittenArticle> {
            Ok(RewrittenArticle {
                title: format!("FR: {}", request.title_en),
                summary: "Résumé.".to_string(),
                ..Default::default()
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn artifact_with(article: NewsArticle) -> NewsFile {
        let mut file = NewsFile::default();
        file.categories.insert("general".to_string(), vec![article]);
        file
    }

    #[tokio::test]
    async fn rewrites_untranslated_articles_and_stamps_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");
        artifact_with(NewsArticle {
            title: "An AI breakthrough".to_string(),
            title_en: "An AI breakthrough".to_string(),
            summary_en: "Something happened.".to_string(),
            ..Default::default()
        })
        .save(&path)
        .unwrap();

        let stats = regenerate(&path, Some(&StubRewriter)).await.unwrap();
        assert_eq!(stats.rewritten, 1);
        assert_eq!(stats.cleaned, 0);

        let file = NewsFile::load(&path).unwrap();
        let article = &file.categories["general"][0];
        assert_eq!(article.title, "FR: An AI breakthrough");
        // Empty rewrite fields keep the existing value.
        assert_eq!(article.title_en, "An AI breakthrough");
        assert!(!file.last_update.is_empty());
    }

    #[tokio::test]
    async fn clean_only_mode_scrubs_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");
        artifact_with(NewsArticle {
            title: "Une percée".to_string(),
            title_en: "A breakthrough".to_string(),
            long_summary: "[Contexte: phrases] Le contexte réel.".to_string(),
            ..Default::default()
        })
        .save(&path)
        .unwrap();

        let stats = regenerate(&path, None).await.unwrap();
        assert_eq!(stats.cleaned, 1);
        assert_eq!(stats.rewritten, 0);

        let file = NewsFile::load(&path).unwrap();
        assert_eq!(
            file.categories["general"][0].long_summary,
            "Le contexte réel."
        );
    }
}
