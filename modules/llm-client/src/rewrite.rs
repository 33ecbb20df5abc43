use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// One article to rewrite: the English side is the source of truth.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    pub title_en: String,
    pub summary_en: String,
}

/// Bilingual fields produced by the model. Fields the model omitted come
/// back empty; callers keep their existing value in that case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewrittenArticle {
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
}

#[async_trait]
pub trait ArticleRewriter: Send + Sync {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<RewrittenArticle>;
    fn name(&self) -> &str;
}

pub(crate) fn rewrite_prompt(request: &RewriteRequest) -> String {
    format!(
        r#"Tu es un journaliste tech. Traduis et restructure cet article pour un lectorat francophone.

TITRE: {title}
RÉSUMÉ: {summary}

Réponds uniquement avec un JSON valide, sans markdown:
{{
  "title": "titre accrocheur en français",
  "title_en": "English title, improved if needed",
  "summary": "résumé FR percutant (max 150 caractères)",
  "summary_en": "punchy EN summary (max 150 chars)",
  "long_summary": "contexte en 1-2 phrases, puis points clés avec •, puis conclusion",
  "long_summary_en": "context in 1-2 sentences, then key points with •, then conclusion"
}}

N'écris jamais d'instructions entre crochets. Écris directement le contenu."#,
        title = request.title_en,
        summary = request.summary_en,
    )
}

/// Models wrap JSON in markdown fences despite instructions. Strip them
/// before parsing strictly.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

pub(crate) fn parse_rewrite(raw: &str) -> Result<RewrittenArticle> {
    serde_json::from_str(strip_code_fences(raw)).context("LLM returned non-JSON rewrite output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        let raw = "```json\n{\"title\": \"Bonjour\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"title\": \"Bonjour\"}");
    }

    #[test]
    fn strips_bare_fences() {
        let raw = "```\n{}\n```";
        assert_eq!(strip_code_fences(raw), "{}");
    }

    #[test]
    fn leaves_plain_json_alone() {
        assert_eq!(strip_code_fences(" {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_rewrite_with_partial_fields() {
        let raw = "```json\n{\"title\": \"Une percée\", \"summary\": \"Court.\"}\n```";
        let article = parse_rewrite(raw).unwrap();
        assert_eq!(article.title, "Une percée");
        assert_eq!(article.summary, "Court.");
        assert!(article.long_summary.is_empty());
    }

    #[test]
    fn rejects_non_json_output() {
        assert!(parse_rewrite("Je ne peux pas répondre.").is_err());
    }

    #[test]
    fn prompt_carries_the_source_article() {
        let request = RewriteRequest {
            title_en: "An AI breakthrough".to_string(),
            summary_en: "Something happened.".to_string(),
        };
        let prompt = rewrite_prompt(&request);
        assert!(prompt.contains("An AI breakthrough"));
        assert!(prompt.contains("Something happened."));
    }
}
