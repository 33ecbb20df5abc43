//! Thin clients for the hosted language-model APIs used to translate and
//! restructure news articles, behind one provider trait.

pub mod anthropic;
pub mod mistral;
mod rewrite;

pub use anthropic::AnthropicClient;
pub use mistral::MistralClient;
pub use rewrite::{ArticleRewriter, RewriteRequest, RewrittenArticle};
