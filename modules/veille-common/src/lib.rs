pub mod config;
pub mod error;
pub mod news;
pub mod secrets;

pub use config::DeployConfig;
pub use error::VeilleError;
pub use news::{HotNewsEntry, NewsArticle, NewsFile};
pub use secrets::{CredentialSource, Secret};
