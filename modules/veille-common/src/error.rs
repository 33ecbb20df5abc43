use thiserror::Error;

#[derive(Error, Debug)]
pub enum VeilleError {
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
