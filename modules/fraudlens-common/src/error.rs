use thiserror::Error;

#[derive(Error, Debug)]
pub enum FraudLensError {
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
