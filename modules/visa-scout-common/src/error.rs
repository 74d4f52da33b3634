use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    /// The sponsor registry could not be read or yielded nothing to work on.
    /// Fatal: the run aborts before any network activity.
    #[error("Sponsor registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Seen store error: {0}")]
    SeenStore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
