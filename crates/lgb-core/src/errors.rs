/// Core error type for the link guard bot.
///
/// Adapter crates map their specific errors into this type so the moderation
/// core can tell fatal startup failures apart from per-call failures that are
/// logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
