pub mod config;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use config::Config;
pub use error::ScoutError;
pub use fingerprint::{fingerprint, normalize_posting_url, PostingFingerprint};
pub use types::*;
