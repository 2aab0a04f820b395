use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PublishError {
    #[error("SDG API request failed: {0}")]
    SdgApiHttp(String),

    #[error("SDG API returned status {status}: {message}")]
    SdgApiStatus { status: u16, message: String },

    #[error("failed to parse SDG goal tree: {0}")]
    SdgApiParse(String),

    #[error("display metadata request failed: {0}")]
    DisplayMetadataHttp(String),

    #[error("display metadata returned status {status}: {message}")]
    DisplayMetadataStatus { status: u16, message: String },

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("catalog rejected the call: {0}")]
    CatalogApi(String),

    #[error("sign-in failed for {username}: {message}")]
    Authentication { username: String, message: String },

    #[error("analyze failed for item {item_id}: {message}")]
    Analyze { item_id: String, message: String },

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("missing catalog credentials (set username/password in the config file or SDG_CATALOG_USERNAME/SDG_CATALOG_PASSWORD)")]
    MissingCredentials,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
