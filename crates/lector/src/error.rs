#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Index build failed: {0}")]
    Cache(String),

    #[error("No target document: pass a path or open one first")]
    NoTarget,

    #[error("Session error: {0}")]
    Session(String),
}
