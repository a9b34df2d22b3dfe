
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallboardError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Missing input: {0}")]
    MissingInput(String),
    #[error("Table error: {message}")]
    Table { message: String, file: String, line: usize },
    #[error("Output error: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, CallboardError>;

// Helper conversions
impl From<std::io::Error> for CallboardError {
    fn from(e: std::io::Error) -> Self { Self::Output(e.to_string()) }
}
impl From<config::ConfigError> for CallboardError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
