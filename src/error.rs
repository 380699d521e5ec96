use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to start browser session: {0}")]
    Connect(String),
    #[error("browser command failed: {0}")]
    Command(String),
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("unexpected script result: {0}")]
    ScriptResult(String),
    #[error("stale element handle {0}")]
    StaleElement(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<fantoccini::error::CmdError> for BrowserError {
    fn from(e: fantoccini::error::CmdError) -> Self {
        BrowserError::Command(e.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for BrowserError {
    fn from(e: fantoccini::error::NewSessionError) -> Self {
        BrowserError::Connect(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("failed to write raw listings: {0}")]
    Store(#[from] StoreError),
    #[error("invalid target url: {0}")]
    TargetUrl(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("row {row}: expected {expected} fields, found {found}")]
    MalformedRow {
        row: u64,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("row {row}: unparseable timestamp `{value}`")]
    Timestamp { row: usize, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}
