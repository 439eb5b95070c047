use std::fmt;

#[derive(Debug)]
pub enum HomologError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (threshold order, bad tolerance, unsafe abbreviation table).
    ConfigValidation(String),
    /// Evaluation month is not a `YYYY-MM` string naming a real month.
    InvalidMonth(String),
    /// Missing required column in a source file.
    MissingColumn { source: String, column: String },
    /// A cell could not be converted to the column's type.
    ValueParse {
        source: String,
        record_id: String,
        column: String,
        value: String,
    },
    /// A source has no configured file.
    MissingSource(String),
    /// Dedicated matcher thread pool could not be started.
    WorkerPool(String),
    /// IO error (file read, CSV framing, etc.).
    Io(String),
}

impl fmt::Display for HomologError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InvalidMonth(value) => {
                write!(f, "invalid evaluation month '{value}' (expected YYYY-MM)")
            }
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::ValueParse { source, record_id, column, value } => write!(
                f,
                "source '{source}', record '{record_id}': cannot parse {column} '{value}'"
            ),
            Self::MissingSource(source) => write!(f, "source '{source}' has no file configured"),
            Self::WorkerPool(msg) => write!(f, "worker pool error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for HomologError {}

impl From<std::io::Error> for HomologError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<csv::Error> for HomologError {
    fn from(e: csv::Error) -> Self {
        Self::Io(e.to_string())
    }
}
