use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling a pattern file. Any of these aborts the whole
/// compilation; no partial pattern set is returned.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: unknown namespace prefix '{prefix}'")]
    UnknownNamespace { prefix: String, line: usize },

    #[error("line {line}: unknown variable '{name}'")]
    UnknownVariable { name: String, line: usize },

    #[error("line {line}: namespace prefix '{prefix}' is already declared")]
    DuplicateNamespace { prefix: String, line: usize },

    #[error("namespace '{prefix}' (<{root}>) overlaps the variable identifier base <{base}>")]
    NamespaceCollision { prefix: String, root: String, base: String },

    #[error("line {line}: condition opened inside an unterminated block (missing blank line?)")]
    NestedCondition { line: usize },

    #[error("line {line}: condition declares no template keys")]
    EmptyCondition { line: usize },

    #[error("failed to read pattern file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading answer or question-template sources.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {what} from {path}")]
    Io {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {what}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} cannot be given as {given}")]
    UnsupportedSource { what: &'static str, given: &'static str },
}

/// Errors raised by a graph build. Everything is local to one build call.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("statement [{statement}] cannot be expressed as RDF: {reason}")]
    NotRdf { statement: String, reason: &'static str },

    #[error("failed to serialize graph as {format}")]
    Serialization {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors raised by the JSON document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown store index '{0}'")]
    UnknownIndex(String),

    #[error("document id '{0}' cannot be used as a file name")]
    InvalidId(String),

    #[error("store I/O failed on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON document at {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to walk index folder")]
    Walk(#[from] walkdir::Error),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
pub type GraphResult<T> = std::result::Result<T, GraphError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
