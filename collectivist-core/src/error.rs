/// Top-level Collectivist error type.
#[derive(thiserror::Error, Debug)]
pub enum CollectivistError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Scanner error: {0}")]
    Scanner(#[from] ScannerError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Describer error: {0}")]
    Describer(#[from] DescriberError),

    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No scanner registered for collection_type: {0}")]
    UnknownScannerType(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error (status {status}): {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ScannerError {
    #[error("Scanner '{scanner}' failed: {message}")]
    Failed { scanner: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("No scanner registered for detected type: {0}")]
    NoScannerForType(String),

    #[error("Failed to inspect directory: {0}")]
    InspectionIo(String),

    #[error("Failed to write collection config: {0}")]
    EmitIo(String),

    #[error("collection.yaml already exists at {0}; pass force=true to overwrite")]
    AlreadyInitialized(String),
}

#[derive(thiserror::Error, Debug)]
pub enum DescriberError {
    #[error("Failed to persist index during describe: {0}")]
    PersistIo(String),
}

#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("Failed to read index: {0}")]
    Read(String),

    #[error("Failed to write index: {0}")]
    Write(String),

    #[error("Malformed index document: {0}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Unknown renderer: {0}")]
    UnknownFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum PlacementError {
    #[error("Target path already exists: {0}")]
    TargetExists(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),
}

pub type Result<T> = std::result::Result<T, CollectivistError>;
