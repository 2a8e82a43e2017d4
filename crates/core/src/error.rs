#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("failed to deserialize JSON: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),

    #[error("matchmaker protocol error: {0}")]
    Mme(#[from] mme::MmeError),
    #[error("a response has already been recorded for match request {0}")]
    ResponseAlreadyRecorded(uuid::Uuid),
    #[error("unknown remote server [{0}]")]
    UnknownServer(String),
    #[error("unknown local patient [{0}]")]
    UnknownPatient(String),
    #[error("similarity search failed: {0}")]
    Similarity(String),
    #[error("audit store failure: {0}")]
    Audit(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
