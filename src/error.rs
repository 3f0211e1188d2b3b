/// Validation failures the operator can fix by changing an argument,
/// the configuration, or the environment.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Invalid {kind} '{value}'. Choose from: {allowed}")]
    InvalidChoice {
        kind: &'static str,
        value: String,
        allowed: &'static str,
    },

    #[error("{0}")]
    OutOfRange(String),

    #[error("Actor '{0}' not found")]
    UnknownActor(String),

    #[error("No unit price configured for service '{0}'")]
    UnknownService(String),

    #[error("{0} not found in environment or .env file")]
    MissingCredential(&'static str),

    #[error("Audio is {seconds:.1}s but {engine} accepts at most {max:.0}s")]
    DurationCap {
        engine: String,
        seconds: f64,
        max: f64,
    },

    #[error("{0} engine not implemented yet")]
    EngineUnavailable(String),

    #[error("File not found: {0}")]
    MissingFile(String),
}

impl StudioError {
    pub(crate) fn missing_file(path: &std::path::Path) -> Self {
        StudioError::MissingFile(path.display().to_string())
    }
}
