/// Errors from the generation chain.
///
/// The display text of each variant ends up in the failed job's message,
/// so it is phrased for end users.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The combined input exceeds the model's input ceiling.
    #[error("documents are too large to process")]
    InputTooLarge { tokens: u64, limit: u64 },

    /// The model call failed or returned nothing usable.
    #[error("{0}")]
    Upstream(String),

    /// The renderer failed to produce an artifact.
    #[error("{0}")]
    Render(String),
}

impl From<reqwest::Error> for GenerateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return GenerateError::Upstream("model request timed out".to_string());
        }
        GenerateError::Upstream(format!("model request failed: {e}"))
    }
}
