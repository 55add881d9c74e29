/// One previously generated video available as a merge input.
///
/// Immutable once fetched; the merge pipeline only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipReference {
    pub id: String,
    pub source_url: String,
    /// Creation time as unix milliseconds, as reported by the service.
    pub created_at_ms: i64,
    /// The prompt the clip was generated from.
    pub prompt: String,
}

impl ClipReference {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        created_at_ms: i64,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            created_at_ms,
            prompt: prompt.into(),
        }
    }
}
