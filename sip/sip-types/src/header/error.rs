use super::name::Name;

/// Error returned when a typed header is read from [`Headers`](crate::Headers)
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("header {0} is missing")]
    Missing(Name),
    #[error("header {name} is malformed: {error}")]
    Malformed { name: Name, error: anyhow::Error },
}

impl HeaderError {
    pub fn missing(name: Name) -> Self {
        Self::Missing(name)
    }

    pub fn malformed(name: Name, error: anyhow::Error) -> Self {
        Self::Malformed { name, error }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}
