pub type NetreelResult<T> = Result<T, NetreelError>;

#[derive(thiserror::Error, Debug)]
pub enum NetreelError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("unsupported time format: {0}")]
    UnsupportedTimeFormat(String),

    #[error("unsupported time representation: {0}")]
    UnsupportedTimeRepresentation(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("layout error: {0}")]
    Layout(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NetreelError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(NetreelError::schema("x").to_string().contains("schema error:"));
        assert!(NetreelError::layout("x").to_string().contains("layout error:"));
        assert!(NetreelError::render("x").to_string().contains("render error:"));
        assert!(
            NetreelError::UnsupportedMode("static".into())
                .to_string()
                .contains("unsupported mode:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = NetreelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
