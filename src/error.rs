use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostingsError {
    #[error("corrupt index ({resource}): {message}")]
    Corrupt { message: String, resource: String },
    #[error("index-time block size ({index}) does not match read-time block size ({expected})")]
    BlockSizeMismatch { index: u32, expected: u32 },
    #[error("unsupported {codec} format version {version}, expected {min}..={max}")]
    UnsupportedVersion {
        codec: String,
        version: i32,
        min: i32,
        max: i32,
    },
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PostingsError {
    pub fn corrupt(message: impl Into<String>, resource: impl std::fmt::Display) -> Self {
        PostingsError::Corrupt {
            message: message.into(),
            resource: resource.to_string(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        PostingsError::IllegalState(message.into())
    }

    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            PostingsError::Corrupt { .. } | PostingsError::BlockSizeMismatch { .. }
        )
    }
}

pub type Result<T, E = PostingsError> = std::result::Result<T, E>;
