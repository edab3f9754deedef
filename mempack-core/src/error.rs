use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemPackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("corruption detected in block {block_id}: {detail}")]
    Corruption { block_id: u32, detail: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("embedding error: {0}")]
    Embed(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MemPackError {
    pub fn format<S: Into<String>>(msg: S) -> Self {
        MemPackError::Format(msg.into())
    }

    pub fn corruption<S: Into<String>>(block_id: u32, detail: S) -> Self {
        MemPackError::Corruption {
            block_id,
            detail: detail.into(),
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        MemPackError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MemPackError>;
