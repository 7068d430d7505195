use thiserror::Error;

pub type Result<T> = core::result::Result<T, KeyError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid word {word:?} at position {position}")]
    InvalidWord { word: String, position: usize },
    #[error("Checksum mismatch")]
    InvalidChecksum,
    /// IL of the master HMAC was zero or not below the curve order.
    #[error("Derived master key is outside the curve order")]
    InvalidMasterKey,
    #[error("Child key at index {0} is invalid")]
    InvalidChildKey(u32),
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<bs58::decode::Error> for KeyError {
    fn from(e: bs58::decode::Error) -> Self {
        KeyError::EncodingError(format!("base58: {e}"))
    }
}

impl From<ssh_key::Error> for KeyError {
    fn from(e: ssh_key::Error) -> Self {
        KeyError::EncodingError(format!("openssh: {e}"))
    }
}
