//!
//! [Error] enum definition
//!
use der::asn1::ObjectIdentifier;
use hmac::digest::MacError;
use x509_parser::error::X509Error;

/// Possible errors for keystore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed DER encoding: {0}")]
    MalformedEncoding(#[from] der::Error),

    #[error("Malformed PKCS#12 structure: {0}")]
    MalformedStructure(&'static str),

    #[error("Malformed bag attribute: {0}")]
    MalformedAttribute(String),

    #[error("Unsupported PFX version {0}, expected 3")]
    UnsupportedVersion(u32),

    #[error("Unsupported ContentType {0}")]
    UnsupportedContentType(ObjectIdentifier),

    #[error("PBE iteration count {0} exceeds the allowed maximum")]
    IterationCountTooLarge(u64),

    #[error("Integrity check failed: {0}")]
    IntegrityCheckFailed(#[source] Box<Error>),

    #[error("Algorithm not supported: {0}")]
    AlgorithmNotSupported(String),

    #[error("Unsupported key type")]
    UnsupportedKeyType,

    #[error("Unsupported certiticate type")]
    UnsupportedCertificateType,

    #[error("Certificate chain is not valid")]
    InvalidCertificateChain,

    #[error("Cannot overwrite key entry '{0}' with a certificate")]
    CannotOverwriteKeyEntry(String),

    #[error("Key cannot be recovered: {0}")]
    UnrecoverableKey(#[source] Box<Error>),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfiguration { key: String, value: String },

    #[error(transparent)]
    X509Error(#[from] x509_parser::nom::Err<X509Error>),

    #[error("Invalid length")]
    InvalidLength,

    #[error("Unpad error")]
    UnpadError,

    #[error("Invalid parameters")]
    InvalidParameters,

    #[error("{0}")]
    Pkcs5Error(String),

    #[error(transparent)]
    MacError(#[from] MacError),

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Random generation failed: {0}")]
    RandomGenerationError(String),
}

impl Error {
    /// Wraps a cryptographic failure as an integrity failure unless it already is one
    pub(crate) fn integrity(cause: Error) -> Self {
        match cause {
            e @ Error::IntegrityCheckFailed(_) => e,
            e @ Error::IterationCountTooLarge(_) => e,
            e => Error::IntegrityCheckFailed(Box::new(e)),
        }
    }
}
