//!
//! A PKCS#12/PFX keystore library written in pure Rust, following the semantics of the Java `PKCS12` KeyStore.
//!
//! The [KeyStore] struct reads and writes PKCS#12 files and gives access to their entries. Three entry kinds
//! are supported: private keys with their certificate chain, secret keys and trusted certificates.
//! Each entry is accessed by a case-insensitive 'alias'.
//!
//! Keys stay encrypted inside the keystore, each one under its own password, and are decrypted on demand.
//! Certificates are encrypted as a whole with the store password, and the file is protected by a password-based MAC.
//! A keystore may also be stored without a password, in which case neither protection is applied.
//!
//! All certificates must be encoded in X.509 format. Private keys must be encoded in PKCS#8.
//!
//! Supported encryption schemes:
//!
//! * `PBEWithHmacSHA{1,224,256,384,512}AndAES_{128,256}` - PBES2, `PBEWithHmacSHA256AndAES_256` is the default
//! * `PBEWithSHA1AndDESede`, `PBEWithSHA1AndDESede2`, `PBEWithSHA1AndRC2_40`, `PBEWithSHA1AndRC2_128`,
//!   `PBEWithSHA1AndDES` - legacy encryption to support the existing stores (`pbes1` feature)
//!
//! Supported MAC algorithms: `HmacPBESHA1`, `HmacPBESHA224`, `HmacPBESHA256`, `HmacPBESHA384`, `HmacPBESHA512`
//!
//! Algorithm selection for new files is controlled by an [AlgorithmPolicy].
//!

mod attributes;
mod cert;
mod codec;
mod entry;
pub mod error;
mod keychain;
mod keystore;
mod mac;
mod oid;
mod pbe;
#[cfg(feature = "pbes1")]
mod pbes1;
pub mod policy;
pub mod secret;
mod store;

pub use rand;
use std::fmt;

/// Result type for keystore operations
pub type Result<T> = std::result::Result<T, error::Error>;

pub use attributes::Pkcs12Attribute;
pub use cert::Certificate;
pub use codec::{ImportPolicy, LoadReport};
pub use entry::EntryKind;
pub use keychain::{PrivateKey, PrivateKeyChain};
pub use keystore::{Key, KeyStore};
pub use policy::{AlgorithmPolicy, MAX_ITERATION_COUNT, NONE, PolicyOverrides, Purpose};

/// Wrapper for the local key id
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LocalKeyId(pub Vec<u8>);

impl From<Vec<u8>> for LocalKeyId {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for LocalKeyId {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl AsRef<[u8]> for LocalKeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for LocalKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalKeyId").field(&hex::encode(&self.0)).finish()
    }
}
