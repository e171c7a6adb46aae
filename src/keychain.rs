//! Private keys recovered from key bags and the chains they are stored with

use std::fmt;

use der::oid::ObjectIdentifier;
use pkcs8::PrivateKeyInfo;
use zeroize::Zeroizing;

use crate::{LocalKeyId, Result, cert::Certificate, error::Error};

/// Unencrypted PKCS#8 `PrivateKeyInfo`, wiped on drop
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub(crate) data: Zeroizing<Vec<u8>>,
    pub(crate) oid: ObjectIdentifier,
}

impl PrivateKey {
    /// Wrap a DER `PrivateKeyInfo`; anything else is [Error::InvalidPrivateKey]
    pub fn from_der(data: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(data).map_err(|_| Error::InvalidPrivateKey)?;
        let oid = info.algorithm.oid;

        Ok(Self {
            data: Zeroizing::new(data.to_vec()),
            oid,
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.data
    }

    /// Key algorithm from the `privateKeyAlgorithm` field
    pub fn oid(&self) -> &ObjectIdentifier {
        &self.oid
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("algorithm", &self.oid).finish_non_exhaustive()
    }
}

/// Key entry contents: the key, its local key id and the chain it was stored with
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyChain {
    pub(crate) key: PrivateKey,
    pub(crate) local_key_id: LocalKeyId,
    pub(crate) certs: Vec<Certificate>,
}

impl PrivateKeyChain {
    pub fn key(&self) -> &PrivateKey {
        &self.key
    }

    /// Chain ordered from the end entity towards the root, empty for an unchained key
    pub fn certs(&self) -> &[Certificate] {
        &self.certs
    }

    /// End entity certificate of the chain
    pub fn leaf(&self) -> Option<&Certificate> {
        self.certs.first()
    }

    /// Value of the `localKeyId` attribute written for this entry
    pub fn local_key_id(&self) -> &LocalKeyId {
        &self.local_key_id
    }
}

impl fmt::Debug for PrivateKeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subjects = self.certs.iter().map(Certificate::subject).collect::<Vec<_>>();
        f.debug_struct("PrivateKeyChain")
            .field("key", &self.key)
            .field("local_key_id", &hex::encode(&self.local_key_id))
            .field("chain", &subjects)
            .finish()
    }
}
