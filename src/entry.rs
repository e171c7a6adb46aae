use std::time::{Duration, SystemTime, UNIX_EPOCH};

use der::asn1::ObjectIdentifier;

use crate::{
    attributes::{BagAttributes, Pkcs12Attribute},
    cert::Certificate,
};

const TIME_KEY_ID_PREFIX: &str = "Time ";

/// Kind of a keystore entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Encrypted private key with an optional certificate chain
    PrivateKey,
    /// Encrypted secret key
    SecretKey,
    /// Trusted certificate
    Certificate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryData {
    PrivateKey {
        /// DER-encoded EncryptedPrivateKeyInfo
        protected_key: Vec<u8>,
        /// Leaf first, root last; empty until matched on load
        chain: Vec<Certificate>,
    },
    SecretKey {
        /// DER-encoded EncryptedPrivateKeyInfo wrapping the raw key
        protected_key: Vec<u8>,
    },
    Certificate {
        cert: Certificate,
        trusted_usage: Vec<ObjectIdentifier>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub alias: String,
    pub created: SystemTime,
    pub key_id: Option<Vec<u8>>,
    pub attributes: Vec<Pkcs12Attribute>,
    pub data: EntryData,
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self.data {
            EntryData::PrivateKey { .. } => EntryKind::PrivateKey,
            EntryData::SecretKey { .. } => EntryKind::SecretKey,
            EntryData::Certificate { .. } => EntryKind::Certificate,
        }
    }

    pub fn is_key(&self) -> bool {
        !matches!(self.data, EntryData::Certificate { .. })
    }

    /// The trusted certificate, or the leaf of a private key chain
    pub fn certificate(&self) -> Option<&Certificate> {
        match &self.data {
            EntryData::PrivateKey { chain, .. } => chain.first(),
            EntryData::SecretKey { .. } => None,
            EntryData::Certificate { cert, .. } => Some(cert),
        }
    }

    /// Number of certificates this entry contributes to the file
    pub fn certificate_count(&self) -> usize {
        match &self.data {
            EntryData::PrivateKey { chain, .. } => chain.len(),
            EntryData::SecretKey { .. } => 0,
            EntryData::Certificate { .. } => 1,
        }
    }

    pub fn protected_key(&self) -> Option<&[u8]> {
        match &self.data {
            EntryData::PrivateKey { protected_key, .. } | EntryData::SecretKey { protected_key } => {
                Some(protected_key)
            }
            EntryData::Certificate { .. } => None,
        }
    }

    /// Bag attributes written for the entry's key bag or first certificate bag
    pub fn bag_attributes(&self) -> BagAttributes {
        BagAttributes {
            alias: Some(self.alias.clone()),
            key_id: self.key_id.clone(),
            trusted_usage: match &self.data {
                EntryData::Certificate { trusted_usage, .. } => Some(trusted_usage.clone()),
                _ => None,
            },
            extra: self.attributes.clone(),
        }
    }
}

/// `Time <millis since epoch>` local key id for freshly created entries
pub(crate) fn time_key_id(created: SystemTime) -> Vec<u8> {
    let millis = created.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    format!("{TIME_KEY_ID_PREFIX}{millis}").into_bytes()
}

/// Creation date encoded in a `Time <millis>` key id, if it is one
pub(crate) fn date_from_key_id(key_id: &[u8]) -> Option<SystemTime> {
    let text = std::str::from_utf8(key_id).ok()?;
    let millis: u64 = text.strip_prefix(TIME_KEY_ID_PREFIX)?.parse().ok()?;
    UNIX_EPOCH.checked_add(Duration::from_millis(millis))
}
