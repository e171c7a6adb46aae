use std::{fmt, time::SystemTime};

use der::{Decode, Encode, asn1::ObjectIdentifier, asn1::OctetString};
use parking_lot::RwLock;
use pkcs12::pbe_params::EncryptedPrivateKeyInfo;
use tracing::debug;

use crate::{
    Result,
    attributes::Pkcs12Attribute,
    cert::Certificate,
    codec::{self, ImportPolicy, LoadReport, NUL_PASSWORD, Protection},
    entry::{Entry, EntryData, EntryKind, time_key_id},
    error::Error,
    keychain::{PrivateKey, PrivateKeyChain},
    oid, pbe,
    policy::{AlgorithmPolicy, Purpose},
    secret::Secret,
    store::EntryStore,
};

/// A key recovered from a key entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Private(PrivateKey),
    Secret(Secret),
}

#[derive(Default)]
struct Inner {
    entries: EntryStore,
    protection: Protection,
}

/// KeyStore holds private key, secret key and trusted certificate entries indexed by case-insensitive aliases.
///
/// Keys are kept encrypted in memory, exactly as they appear in the PKCS#12 file, and are only decrypted
/// by [KeyStore::key] or [KeyStore::key_chain].
/// All methods take `&self`; the state sits behind a single reader-writer lock.
pub struct KeyStore {
    policy: AlgorithmPolicy,
    import_policy: ImportPolicy,
    inner: RwLock<Inner>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("policy", &self.policy)
            .field("import_policy", &self.import_policy)
            .field("size", &self.size())
            .finish()
    }
}

impl KeyStore {
    /// Create new empty keystore with the default algorithm policy
    pub fn new() -> Self {
        Self::with_policy(AlgorithmPolicy::new())
    }

    /// Create new empty keystore with the given algorithm policy
    pub fn with_policy(policy: AlgorithmPolicy) -> Self {
        Self {
            policy,
            import_policy: ImportPolicy::default(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Set the handling of private keys without a certificate on load
    pub fn with_import_policy(mut self, import_policy: ImportPolicy) -> Self {
        self.import_policy = import_policy;
        self
    }

    /// Parse keystore from PKCS#12 data
    pub fn from_pkcs12(data: &[u8], password: Option<&str>) -> Result<Self> {
        let keystore = Self::new();
        keystore.load(data, password)?;
        Ok(keystore)
    }

    pub fn policy(&self) -> &AlgorithmPolicy {
        &self.policy
    }

    /// Replace the contents of the keystore with the given PKCS#12 data.
    ///
    /// Without a password, encrypted certificate blocks are skipped and the MAC is not checked.
    /// On error the keystore is left unchanged.
    pub fn load(&self, data: &[u8], password: Option<&str>) -> Result<LoadReport> {
        let loaded = codec::load(data, password, self.import_policy)?;

        let mut inner = self.inner.write();
        inner.entries = loaded.entries;
        inner.protection = loaded.protection;

        Ok(loaded.report)
    }

    /// Serialize the keystore into PKCS#12 format.
    ///
    /// Without a password the file has neither certificate encryption nor a MAC.
    /// Algorithm choices made here are kept for subsequent calls.
    pub fn store(&self, password: Option<&str>) -> Result<Vec<u8>> {
        let mut inner = self.inner.write();
        let Inner { entries, protection } = &mut *inner;
        codec::store(entries, protection, &self.policy, password)
    }

    /// Check whether the data looks like a PKCS#12 file, from its first 24 bytes
    pub fn probe(header: &[u8]) -> bool {
        codec::probe(header)
    }

    /// Check whether the file can be read without a password
    pub fn is_passwordless(data: &[u8]) -> Result<bool> {
        codec::is_passwordless(data)
    }

    /// Add or replace a private key entry, encrypting the key with the given password.
    /// The leaf certificate must be the first in the chain, and the root certificate must be the last.
    pub fn set_key_entry(&self, alias: &str, key: &PrivateKey, password: &str, chain: &[Certificate]) -> Result<()> {
        validate_chain(chain)?;
        let protected_key = self.protect(key.as_der(), password)?;

        self.put_key_entry(
            alias,
            EntryData::PrivateKey {
                protected_key,
                chain: chain.to_vec(),
            },
        );
        Ok(())
    }

    /// Add or replace a private key entry from a DER-encoded EncryptedPrivateKeyInfo
    pub fn set_protected_key_entry(&self, alias: &str, protected_key: &[u8], chain: &[Certificate]) -> Result<()> {
        EncryptedPrivateKeyInfo::from_der(protected_key).map_err(|_| Error::InvalidPrivateKey)?;
        validate_chain(chain)?;

        self.put_key_entry(
            alias,
            EntryData::PrivateKey {
                protected_key: protected_key.to_vec(),
                chain: chain.to_vec(),
            },
        );
        Ok(())
    }

    /// Add or replace a secret key entry, encrypting the key with the given password
    pub fn set_secret_key_entry(&self, alias: &str, secret: &Secret, password: &str) -> Result<()> {
        let plain = secret.to_pkcs8_der()?;
        let protected_key = self.protect(&plain, password)?;

        self.put_key_entry(alias, EntryData::SecretKey { protected_key });
        Ok(())
    }

    /// Add or replace a trusted certificate entry
    pub fn set_certificate_entry(&self, alias: &str, cert: &Certificate) -> Result<()> {
        self.set_certificate_entry_with_attributes(alias, cert, &[])
    }

    /// Add or replace a trusted certificate entry carrying extra bag attributes.
    ///
    /// A trusted key usage attribute among them replaces the default `anyExtendedKeyUsage`.
    pub fn set_certificate_entry_with_attributes(
        &self,
        alias: &str,
        cert: &Certificate,
        attributes: &[Pkcs12Attribute],
    ) -> Result<()> {
        let trusted_usage = match attributes
            .iter()
            .find(|a| *a.oid() == oid::ORACLE_TRUSTED_KEY_USAGE_OID)
        {
            Some(attribute) => attribute
                .values()
                .iter()
                .map(|v| Ok(ObjectIdentifier::from_der(&v.to_der()?)?))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let trusted_usage = if trusted_usage.is_empty() {
            vec![oid::ANY_EXTENDED_USAGE_OID]
        } else {
            trusted_usage
        };

        let mut inner = self.inner.write();
        if inner.entries.get(alias).is_some_and(Entry::is_key) {
            return Err(Error::CannotOverwriteKeyEntry(alias.to_owned()));
        }

        let mut extra: Vec<Pkcs12Attribute> = Vec::new();
        for attribute in attributes {
            if !extra.contains(attribute) {
                extra.push(attribute.clone());
            }
        }

        inner.entries.put(Entry {
            alias: alias.to_owned(),
            created: SystemTime::now(),
            key_id: None,
            attributes: extra,
            data: EntryData::Certificate {
                cert: cert.clone(),
                trusted_usage,
            },
        });
        debug!(%alias, subject = cert.subject(), "certificate entry set");
        Ok(())
    }

    /// Decrypt the key stored under the alias.
    /// Returns `None` when there is no such entry or it holds a certificate.
    pub fn key(&self, alias: &str, password: &str) -> Result<Option<Key>> {
        let inner = self.inner.read();
        let Some(entry) = inner.entries.get(alias) else {
            return Ok(None);
        };
        let Some(protected_key) = entry.protected_key() else {
            return Ok(None);
        };

        recover_key(protected_key, password, entry.kind())
            .map(Some)
            .map_err(|e| Error::UnrecoverableKey(Box::new(e)))
    }

    /// Decrypt the private key stored under the alias, together with its local key id and chain
    pub fn key_chain(&self, alias: &str, password: &str) -> Result<Option<PrivateKeyChain>> {
        let inner = self.inner.read();
        let Some(Entry {
            key_id,
            data: EntryData::PrivateKey { protected_key, chain },
            ..
        }) = inner.entries.get(alias)
        else {
            return Ok(None);
        };

        let key = match recover_key(protected_key, password, EntryKind::PrivateKey) {
            Ok(Key::Private(key)) => key,
            Ok(Key::Secret(_)) => return Err(Error::UnrecoverableKey(Box::new(Error::UnsupportedKeyType))),
            Err(e) => return Err(Error::UnrecoverableKey(Box::new(e))),
        };

        Ok(Some(PrivateKeyChain {
            key,
            local_key_id: key_id.clone().unwrap_or_default().into(),
            certs: chain.clone(),
        }))
    }

    /// The trusted certificate, or the leaf certificate of a private key entry
    pub fn certificate(&self, alias: &str) -> Option<Certificate> {
        self.inner.read().entries.get(alias)?.certificate().cloned()
    }

    /// Certificate chain of a private key entry, leaf first
    pub fn certificate_chain(&self, alias: &str) -> Option<Vec<Certificate>> {
        match &self.inner.read().entries.get(alias)?.data {
            EntryData::PrivateKey { chain, .. } if !chain.is_empty() => Some(chain.clone()),
            _ => None,
        }
    }

    pub fn creation_date(&self, alias: &str) -> Option<SystemTime> {
        self.inner.read().entries.get(alias).map(|e| e.created)
    }

    pub fn entry_kind(&self, alias: &str) -> Option<EntryKind> {
        self.inner.read().entries.get(alias).map(Entry::kind)
    }

    pub fn is_key_entry(&self, alias: &str) -> bool {
        self.inner.read().entries.get(alias).is_some_and(Entry::is_key)
    }

    pub fn is_certificate_entry(&self, alias: &str) -> bool {
        self.entry_kind(alias) == Some(EntryKind::Certificate)
    }

    /// Aliases in insertion order, with their original case
    pub fn aliases(&self) -> Vec<String> {
        self.inner.read().entries.iter().map(|e| e.alias.clone()).collect()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.inner.read().entries.contains(alias)
    }

    /// Get entries count in the keystore
    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Delete entry from the keystore, returning its kind
    pub fn delete_entry(&self, alias: &str) -> Option<EntryKind> {
        let removed = self.inner.write().entries.remove(alias)?;
        debug!(%alias, kind = ?removed.kind(), "entry deleted");
        Some(removed.kind())
    }

    /// Alias of the first entry whose certificate, or chain leaf, equals the given one
    pub fn certificate_alias(&self, cert: &Certificate) -> Option<String> {
        self.inner.read().entries.alias_of(cert).map(str::to_owned)
    }

    /// Bag attributes of an entry: friendly name, local key id and trusted usage followed by any others
    pub fn attributes(&self, alias: &str) -> Result<Option<Vec<Pkcs12Attribute>>> {
        match self.inner.read().entries.get(alias) {
            Some(entry) => Ok(Some(entry.bag_attributes().to_list()?)),
            None => Ok(None),
        }
    }

    pub fn private_key_count(&self) -> usize {
        self.inner.read().entries.count(EntryKind::PrivateKey)
    }

    pub fn secret_key_count(&self) -> usize {
        self.inner.read().entries.count(EntryKind::SecretKey)
    }

    /// Certificates held by the keystore, chain members included
    pub fn certificate_count(&self) -> usize {
        self.inner.read().entries.certificate_count()
    }

    /// Certificate protection algorithm read on load or chosen on store; `NONE` for plain certificates
    pub fn cert_protection_algorithm(&self) -> Option<String> {
        self.inner.read().protection.cert_algorithm.clone()
    }

    pub fn cert_protection_iterations(&self) -> Option<u64> {
        self.inner.read().protection.cert_iterations
    }

    /// MAC algorithm read on load or chosen on store; `NONE` when there is no MAC
    pub fn mac_algorithm(&self) -> Option<String> {
        self.inner.read().protection.mac_algorithm.clone()
    }

    pub fn mac_iterations(&self) -> Option<u64> {
        self.inner.read().protection.mac_iterations
    }

    fn protect(&self, plain: &[u8], password: &str) -> Result<Vec<u8>> {
        let algorithm = self.policy.default_algorithm(Purpose::KeyProtection);
        let iterations = self.policy.default_iteration_count(Purpose::KeyProtection);
        let (encryption_algorithm, encrypted) = pbe::encrypt(&algorithm, iterations, plain, password)?;

        Ok(EncryptedPrivateKeyInfo {
            encryption_algorithm,
            encrypted_data: OctetString::new(encrypted)?,
        }
        .to_der()?)
    }

    fn put_key_entry(&self, alias: &str, data: EntryData) {
        let created = SystemTime::now();
        let entry = Entry {
            alias: alias.to_owned(),
            created,
            key_id: Some(time_key_id(created)),
            attributes: Vec::new(),
            data,
        };
        let kind = entry.kind();

        self.inner.write().entries.put(entry);
        debug!(%alias, ?kind, "key entry set");
    }
}

// Issuer linkage between neighbours and no repeated certificate
fn validate_chain(chain: &[Certificate]) -> Result<()> {
    if chain.len() <= 1 {
        return Ok(());
    }

    for (i, cert) in chain.iter().enumerate() {
        if chain[..i].contains(cert) {
            return Err(Error::InvalidCertificateChain);
        }
        if let Some(issuer) = chain.get(i + 1)
            && !cert.is_issued_by(issuer)
        {
            return Err(Error::InvalidCertificateChain);
        }
    }
    Ok(())
}

fn recover_key(protected_key: &[u8], password: &str, kind: EntryKind) -> Result<Key> {
    let info = EncryptedPrivateKeyInfo::from_der(protected_key)?;
    pbe::iteration_count(&info.encryption_algorithm)?;

    match decrypt_key(&info, password, kind) {
        Err(_) if password.is_empty() => {
            debug!("key recovery failed with an empty password, retrying with NUL");
            decrypt_key(&info, NUL_PASSWORD, kind)
        }
        result => result,
    }
}

fn decrypt_key(info: &EncryptedPrivateKeyInfo, password: &str, kind: EntryKind) -> Result<Key> {
    let plain = pbe::decrypt(&info.encryption_algorithm, info.encrypted_data.as_bytes(), password)?;
    match kind {
        EntryKind::SecretKey => Ok(Key::Secret(Secret::from_pkcs8_der(&plain)?)),
        _ => Ok(Key::Private(PrivateKey::from_der(&plain)?)),
    }
}
