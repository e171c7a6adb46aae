use std::fmt;

use der::{Encode, oid::ObjectIdentifier};
use pkcs8::{PrivateKeyInfo, spki::AlgorithmIdentifierRef};
use rand::{TryRngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::{
    Result,
    error::Error,
    oid::{
        AES_128_CBC_KEY_OID, AES_192_CBC_KEY_OID, AES_256_CBC_KEY_OID, AES_GROUP_KEY_OID, BLOWFISH_KEY_OID,
        CAMELIA_KEY_OID, DES_CBC_KEY_OID, DES_EDE3_CBC_KEY_OID, HMAC_SHA1_KEY_OID, HMAC_SHA224_KEY_OID,
        HMAC_SHA256_KEY_OID, HMAC_SHA384_KEY_OID, HMAC_SHA512_KEY_OID, RC2_CBC_KEY_OID, RC4_KEY_OID,
    },
};

/// Raw secret key material with its algorithm, wiped on drop
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub(crate) key_type: SecretKeyType,
    pub(crate) key: Zeroizing<Vec<u8>>,
}

impl Secret {
    /// Create a secret from existing key bytes
    pub fn new(key_type: SecretKeyType, key: &[u8]) -> Self {
        Self {
            key_type,
            key: Zeroizing::new(key.to_vec()),
        }
    }

    /// Get secret key data
    pub fn get_key(&self) -> &[u8] {
        &self.key
    }

    pub fn get_key_type(&self) -> SecretKeyType {
        self.key_type
    }

    pub fn builder(key_type: SecretKeyType) -> SecretBuilder {
        SecretBuilder::new(key_type)
    }

    pub fn get_key_len(&self) -> usize {
        self.key.len()
    }

    // PKCS#8-shaped wrapper: { version 0, AlgorithmIdentifier, OCTET STRING key }, encoded from borrowed key bytes
    pub(crate) fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let key_info = PrivateKeyInfo::new(
            AlgorithmIdentifierRef {
                oid: self.key_type.to_oid(),
                parameters: None,
            },
            self.key.as_slice(),
        );
        Ok(Zeroizing::new(key_info.to_der()?))
    }

    pub(crate) fn from_pkcs8_der(data: &[u8]) -> Result<Self> {
        let key_info = PrivateKeyInfo::try_from(data).map_err(|_| Error::UnsupportedKeyType)?;
        Ok(Self {
            key_type: SecretKeyType::from_oid(&key_info.algorithm.oid),
            key: Zeroizing::new(key_info.private_key.to_vec()),
        })
    }
}

pub struct SecretBuilder {
    key_type: SecretKeyType,
    key: Option<Zeroizing<Vec<u8>>>,
    key_len: Option<usize>,
}

impl SecretBuilder {
    pub fn new(key_type: SecretKeyType) -> Self {
        let key_len = key_type.default_len();
        SecretBuilder {
            key_type,
            key: None,
            key_len,
        }
    }

    pub fn with_length(&mut self, len: usize) -> &mut Self {
        self.key_len = Some(len);
        self
    }

    pub fn with_key(&mut self, key: Vec<u8>) -> &mut Self {
        self.key_len = Some(key.len());
        self.key = Some(Zeroizing::new(key));
        self
    }

    /// Build the secret, generating random key bytes when no key was given
    pub fn build(&mut self) -> Result<Secret> {
        let key = match self.key.take() {
            Some(key) => key,
            None => {
                let key_len = self.key_len.ok_or(Error::InvalidLength)?;
                let mut key = Zeroizing::new(vec![0u8; key_len]);
                OsRng
                    .try_fill_bytes(&mut key)
                    .map_err(|e| Error::RandomGenerationError(e.to_string()))?;
                key
            }
        };

        Ok(Secret {
            key_type: self.key_type,
            key,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKeyType {
    AES,
    AES128Cbc,
    AES192Cbc,
    AES256Cbc,
    DesCbc,
    DesEde3Cbc,
    Blowfish,
    Rc2Cbc,
    Rc4,
    Camelia,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    Unknown(ObjectIdentifier),
}

impl SecretKeyType {
    pub fn from_oid(oid: &ObjectIdentifier) -> Self {
        match *oid {
            o if o == AES_GROUP_KEY_OID => SecretKeyType::AES,
            o if o == AES_128_CBC_KEY_OID => SecretKeyType::AES128Cbc,
            o if o == AES_192_CBC_KEY_OID => SecretKeyType::AES192Cbc,
            o if o == AES_256_CBC_KEY_OID => SecretKeyType::AES256Cbc,
            o if o == DES_CBC_KEY_OID => SecretKeyType::DesCbc,
            o if o == DES_EDE3_CBC_KEY_OID => SecretKeyType::DesEde3Cbc,
            o if o == BLOWFISH_KEY_OID => SecretKeyType::Blowfish,
            o if o == RC2_CBC_KEY_OID => SecretKeyType::Rc2Cbc,
            o if o == RC4_KEY_OID => SecretKeyType::Rc4,
            o if o == CAMELIA_KEY_OID => SecretKeyType::Camelia,
            o if o == HMAC_SHA1_KEY_OID => SecretKeyType::HmacSha1,
            o if o == HMAC_SHA224_KEY_OID => SecretKeyType::HmacSha224,
            o if o == HMAC_SHA256_KEY_OID => SecretKeyType::HmacSha256,
            o if o == HMAC_SHA384_KEY_OID => SecretKeyType::HmacSha384,
            o if o == HMAC_SHA512_KEY_OID => SecretKeyType::HmacSha512,
            _ => SecretKeyType::Unknown(*oid),
        }
    }

    pub fn to_oid(&self) -> ObjectIdentifier {
        match self {
            SecretKeyType::AES => AES_GROUP_KEY_OID,
            SecretKeyType::AES128Cbc => AES_128_CBC_KEY_OID,
            SecretKeyType::AES192Cbc => AES_192_CBC_KEY_OID,
            SecretKeyType::AES256Cbc => AES_256_CBC_KEY_OID,
            SecretKeyType::DesCbc => DES_CBC_KEY_OID,
            SecretKeyType::DesEde3Cbc => DES_EDE3_CBC_KEY_OID,
            SecretKeyType::Blowfish => BLOWFISH_KEY_OID,
            SecretKeyType::Rc2Cbc => RC2_CBC_KEY_OID,
            SecretKeyType::Rc4 => RC4_KEY_OID,
            SecretKeyType::Camelia => CAMELIA_KEY_OID,
            SecretKeyType::HmacSha1 => HMAC_SHA1_KEY_OID,
            SecretKeyType::HmacSha224 => HMAC_SHA224_KEY_OID,
            SecretKeyType::HmacSha256 => HMAC_SHA256_KEY_OID,
            SecretKeyType::HmacSha384 => HMAC_SHA384_KEY_OID,
            SecretKeyType::HmacSha512 => HMAC_SHA512_KEY_OID,
            SecretKeyType::Unknown(oid) => *oid,
        }
    }

    /// returns default key length in bytes
    pub(crate) fn default_len(&self) -> Option<usize> {
        match self {
            SecretKeyType::AES128Cbc => Some(16),
            SecretKeyType::AES192Cbc => Some(192 / 8),
            SecretKeyType::AES256Cbc => Some(256 / 8),
            SecretKeyType::HmacSha1 | SecretKeyType::HmacSha224 => Some(512 / 8),
            SecretKeyType::HmacSha256 | SecretKeyType::HmacSha384 | SecretKeyType::HmacSha512 => Some(1024 / 8),
            _ => None,
        }
    }

    pub fn from_oid_str(oid_str: &str) -> Result<Self> {
        let oid = ObjectIdentifier::new(oid_str).map_err(|_| Error::UnsupportedKeyType)?;
        Ok(SecretKeyType::from_oid(&oid))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("key_type", &self.key_type)
            .field("key", &"<KEY>")
            .finish()
    }
}
