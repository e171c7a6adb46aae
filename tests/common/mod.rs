#![allow(dead_code)]

use std::{str::FromStr, time::Duration};

use cms::{
    cert::x509::{
        self, TbsCertificate,
        ext::{
            Extension,
            pkix::{AuthorityKeyIdentifier, SubjectKeyIdentifier},
        },
        name::Name,
        serial_number::SerialNumber,
        spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
        time::{Time, Validity},
    },
    content_info::ContentInfo,
};
use der::{
    Any, Decode, Encode, Sequence,
    asn1::{BitString, ObjectIdentifier, OctetString, UtcTime},
};
use pfx_keystore::{Certificate, PrivateKey};
use pkcs12::{
    mac_data::MacData,
    pbe_params::EncryptedPrivateKeyInfo,
    pfx::{Pfx, Version},
};

pub const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
pub const SKI_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");
pub const AKI_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.35");

pub const DATA_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const ENCRYPTED_DATA_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.6");
pub const PKCS8_KEY_BAG_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.2");
pub const CERT_BAG_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.3");
pub const X509_CERT_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.22.1");
pub const PBES2_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.13");
pub const PBE_SHA1_3DES_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.3");
pub const SHA256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

pub const ROOT_DN: &str = "CN=Test Root CA,O=Example";
pub const INTERMEDIATE_DN: &str = "CN=Test Intermediate CA,O=Example";
pub const LEAF_DN: &str = "CN=leaf.example.com,O=Example";

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SafeBag {
    pub bag_id: ObjectIdentifier,
    #[asn1(context_specific = "0")]
    pub bag_value: Any,
    pub bag_attributes: Option<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertBag {
    pub cert_id: ObjectIdentifier,
    #[asn1(context_specific = "0")]
    pub cert_value: OctetString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PbeParameter {
    pub salt: OctetString,
    pub iterations: u64,
}

fn extension<T: Encode>(oid: ObjectIdentifier, value: &T) -> Extension {
    Extension {
        extn_id: oid,
        critical: false,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

/// Ed25519 certificate with a dummy signature, optionally carrying SKI and AKI extensions
pub fn certificate(subject: &str, issuer: &str, ski: Option<&[u8]>, aki: Option<&[u8]>) -> Certificate {
    let algorithm = AlgorithmIdentifierOwned {
        oid: ED25519_OID,
        parameters: None,
    };

    let mut extensions = Vec::new();
    if let Some(ski) = ski {
        extensions.push(extension(SKI_OID, &SubjectKeyIdentifier(OctetString::new(ski).unwrap())));
    }
    if let Some(aki) = aki {
        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(aki).unwrap()),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        extensions.push(extension(AKI_OID, &aki));
    }

    let not_before = UtcTime::from_unix_duration(Duration::from_secs(1_700_000_000)).unwrap();
    let not_after = UtcTime::from_unix_duration(Duration::from_secs(2_000_000_000)).unwrap();

    let tbs = TbsCertificate {
        version: x509::Version::V3,
        serial_number: SerialNumber::new(&[subject.len() as u8, 1]).unwrap(),
        signature: algorithm.clone(),
        issuer: Name::from_str(issuer).unwrap(),
        validity: Validity {
            not_before: Time::UtcTime(not_before),
            not_after: Time::UtcTime(not_after),
        },
        subject: Name::from_str(subject).unwrap(),
        subject_public_key_info: SubjectPublicKeyInfoOwned {
            algorithm: algorithm.clone(),
            subject_public_key: BitString::from_bytes(&[subject.len() as u8; 32]).unwrap(),
        },
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: (!extensions.is_empty()).then_some(extensions),
    };

    let cert = x509::Certificate {
        tbs_certificate: tbs,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&[0x5a; 64]).unwrap(),
    };

    Certificate::from_der(&cert.to_der().unwrap()).unwrap()
}

/// Leaf, intermediate and root linked by names and key identifiers
pub fn chain() -> Vec<Certificate> {
    vec![
        certificate(LEAF_DN, INTERMEDIATE_DN, Some(b"leaf-key"), Some(b"intermediate-key")),
        certificate(INTERMEDIATE_DN, ROOT_DN, Some(b"intermediate-key"), Some(b"root-key")),
        certificate(ROOT_DN, ROOT_DN, Some(b"root-key"), None),
    ]
}

/// PKCS#8 Ed25519 private key whose seed bytes are all `seed`
pub fn private_key(seed: u8) -> PrivateKey {
    let mut octets = vec![0x04, 0x20];
    octets.extend([seed; 32]);

    let info = pkcs8::PrivateKeyInfo::new(
        pkcs8::spki::AlgorithmIdentifierRef {
            oid: ED25519_OID,
            parameters: None,
        },
        &octets,
    );
    PrivateKey::from_der(&info.to_der().unwrap()).unwrap()
}

/// PBES2 protected EncryptedPrivateKeyInfo
pub fn encrypt_key(key: &PrivateKey, password: &str) -> Vec<u8> {
    let salt = [7u8; 16];
    let iv = [9u8; 16];
    let params = pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, &salt, &iv).unwrap();
    let encrypted = params.encrypt(password.as_bytes(), key.as_der()).unwrap();

    EncryptedPrivateKeyInfo {
        encryption_algorithm: AlgorithmIdentifierOwned {
            oid: PBES2_OID,
            parameters: Some(Any::from_der(&params.to_der().unwrap()).unwrap()),
        },
        encrypted_data: OctetString::new(encrypted).unwrap(),
    }
    .to_der()
    .unwrap()
}

pub fn key_bag(protected_key: &[u8], attributes: Option<Any>) -> SafeBag {
    SafeBag {
        bag_id: PKCS8_KEY_BAG_OID,
        bag_value: Any::from_der(protected_key).unwrap(),
        bag_attributes: attributes,
    }
}

pub fn cert_bag(cert: &Certificate, attributes: Option<Any>) -> SafeBag {
    let cert_bag = CertBag {
        cert_id: X509_CERT_OID,
        cert_value: OctetString::new(cert.as_der()).unwrap(),
    };
    SafeBag {
        bag_id: CERT_BAG_OID,
        bag_value: Any::from_der(&cert_bag.to_der().unwrap()).unwrap(),
        bag_attributes: attributes,
    }
}

pub fn data_content(data: &[u8]) -> ContentInfo {
    ContentInfo {
        content_type: DATA_OID,
        content: Any::from_der(&OctetString::new(data).unwrap().to_der().unwrap()).unwrap(),
    }
}

/// PFX without a MAC holding the given safe contents
pub fn pfx(safes: &[ContentInfo], mac_data: Option<MacData>) -> Vec<u8> {
    Pfx {
        version: Version::V3,
        auth_safe: data_content(&safes.to_vec().to_der().unwrap()),
        mac_data,
    }
    .to_der()
    .unwrap()
}

/// Byte range of the authenticated safe payload inside an encoded PFX
pub fn auth_safe_range(data: &[u8]) -> std::ops::Range<usize> {
    let parsed = Pfx::from_der(data).unwrap();
    let payload = OctetString::from_der(&parsed.auth_safe.content.to_der().unwrap()).unwrap();
    let mac_len = parsed.mac_data.map(|m| m.to_der().unwrap().len()).unwrap_or_default();
    let end = data.len() - mac_len;
    end - payload.as_bytes().len()..end
}
