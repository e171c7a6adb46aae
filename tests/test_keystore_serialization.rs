mod common;

use std::time::UNIX_EPOCH;

use base64::{Engine, engine::general_purpose::STANDARD};
use cms::{
    cert::x509::spki::AlgorithmIdentifierOwned,
    content_info::{CmsVersion, ContentInfo},
    encrypted_data::EncryptedData,
    enveloped_data::EncryptedContentInfo,
};
use der::{
    Any, Decode, Encode, Tag,
    asn1::{BmpString, ObjectIdentifier, OctetString},
};
use pfx_keystore::{
    AlgorithmPolicy, Key, KeyStore, LoadReport, NONE, Purpose,
    error::Error,
    secret::{Secret, SecretKeyType},
};
use pkcs12::{digest_info::DigestInfo, mac_data::MacData};

use common::{
    CERT_BAG_OID, DATA_OID, ENCRYPTED_DATA_OID, INTERMEDIATE_DN, PBE_SHA1_3DES_OID, PbeParameter, ROOT_DN, SHA256_OID,
    SafeBag, auth_safe_range, cert_bag, chain, data_content, encrypt_key, key_bag, pfx, private_key,
};

const PASSWORD: &str = "changeit";
const KEY_PASSWORD: &str = "keypass";

// SecretBag value written by the JDK keytool: Blowfish key under PBES2, password "changeit"
const JAVA_SECRET_BAG: &str = "oIGzMIGwBgsqhkiG9w0BDAoBAqCBoASBnTCBmjBmBgkqhkiG9w0BBQ0wWTA4BgkqhkiG9w0BBQwwKwQUnuKEvUWqBU1bJE7g5hYeIU3zsmYCAicQAgEgMAwGCCqGSIb3DQIJBQAwHQYJYIZIAWUDBAEqBBBEitwx8ZcwYypT521bjuv8BDAARNFyg3PJsKUGvngARYN+vtsXHVXEXLOlghj4awwBVf2BW1hZx5Zow+7CF6b/YE4=";
const JAVA_SECRET_KEY: [u8; 16] = [179, 90, 152, 194, 13, 90, 101, 100, 154, 17, 70, 109, 1, 234, 8, 16];

fn populated_keystore() -> KeyStore {
    let keystore = KeyStore::new();
    let certs = chain();
    keystore.set_key_entry("Server", &private_key(1), KEY_PASSWORD, &certs).unwrap();
    keystore
        .set_secret_key_entry("hmac", &Secret::new(SecretKeyType::HmacSha256, &[3u8; 64]), KEY_PASSWORD)
        .unwrap();
    keystore.set_certificate_entry("root", &certs[2]).unwrap();
    keystore
}

#[test]
fn test_round_trip() {
    let keystore = populated_keystore();
    let created = keystore.creation_date("server").unwrap();

    let data = keystore.store(Some(PASSWORD)).unwrap();
    assert!(KeyStore::probe(&data));
    assert!(!KeyStore::is_passwordless(&data).unwrap());

    let loaded = KeyStore::new();
    let report = loaded.load(&data, Some(PASSWORD)).unwrap();
    assert_eq!(
        report,
        LoadReport {
            mac_verified: true,
            ..Default::default()
        }
    );

    assert_eq!(loaded.aliases(), ["Server", "hmac", "root"]);
    assert_eq!(loaded.certificate_chain("SERVER"), Some(chain()));
    assert_eq!(loaded.certificate("root"), Some(chain()[2].clone()));
    assert!(loaded.is_certificate_entry("root"));
    assert_eq!(loaded.private_key_count(), 1);
    assert_eq!(loaded.secret_key_count(), 1);
    assert_eq!(loaded.certificate_count(), 4);

    assert_eq!(
        loaded.key("server", KEY_PASSWORD).unwrap(),
        Some(Key::Private(private_key(1)))
    );
    assert_eq!(
        loaded.key("hmac", KEY_PASSWORD).unwrap(),
        Some(Key::Secret(Secret::new(SecretKeyType::HmacSha256, &[3u8; 64])))
    );

    let millis = |t: std::time::SystemTime| t.duration_since(UNIX_EPOCH).unwrap().as_millis();
    assert_eq!(millis(loaded.creation_date("server").unwrap()), millis(created));

    assert_eq!(
        loaded.cert_protection_algorithm().as_deref(),
        Some("PBEWithHmacSHA256AndAES_256")
    );
    assert_eq!(loaded.cert_protection_iterations(), Some(10000));
    assert_eq!(loaded.mac_algorithm().as_deref(), Some("HmacPBESHA256"));
    assert_eq!(loaded.mac_iterations(), Some(10000));
}

#[test]
fn test_store_caches_protection() {
    let keystore = KeyStore::with_policy(AlgorithmPolicy::legacy());
    keystore.set_key_entry("k", &private_key(2), KEY_PASSWORD, &chain()).unwrap();
    let data = keystore.store(Some(PASSWORD)).unwrap();
    assert_eq!(
        keystore.cert_protection_algorithm().as_deref(),
        Some("PBEWithSHA1AndRC2_40")
    );
    assert_eq!(keystore.mac_algorithm().as_deref(), Some("HmacPBESHA1"));

    // a default-policy keystore keeps what the file used
    let loaded = KeyStore::new();
    loaded.load(&data, Some(PASSWORD)).unwrap();
    assert_eq!(loaded.cert_protection_algorithm().as_deref(), Some("PBEWithSHA1AndRC2_40"));
    assert_eq!(loaded.cert_protection_iterations(), Some(50000));
    assert_eq!(loaded.mac_iterations(), Some(100000));

    let again = loaded.store(Some(PASSWORD)).unwrap();
    let reloaded = KeyStore::new();
    reloaded.load(&again, Some(PASSWORD)).unwrap();
    assert_eq!(reloaded.cert_protection_algorithm().as_deref(), Some("PBEWithSHA1AndRC2_40"));
    assert_eq!(reloaded.mac_algorithm().as_deref(), Some("HmacPBESHA1"));
    assert_eq!(
        reloaded.key("k", KEY_PASSWORD).unwrap(),
        Some(Key::Private(private_key(2)))
    );
}

#[test]
fn test_policy_overrides_apply_to_new_files() {
    let policy = AlgorithmPolicy::new()
        .with_algorithm(Purpose::CertProtection, "PBEWithHmacSHA512AndAES_128")
        .with_algorithm(Purpose::Mac, "HmacPBESHA384")
        .with_iteration_count(Purpose::CertProtection, 2048)
        .unwrap()
        .with_iteration_count(Purpose::Mac, 4096)
        .unwrap();
    let keystore = KeyStore::with_policy(policy);
    keystore.set_key_entry("k", &private_key(3), KEY_PASSWORD, &chain()).unwrap();

    let data = keystore.store(Some(PASSWORD)).unwrap();
    let loaded = KeyStore::from_pkcs12(&data, Some(PASSWORD)).unwrap();
    assert_eq!(
        loaded.cert_protection_algorithm().as_deref(),
        Some("PBEWithHmacSHA512AndAES_128")
    );
    assert_eq!(loaded.cert_protection_iterations(), Some(2048));
    assert_eq!(loaded.mac_algorithm().as_deref(), Some("HmacPBESHA384"));
    assert_eq!(loaded.mac_iterations(), Some(4096));
    assert_eq!(loaded.certificate_chain("k"), Some(chain()));
}

#[test]
fn test_tampered_auth_safe() {
    let data = populated_keystore().store(Some(PASSWORD)).unwrap();
    let range = auth_safe_range(&data);

    // the certificate ciphertext closes the authenticated safe
    let mut tampered = data.clone();
    tampered[range.end - 5] ^= 0x01;

    assert!(matches!(
        KeyStore::new().load(&tampered, Some(PASSWORD)),
        Err(Error::IntegrityCheckFailed(_))
    ));

    let keystore = KeyStore::new();
    let report = keystore.load(&tampered, None).unwrap();
    assert_eq!(report.skipped_encrypted_blocks, 1);
    assert!(!report.mac_verified);

    // tampering the clear key block fails the MAC just the same
    let mut tampered = data;
    tampered[range.start + 40] ^= 0x80;
    assert!(matches!(
        KeyStore::new().load(&tampered, Some(PASSWORD)),
        Err(Error::IntegrityCheckFailed(_))
    ));
}

#[test]
fn test_wrong_store_password() {
    let data = populated_keystore().store(Some(PASSWORD)).unwrap();
    let keystore = populated_keystore();

    match keystore.load(&data, Some("wrong")) {
        Err(Error::IntegrityCheckFailed(cause)) => assert!(matches!(*cause, Error::MacError(_))),
        other => panic!("unexpected result: {other:?}"),
    }
    // a failed load leaves the keystore as it was
    assert_eq!(keystore.size(), 3);
}

#[test]
fn test_null_password_load() {
    let data = populated_keystore().store(Some(PASSWORD)).unwrap();

    let keystore = KeyStore::new();
    let report = keystore.load(&data, None).unwrap();

    assert_eq!(report.skipped_encrypted_blocks, 1);
    assert_eq!(report.unchained_keys, ["Server"]);
    assert!(!report.mac_verified);

    assert_eq!(keystore.aliases(), ["Server", "hmac"]);
    assert_eq!(keystore.certificate_chain("server"), None);
    assert_eq!(keystore.certificate_count(), 0);
    assert_eq!(
        keystore.key("server", KEY_PASSWORD).unwrap(),
        Some(Key::Private(private_key(1)))
    );
}

#[test]
fn test_empty_password_retries_with_nul() {
    let keystore = KeyStore::new();
    keystore.set_key_entry("k", &private_key(4), "\0", &chain()).unwrap();
    let data = keystore.store(Some("\0")).unwrap();

    let loaded = KeyStore::new();
    let report = loaded.load(&data, Some("")).unwrap();
    assert!(report.mac_verified);
    assert_eq!(loaded.certificate_chain("k"), Some(chain()));
    assert_eq!(loaded.key("k", "").unwrap(), Some(Key::Private(private_key(4))));

    assert!(matches!(
        loaded.load(&data, Some("x")),
        Err(Error::IntegrityCheckFailed(_))
    ));
}

// Cheap certificate encryption and no MAC, so the cipher alone guards the certificates
fn mac_less_policy() -> AlgorithmPolicy {
    AlgorithmPolicy::new()
        .with_algorithm(Purpose::Mac, NONE)
        .with_iteration_count(Purpose::CertProtection, 1)
        .unwrap()
}

#[test]
fn test_wrong_password_without_mac() {
    let keystore = KeyStore::with_policy(mac_less_policy());
    keystore.set_certificate_entry("root", &chain()[2]).unwrap();
    let data = keystore.store(Some(PASSWORD)).unwrap();
    assert_eq!(KeyStore::from_pkcs12(&data, Some(PASSWORD)).unwrap().size(), 1);

    // some wrong passwords decrypt to valid padding and fail while parsing the bags
    for i in 0..1000 {
        let password = format!("wrong{i}");
        match KeyStore::new().load(&data, Some(&password)) {
            Err(Error::IntegrityCheckFailed(_)) => {}
            other => panic!("unexpected result for {password}: {other:?}"),
        }
    }
}

#[test]
fn test_empty_password_retries_with_nul_without_mac() {
    let keystore = KeyStore::with_policy(mac_less_policy());
    keystore.set_certificate_entry("root", &chain()[2]).unwrap();

    // fresh salts make the empty password occasionally decrypt to valid padding
    for _ in 0..300 {
        let data = keystore.store(Some("\0")).unwrap();
        let loaded = KeyStore::from_pkcs12(&data, Some("")).unwrap();
        assert_eq!(loaded.certificate("root"), Some(chain()[2].clone()));
    }
}

#[test]
fn test_passwordless_keystore() {
    let keystore = KeyStore::new();
    keystore.set_key_entry("solo", &private_key(5), KEY_PASSWORD, &[]).unwrap();
    let data = keystore.store(None).unwrap();
    assert!(KeyStore::is_passwordless(&data).unwrap());
    assert_eq!(keystore.cert_protection_algorithm(), None);
    assert_eq!(keystore.mac_algorithm(), None);

    // a passwordless store is not remembered by later stores
    keystore.set_certificate_entry("root", &chain()[2]).unwrap();
    let protected = keystore.store(Some(PASSWORD)).unwrap();
    assert!(!KeyStore::is_passwordless(&protected).unwrap());
    assert_eq!(keystore.mac_algorithm().as_deref(), Some("HmacPBESHA256"));
    assert_eq!(
        KeyStore::from_pkcs12(&protected, Some(PASSWORD)).unwrap().certificate("root"),
        Some(chain()[2].clone())
    );

    let loaded = KeyStore::new();
    let report = loaded.load(&data, None).unwrap();
    assert_eq!(report.unchained_keys, ["solo"]);
    assert_eq!(loaded.cert_protection_algorithm().as_deref(), Some(NONE));
    assert_eq!(loaded.mac_algorithm().as_deref(), Some(NONE));
    assert_eq!(
        loaded.key("solo", KEY_PASSWORD).unwrap(),
        Some(Key::Private(private_key(5)))
    );

    // NONE read from a passwordless file sticks when it is stored with a password
    loaded.set_certificate_entry("root", &chain()[2]).unwrap();
    let data = loaded.store(Some(PASSWORD)).unwrap();
    assert!(KeyStore::is_passwordless(&data).unwrap());
    assert_eq!(KeyStore::from_pkcs12(&data, None).unwrap().certificate_count(), 1);
}

// Encoded bag attributes of every certificate bag in the plain safes of a file
fn plain_cert_bag_attributes(data: &[u8]) -> Vec<Vec<u8>> {
    let pfx = pkcs12::pfx::Pfx::from_der(data).unwrap();
    let auth_safe = OctetString::from_der(&pfx.auth_safe.content.to_der().unwrap()).unwrap();
    let safes = Vec::<ContentInfo>::from_der(auth_safe.as_bytes()).unwrap();

    let mut attributes = Vec::new();
    for safe in safes.iter().filter(|safe| safe.content_type == DATA_OID) {
        let contents = OctetString::from_der(&safe.content.to_der().unwrap()).unwrap();
        for bag in Vec::<SafeBag>::from_der(contents.as_bytes()).unwrap() {
            if bag.bag_id == CERT_BAG_OID {
                attributes.push(bag.bag_attributes.map(|a| a.to_der().unwrap()).unwrap_or_default());
            }
        }
    }
    attributes
}

#[test]
fn test_chain_member_friendly_names() {
    let keystore = KeyStore::new();
    keystore.set_key_entry("server", &private_key(6), KEY_PASSWORD, &chain()).unwrap();
    let data = keystore.store(None).unwrap();

    let attributes = plain_cert_bag_attributes(&data);
    assert_eq!(attributes.len(), 3);

    // subject names are written without spaces after the separators
    for (encoded, dn) in attributes[1..].iter().zip([INTERMEDIATE_DN, ROOT_DN]) {
        let name = BmpString::from_utf8(dn).unwrap().to_der().unwrap();
        assert!(encoded.windows(name.len()).any(|w| w == name.as_slice()), "{dn}");
    }
}

#[test]
fn test_single_key_without_key_id() {
    let certs = chain();
    let key = private_key(6);
    let keys = vec![key_bag(&encrypt_key(&key, KEY_PASSWORD), None)].to_der().unwrap();
    // only the first bag of a safe gets the placeholder id
    let certs_contents = vec![cert_bag(&certs[0], None), cert_bag(&certs[1], None)]
        .to_der()
        .unwrap();
    let data = pfx(&[data_content(&keys), data_content(&certs_contents)], None);

    let keystore = KeyStore::new();
    keystore.load(&data, Some(PASSWORD)).unwrap();

    assert_eq!(keystore.aliases(), ["1"]);
    assert_eq!(keystore.certificate_chain("1"), Some(certs[..2].to_vec()));
    let chain = keystore.key_chain("1", KEY_PASSWORD).unwrap().unwrap();
    assert_eq!(chain.key(), &key);
    assert_eq!(chain.local_key_id().as_ref(), b"01");
    assert_eq!(keystore.cert_protection_algorithm().as_deref(), Some(NONE));
    assert_eq!(keystore.mac_algorithm().as_deref(), Some(NONE));
}

#[test]
fn test_multiple_keys_without_key_id_are_dropped() {
    let contents = vec![
        key_bag(&encrypt_key(&private_key(7), KEY_PASSWORD), None),
        key_bag(&encrypt_key(&private_key(8), KEY_PASSWORD), None),
        cert_bag(&chain()[0], None),
    ]
    .to_der()
    .unwrap();
    let data = pfx(&[data_content(&contents)], None);

    let keystore = KeyStore::new();
    let report = keystore.load(&data, Some(PASSWORD)).unwrap();
    assert_eq!(report.dropped_key_bags, 2);
    assert_eq!(keystore.size(), 0);
}

#[test]
fn test_java_secret_bag() {
    let secret_bag_oid = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.5");
    let mut body = secret_bag_oid.to_der().unwrap();
    body.extend(STANDARD.decode(JAVA_SECRET_BAG).unwrap());
    let safe_bag = Any::new(Tag::Sequence, body).unwrap();
    let contents = vec![safe_bag].to_der().unwrap();
    let data = pfx(&[data_content(&contents)], None);

    let keystore = KeyStore::from_pkcs12(&data, None).unwrap();
    assert_eq!(keystore.aliases(), ["1"]);
    let key_chain = keystore.key_chain("1", PASSWORD).unwrap();
    assert!(key_chain.is_none());

    match keystore.key("1", PASSWORD).unwrap() {
        Some(Key::Secret(secret)) => {
            assert_eq!(secret.get_key_type(), SecretKeyType::Blowfish);
            assert_eq!(secret.get_key(), JAVA_SECRET_KEY);
        }
        other => panic!("unexpected key: {other:?}"),
    }

    // keyId-less secret keys get the secret placeholder id
    let attributes = keystore.attributes("1").unwrap().unwrap();
    assert_eq!(attributes[1], pfx_keystore::Pkcs12Attribute::local_key_id(b"00").unwrap());
}

fn encrypted_block(iterations: u64) -> ContentInfo {
    let params = PbeParameter {
        salt: OctetString::new([1u8; 20]).unwrap(),
        iterations,
    };
    let encrypted = EncryptedData {
        version: CmsVersion::V0,
        enc_content_info: EncryptedContentInfo {
            content_type: common::DATA_OID,
            content_enc_alg: AlgorithmIdentifierOwned {
                oid: PBE_SHA1_3DES_OID,
                parameters: Some(Any::from_der(&params.to_der().unwrap()).unwrap()),
            },
            encrypted_content: Some(OctetString::new([0u8; 16]).unwrap()),
        },
        unprotected_attrs: None,
    };
    ContentInfo {
        content_type: ENCRYPTED_DATA_OID,
        content: Any::from_der(&encrypted.to_der().unwrap()).unwrap(),
    }
}

#[test]
fn test_encrypted_data_iteration_ceiling() {
    let data = pfx(&[encrypted_block(5_000_001)], None);

    assert!(matches!(
        KeyStore::new().load(&data, Some(PASSWORD)),
        Err(Error::IterationCountTooLarge(5_000_001))
    ));
    // skipped entirely without a password
    assert_eq!(
        KeyStore::new().load(&data, None).unwrap().skipped_encrypted_blocks,
        1
    );
}

fn bogus_mac(iterations: i32) -> MacData {
    MacData {
        mac: DigestInfo {
            algorithm: AlgorithmIdentifierOwned {
                oid: SHA256_OID,
                parameters: None,
            },
            digest: OctetString::new([0u8; 32]).unwrap(),
        },
        mac_salt: OctetString::new([2u8; 20]).unwrap(),
        iterations,
    }
}

#[test]
fn test_encrypted_data_ceiling_checked_before_mac() {
    let data = pfx(&[encrypted_block(5_000_001)], Some(bogus_mac(1)));

    assert!(matches!(
        KeyStore::new().load(&data, Some(PASSWORD)),
        Err(Error::IterationCountTooLarge(5_000_001))
    ));

    // within the ceiling the mismatching MAC is what fails
    let data = pfx(&[encrypted_block(2048)], Some(bogus_mac(1)));
    assert!(matches!(
        KeyStore::new().load(&data, Some(PASSWORD)),
        Err(Error::IntegrityCheckFailed(_))
    ));
}

#[test]
fn test_mac_iteration_ceiling() {
    let data = pfx(&[], Some(bogus_mac(5_000_001)));

    assert!(matches!(
        KeyStore::new().load(&data, Some(PASSWORD)),
        Err(Error::IterationCountTooLarge(5_000_001))
    ));
    assert!(KeyStore::new().load(&data, None).is_ok());
}

#[test]
#[ignore = "derives keys with 5,000,000 iterations"]
fn test_iteration_ceiling_is_inclusive() {
    let policy = AlgorithmPolicy::new()
        .with_iteration_count(Purpose::CertProtection, 5_000_000)
        .unwrap()
        .with_iteration_count(Purpose::Mac, 5_000_000)
        .unwrap();
    let keystore = KeyStore::with_policy(policy);
    keystore.set_certificate_entry("root", &chain()[2]).unwrap();
    let data = keystore.store(Some(PASSWORD)).unwrap();

    let loaded = KeyStore::from_pkcs12(&data, Some(PASSWORD)).unwrap();
    assert_eq!(loaded.cert_protection_iterations(), Some(5_000_000));
    assert_eq!(loaded.mac_iterations(), Some(5_000_000));
}

#[test]
fn test_unsupported_content_type() {
    let signed_data = ContentInfo {
        content_type: ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2"),
        content: Any::from_der(&OctetString::new([0u8; 4]).unwrap().to_der().unwrap()).unwrap(),
    };
    let data = pfx(&[signed_data], None);

    assert!(matches!(
        KeyStore::new().load(&data, None),
        Err(Error::UnsupportedContentType(_))
    ));
}

#[test]
fn test_probe_rejects_garbage() {
    assert!(!KeyStore::probe(b"-----BEGIN CERTIFICATE-----"));
    assert!(!KeyStore::probe(&[0x30, 0x82]));
    assert!(KeyStore::new().load(b"not a keystore", None).is_err());
}
