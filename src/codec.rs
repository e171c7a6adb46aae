//!
//! PFX container codec: authenticated safe parsing, key/certificate correlation and serialization
//!
use std::time::SystemTime;

use cms::{
    content_info::{CmsVersion, ContentInfo},
    encrypted_data::EncryptedData,
    enveloped_data::EncryptedContentInfo,
};
use der::{
    Any, AnyRef, Decode, Encode, Reader, Sequence, SliceReader, Tag, Tagged,
    asn1::{ObjectIdentifier, OctetString},
};
use pkcs12::{
    cert_type::CertBag,
    mac_data::MacData,
    pfx::{Pfx, Version},
};
use tracing::{debug, trace, warn};

use crate::{
    Result,
    attributes::BagAttributes,
    cert::Certificate,
    entry::{Entry, EntryData, EntryKind, date_from_key_id},
    error::Error,
    mac, oid, pbe,
    policy::{AlgorithmPolicy, NONE, Purpose},
    store::EntryStore,
};

const PFX_VERSION: u32 = 3;

// Placeholder key ids for key bags that carry no localKeyId
const PRIVATE_KEY_PLACEHOLDER_ID: &[u8] = b"01";
const SECRET_KEY_PLACEHOLDER_ID: &[u8] = b"00";

pub(crate) const NUL_PASSWORD: &str = "\0";

const HEADER_PATTERNS: [[u64; 3]; 9] = [
    [0x3080020103308006, 0x092A864886F70D01, 0x0701A08024800400],
    [0x3082000002010330, 0x82000006092A8648, 0x86F70D010701A080],
    [0x3000020103300006, 0x092A864886F70D01, 0x0701A00004000000],
    [0x3081000201033081, 0x0006092A864886F7, 0x0D010701A0810004],
    [0x3082000002010330, 0x810006092A864886, 0xF70D010701A08100],
    [0x3083000000020103, 0x3082000006092A86, 0x4886F70D010701A0],
    [0x3083000000020103, 0x308300000006092A, 0x864886F70D010701],
    [0x3084000000000201, 0x0330830000000609, 0x2A864886F70D0107],
    [0x3084000000000201, 0x0330840000000006, 0x092A864886F70D01],
];

const HEADER_MASKS: [[u64; 3]; 9] = [
    [0xFFFFFFFFFFFFFFFF, 0xFFFFFFFFFFFFFFFF, 0xFFFFFFFFFFFFFF00],
    [0xFFFF0000FFFFFFFF, 0xFF0000FFFFFFFFFF, 0xFFFFFFFFFFFFFFF0],
    [0xFF00FFFFFFFF00FF, 0xFFFFFFFFFFFFFFFF, 0xFFFFFF00FF000000],
    [0xFFFF00FFFFFFFFFF, 0x00FFFFFFFFFFFFFF, 0xFFFFFFFFFFFF00FF],
    [0xFFFF0000FFFFFFFF, 0xFF00FFFFFFFFFFFF, 0xFFFFFFFFFFFFFF00],
    [0xFFFF000000FFFFFF, 0xFFFF0000FFFFFFFF, 0xFFFFFFFFFFFFFFFF],
    [0xFFFF000000FFFFFF, 0xFFFF000000FFFFFF, 0xFFFFFFFFFFFFFFFF],
    [0xFFFF00000000FFFF, 0xFFFFFF000000FFFF, 0xFFFFFFFFFFFFFFFF],
    [0xFFFF00000000FFFF, 0xFFFFFF00000000FF, 0xFFFFFFFFFFFFFFFF],
];

/// What to do with private keys for which no certificate could be matched on load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Keep such keys with an empty certificate chain
    #[default]
    Relaxed,
    /// Drop such keys from the keystore
    Strict,
}

/// Lossy-but-successful outcomes of a load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// EncryptedData blocks skipped because no password was given
    pub skipped_encrypted_blocks: usize,
    /// Aliases of private keys whose chain walk found no certificate
    pub unchained_keys: Vec<String>,
    /// Key bags without a local key id dropped from a multi-key file
    pub dropped_key_bags: usize,
    /// Whether a MAC was present and verified
    pub mac_verified: bool,
}

/// Protection choices read from a file or resolved during a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Protection {
    pub cert_algorithm: Option<String>,
    pub cert_iterations: Option<u64>,
    pub mac_algorithm: Option<String>,
    pub mac_iterations: Option<u64>,
}

pub(crate) struct Loaded {
    pub entries: EntryStore,
    pub protection: Protection,
    pub report: LoadReport,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SafeBagRecord {
    bag_id: ObjectIdentifier,
    #[asn1(context_specific = "0")]
    bag_value: Any,
    bag_attributes: Option<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SecretBag {
    secret_type_id: ObjectIdentifier,
    #[asn1(context_specific = "0")]
    secret_value: OctetString,
}

enum BagItem {
    PrivateKey(Vec<u8>),
    SecretKey(Vec<u8>),
    Certificate(Certificate),
}

struct ParsedBag {
    // position within its SafeContents
    index: usize,
    item: BagItem,
    attributes: BagAttributes,
}

struct CertCandidate {
    cert: Certificate,
    key_id: Option<Vec<u8>>,
    alias: Option<String>,
}

struct PfxParts<'a> {
    auth_safe: Vec<u8>,
    mac_data: Option<&'a [u8]>,
}

fn is_none(algorithm: &str) -> bool {
    algorithm.eq_ignore_ascii_case(NONE)
}

fn decode_pfx(data: &[u8]) -> Result<PfxParts<'_>> {
    let outer = AnyRef::from_der(data)?;
    if outer.tag() != Tag::Sequence {
        return Err(Error::MalformedStructure("PFX is not a SEQUENCE"));
    }

    let mut reader = SliceReader::new(outer.value())?;
    let version: u32 = reader.decode()?;
    if version != PFX_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let auth_safe: ContentInfo = reader.decode()?;
    if auth_safe.content_type != oid::CONTENT_TYPE_DATA_OID {
        return Err(Error::UnsupportedContentType(auth_safe.content_type));
    }
    let auth_safe = OctetString::from_der(&auth_safe.content.to_der()?)?.into_bytes();

    let mac_data = if reader.is_finished() {
        None
    } else {
        let remaining = reader.remaining_len();
        Some(reader.read_slice(remaining)?)
    };

    Ok(PfxParts { auth_safe, mac_data })
}

// Returns the password the MAC was verified with
fn verify_mac<'a>(mac_data: &MacData, password: &'a str, data: &[u8]) -> Result<&'a str> {
    match mac::verify(mac_data, password, data) {
        Err(_) if password.is_empty() => {
            debug!("MAC check failed with an empty password, retrying with NUL");
            mac::verify(mac_data, NUL_PASSWORD, data)?;
            Ok(NUL_PASSWORD)
        }
        result => result.map(|_| password),
    }
}

// Decrypts and parses one EncryptedData block; bag parsing is part of each attempt
fn decrypt_safe_contents(info: &EncryptedContentInfo, password: &str) -> Result<Vec<ParsedBag>> {
    let ciphertext = info
        .encrypted_content
        .as_ref()
        .ok_or(Error::MalformedStructure("EncryptedContentInfo has no content"))?
        .as_bytes();

    let attempt = |password: &str| -> Result<Vec<ParsedBag>> {
        let plain = pbe::decrypt(&info.content_enc_alg, ciphertext, password)?;
        parse_safe_contents(&plain)
    };

    match attempt(password) {
        Err(_) if password.is_empty() => {
            debug!("decryption failed with an empty password, retrying with NUL");
            attempt(NUL_PASSWORD)
        }
        result => result,
    }
}

// Content-infos of the authenticated safe, decoded ahead of the MAC check
enum Safe {
    Plain(OctetString),
    Encrypted {
        info: EncryptedContentInfo,
        algorithm: String,
        iterations: u64,
    },
    Skipped,
}

fn decode_safes(auth_safe: &[u8], password: Option<&str>) -> Result<Vec<Safe>> {
    let safes = Vec::<ContentInfo>::from_der(auth_safe)?;

    safes
        .into_iter()
        .map(|safe| match safe.content_type {
            oid::CONTENT_TYPE_DATA_OID => Ok(Safe::Plain(OctetString::from_der(&safe.content.to_der()?)?)),
            oid::CONTENT_TYPE_ENCRYPTED_DATA_OID if password.is_none() => Ok(Safe::Skipped),
            oid::CONTENT_TYPE_ENCRYPTED_DATA_OID => {
                let encrypted = EncryptedData::from_der(&safe.content.to_der()?)?;
                let info = encrypted.enc_content_info;
                let iterations = pbe::iteration_count(&info.content_enc_alg)?;
                let algorithm = pbe::algorithm_name(&info.content_enc_alg)?;
                Ok(Safe::Encrypted {
                    info,
                    algorithm,
                    iterations,
                })
            }
            other => Err(Error::UnsupportedContentType(other)),
        })
        .collect()
}

fn parse_safe_contents(data: &[u8]) -> Result<Vec<ParsedBag>> {
    let bags = Vec::<SafeBagRecord>::from_der(data)?;
    let mut parsed = Vec::with_capacity(bags.len());

    for (index, bag) in bags.into_iter().enumerate() {
        let attributes = match bag.bag_attributes {
            Some(ref raw) => BagAttributes::decode(raw)?,
            None => BagAttributes::default(),
        };

        let item = match bag.bag_id {
            oid::PKCS_12_PKCS8_KEY_BAG_OID => BagItem::PrivateKey(bag.bag_value.to_der()?),
            oid::PKCS_12_SECRET_BAG_OID => {
                let secret_bag = SecretBag::from_der(&bag.bag_value.to_der()?)?;
                BagItem::SecretKey(secret_bag.secret_value.into_bytes())
            }
            oid::PKCS_12_CERT_BAG_OID => {
                let cert_bag = CertBag::from_der(&bag.bag_value.to_der()?)?;
                if cert_bag.cert_id != oid::CERT_TYPE_X509_CERTIFICATE_OID {
                    return Err(Error::UnsupportedCertificateType);
                }
                BagItem::Certificate(Certificate::from_der(cert_bag.cert_value.as_bytes())?)
            }
            other => {
                debug!(bag_id = %other, "skipping unsupported safe bag");
                continue;
            }
        };

        parsed.push(ParsedBag {
            index,
            item,
            attributes,
        });
    }

    Ok(parsed)
}

/// Decode a PFX file into entries
pub(crate) fn load(data: &[u8], password: Option<&str>, import_policy: ImportPolicy) -> Result<Loaded> {
    let parts = decode_pfx(data)?;
    let mut protection = Protection::default();
    let mut report = LoadReport::default();
    let mut password = password;

    // iteration ceilings of encrypted blocks are enforced before the MAC is checked
    let safes = decode_safes(&parts.auth_safe, password)?;

    match (parts.mac_data, password) {
        (Some(raw), Some(given)) => {
            let mac_data = MacData::from_der(raw)?;
            let iterations = mac::iteration_count(&mac_data)?;
            let algorithm = mac::algorithm_name(&mac_data.mac.algorithm.oid)?;

            let verified_with = verify_mac(&mac_data, given, &parts.auth_safe).map_err(Error::integrity)?;
            debug!(algorithm, iterations, "MAC verified");
            password = Some(verified_with);

            protection.mac_algorithm = Some(algorithm.to_owned());
            protection.mac_iterations = Some(iterations);
            report.mac_verified = true;
        }
        (Some(_), None) => debug!("no password given, MAC not checked"),
        (None, _) => protection.mac_algorithm = Some(NONE.to_owned()),
    }

    let mut bags = Vec::new();
    let mut encrypted_seen = false;

    for safe in safes {
        match safe {
            Safe::Plain(contents) => {
                trace!("loading Data safe contents");
                bags.extend(parse_safe_contents(contents.as_bytes())?);
            }
            Safe::Skipped => {
                encrypted_seen = true;
                debug!("no password given, skipping EncryptedData safe contents");
                report.skipped_encrypted_blocks += 1;
            }
            Safe::Encrypted {
                info,
                algorithm,
                iterations,
            } => {
                encrypted_seen = true;
                debug!(%algorithm, iterations, "loading EncryptedData safe contents");

                let password = password.unwrap_or_default();
                bags.extend(decrypt_safe_contents(&info, password).map_err(Error::integrity)?);

                protection.cert_algorithm = Some(algorithm);
                protection.cert_iterations = Some(iterations);
            }
        }
    }

    let has_certs = bags.iter().any(|b| matches!(b.item, BagItem::Certificate(_)));
    if !encrypted_seen && (has_certs || parts.mac_data.is_none()) {
        protection.cert_algorithm = Some(NONE.to_owned());
    }

    let entries = assemble(bags, import_policy, &mut report)?;
    debug!(
        entries = entries.len(),
        private_keys = entries.count(EntryKind::PrivateKey),
        secret_keys = entries.count(EntryKind::SecretKey),
        certificates = entries.certificate_count(),
        "keystore loaded"
    );

    Ok(Loaded {
        entries,
        protection,
        report,
    })
}

// Turn decoded bags into entries and rebuild private key chains
fn assemble(bags: Vec<ParsedBag>, import_policy: ImportPolicy, report: &mut LoadReport) -> Result<EntryStore> {
    let private_key_count = bags.iter().filter(|b| matches!(b.item, BagItem::PrivateKey(_))).count();
    let now = SystemTime::now();

    let mut entries = EntryStore::default();
    let mut key_aliases = Vec::new();
    let mut candidates = Vec::new();
    let mut all_certs = Vec::new();
    let mut counter = 0usize;
    let mut unfriendly_name = || {
        counter += 1;
        counter.to_string()
    };

    for bag in bags {
        let BagAttributes {
            alias,
            key_id,
            trusted_usage,
            extra,
        } = bag.attributes;

        let (is_private, data) = match bag.item {
            BagItem::PrivateKey(protected_key) => (
                true,
                EntryData::PrivateKey {
                    protected_key,
                    chain: Vec::new(),
                },
            ),
            BagItem::SecretKey(protected_key) => (false, EntryData::SecretKey { protected_key }),
            BagItem::Certificate(cert) => {
                let key_id = key_id.or_else(|| {
                    (private_key_count == 1 && bag.index == 0).then(|| PRIVATE_KEY_PLACEHOLDER_ID.to_vec())
                });
                all_certs.push(cert.clone());

                match trusted_usage {
                    Some(trusted_usage) => {
                        entries.put(Entry {
                            alias: alias.unwrap_or_else(&mut unfriendly_name),
                            created: now,
                            key_id,
                            attributes: extra,
                            data: EntryData::Certificate { cert, trusted_usage },
                        });
                    }
                    None => candidates.push(CertCandidate { cert, key_id, alias }),
                }
                continue;
            }
        };

        let key_id = match key_id {
            Some(key_id) => key_id,
            None if !is_private => SECRET_KEY_PLACEHOLDER_ID.to_vec(),
            None if private_key_count == 1 => PRIVATE_KEY_PLACEHOLDER_ID.to_vec(),
            None => {
                warn!("dropping private key bag without local key id");
                report.dropped_key_bags += 1;
                continue;
            }
        };

        let alias = alias.unwrap_or_else(&mut unfriendly_name);
        if is_private {
            key_aliases.push(alias.clone());
        }

        entries.put(Entry {
            alias,
            created: date_from_key_id(&key_id).unwrap_or(now),
            key_id: Some(key_id),
            attributes: extra,
            data,
        });
    }

    for alias in key_aliases {
        let chain = match entries.get(&alias) {
            Some(entry) if entry.kind() == EntryKind::PrivateKey => {
                let key_id = entry.key_id.as_deref().unwrap_or_default();
                build_chain(key_id, &entry.alias, &candidates, &all_certs)
            }
            _ => continue,
        };

        if chain.is_empty() {
            if !report.unchained_keys.contains(&alias) {
                report.unchained_keys.push(alias.clone());
            }
            if import_policy == ImportPolicy::Strict {
                warn!(%alias, "dropping private key without certificate");
                entries.remove(&alias);
            } else {
                debug!(%alias, "private key has no certificate");
            }
            continue;
        }

        if let Some(Entry {
            data: EntryData::PrivateKey { chain: slot, .. },
            ..
        }) = entries.get_mut(&alias)
        {
            *slot = chain;
        }
    }

    Ok(entries)
}

fn find_matched_certificate<'a>(key_id: &[u8], alias: &str, candidates: &'a [CertCandidate]) -> Option<&'a Certificate> {
    let mut key_id_match = None;
    let mut alias_match = None;

    for candidate in candidates {
        let alias_matches = candidate
            .alias
            .as_deref()
            .is_some_and(|a| a.to_lowercase() == alias.to_lowercase());

        if candidate.key_id.as_deref() == Some(key_id) {
            if alias_matches {
                return Some(&candidate.cert);
            }
            key_id_match = Some(&candidate.cert);
        } else if alias_matches {
            alias_match = Some(&candidate.cert);
        }
    }

    key_id_match.or(alias_match)
}

fn find_issuer<'a>(cert: &Certificate, all_certs: &'a [Certificate]) -> Option<&'a Certificate> {
    let mut fallback = None;

    for candidate in all_certs.iter().filter(|c| cert.is_issued_by(c)) {
        match (cert.authority_key_id(), candidate.subject_key_id()) {
            (None, _) => return Some(candidate),
            (Some(aki), Some(ski)) if aki == ski => return Some(candidate),
            (Some(_), Some(_)) => {}
            (Some(_), None) => fallback = Some(candidate),
        }
    }

    fallback
}

fn build_chain(key_id: &[u8], alias: &str, candidates: &[CertCandidate], all_certs: &[Certificate]) -> Vec<Certificate> {
    let mut chain: Vec<Certificate> = Vec::new();
    let mut current = find_matched_certificate(key_id, alias, candidates);

    while let Some(cert) = current {
        if chain.contains(cert) {
            debug!(%alias, subject = cert.subject(), "loop detected in certificate chain");
            break;
        }
        chain.push(cert.clone());
        if cert.is_self_signed() {
            break;
        }
        current = find_issuer(cert, all_certs);
    }

    chain
}

fn data_content_info(data: &[u8]) -> Result<ContentInfo> {
    Ok(ContentInfo {
        content_type: oid::CONTENT_TYPE_DATA_OID,
        content: Any::from_der(&OctetString::new(data)?.to_der()?)?,
    })
}

fn encrypted_content_info(algorithm: &str, iterations: u64, data: &[u8], password: &str) -> Result<ContentInfo> {
    let (alg_id, encrypted) = pbe::encrypt(algorithm, iterations, data, password)?;

    let encrypted_data = EncryptedData {
        version: CmsVersion::V0,
        enc_content_info: EncryptedContentInfo {
            content_type: oid::CONTENT_TYPE_DATA_OID,
            content_enc_alg: alg_id,
            encrypted_content: Some(OctetString::new(encrypted)?),
        },
        unprotected_attrs: None,
    };

    Ok(ContentInfo {
        content_type: oid::CONTENT_TYPE_ENCRYPTED_DATA_OID,
        content: Any::from_der(&encrypted_data.to_der()?)?,
    })
}

fn key_bags(entries: &EntryStore) -> Result<Vec<SafeBagRecord>> {
    let mut bags = Vec::new();

    for entry in entries.iter() {
        let (bag_id, bag_value) = match &entry.data {
            EntryData::PrivateKey { protected_key, .. } => {
                (oid::PKCS_12_PKCS8_KEY_BAG_OID, Any::from_der(protected_key)?)
            }
            EntryData::SecretKey { protected_key } => {
                let secret_bag = SecretBag {
                    secret_type_id: oid::PKCS_12_PKCS8_KEY_BAG_OID,
                    secret_value: OctetString::new(protected_key.as_slice())?,
                };
                (oid::PKCS_12_SECRET_BAG_OID, Any::from_der(&secret_bag.to_der()?)?)
            }
            EntryData::Certificate { .. } => continue,
        };

        bags.push(SafeBagRecord {
            bag_id,
            bag_value,
            bag_attributes: entry.bag_attributes().encode()?,
        });
    }

    Ok(bags)
}

fn cert_bag(cert: &Certificate, attributes: &BagAttributes) -> Result<SafeBagRecord> {
    let cert_bag = CertBag {
        cert_id: oid::CERT_TYPE_X509_CERTIFICATE_OID,
        cert_value: OctetString::new(cert.as_der())?,
    };

    Ok(SafeBagRecord {
        bag_id: oid::PKCS_12_CERT_BAG_OID,
        bag_value: Any::from_der(&cert_bag.to_der()?)?,
        bag_attributes: attributes.encode()?,
    })
}

fn cert_bags(entries: &EntryStore) -> Result<Vec<SafeBagRecord>> {
    let mut bags = Vec::new();

    for entry in entries.iter() {
        let certs = match &entry.data {
            EntryData::PrivateKey { chain, .. } => chain.as_slice(),
            EntryData::Certificate { cert, .. } => std::slice::from_ref(cert),
            EntryData::SecretKey { .. } => continue,
        };

        for (index, cert) in certs.iter().enumerate() {
            let attributes = if index == 0 {
                entry.bag_attributes()
            } else {
                // chain members carry only their subject as friendly name
                BagAttributes {
                    alias: Some(cert.subject_rfc2253()?),
                    ..Default::default()
                }
            };
            bags.push(cert_bag(cert, &attributes)?);
        }
    }

    Ok(bags)
}

/// Encode entries as a PFX file, resolving and caching protection choices.
///
/// A `None` password writes a passwordless file and leaves the cached choices untouched.
pub(crate) fn store(
    entries: &EntryStore,
    protection: &mut Protection,
    policy: &AlgorithmPolicy,
    password: Option<&str>,
) -> Result<Vec<u8>> {
    let mut resolved = protection.clone();
    let passwordless = password.is_none();
    if passwordless {
        resolved.cert_algorithm = Some(NONE.to_owned());
        resolved.mac_algorithm = Some(NONE.to_owned());
    }
    let password = password.unwrap_or_default();

    let mut safes = Vec::new();

    if entries.iter().any(Entry::is_key) {
        safes.push(data_content_info(&key_bags(entries)?.to_der()?)?);
    }

    let certificate_count = entries.certificate_count();
    if certificate_count > 0 {
        let algorithm = resolved
            .cert_algorithm
            .get_or_insert_with(|| policy.default_algorithm(Purpose::CertProtection))
            .clone();
        let contents = cert_bags(entries)?.to_der()?;

        if is_none(&algorithm) {
            safes.push(data_content_info(&contents)?);
        } else {
            let iterations = *resolved
                .cert_iterations
                .get_or_insert_with(|| policy.default_iteration_count(Purpose::CertProtection));
            safes.push(encrypted_content_info(&algorithm, iterations, &contents, password)?);
        }
    }

    let auth_safe = safes.to_der()?;

    let mac_algorithm = resolved
        .mac_algorithm
        .get_or_insert_with(|| policy.default_algorithm(Purpose::Mac))
        .clone();
    let mac_data = if is_none(&mac_algorithm) {
        None
    } else {
        let iterations = *resolved
            .mac_iterations
            .get_or_insert_with(|| policy.default_iteration_count(Purpose::Mac));
        Some(mac::compute(&mac_algorithm, iterations, password, &auth_safe)?)
    };

    let pfx = Pfx {
        version: Version::V3,
        auth_safe: data_content_info(&auth_safe)?,
        mac_data,
    };
    let encoded = pfx.to_der()?;

    debug!(
        entries = entries.len(),
        certificates = certificate_count,
        cert_protection = resolved.cert_algorithm.as_deref().unwrap_or(NONE),
        mac = %mac_algorithm,
        "keystore stored"
    );

    if !passwordless {
        *protection = resolved;
    }
    Ok(encoded)
}

/// True when the file has neither encrypted safe contents nor a MAC
pub(crate) fn is_passwordless(data: &[u8]) -> Result<bool> {
    let parts = decode_pfx(data)?;
    let safes = Vec::<ContentInfo>::from_der(&parts.auth_safe)?;

    if safes
        .iter()
        .any(|s| s.content_type == oid::CONTENT_TYPE_ENCRYPTED_DATA_OID)
    {
        return Ok(false);
    }
    Ok(parts.mac_data.is_none())
}

/// Match the first 24 bytes against the known PFX header shapes
pub(crate) fn probe(header: &[u8]) -> bool {
    let Some(header) = header.get(..24) else {
        return false;
    };

    let mut words = [0u64; 3];
    for (word, chunk) in words.iter_mut().zip(header.chunks_exact(8)) {
        *word = chunk.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b));
    }

    HEADER_PATTERNS.iter().zip(HEADER_MASKS.iter()).any(|(pattern, mask)| {
        pattern
            .iter()
            .zip(mask)
            .zip(words)
            .all(|((p, m), w)| w & m == *p)
    })
}
