//!
//! Password-based integrity MAC (`HmacPBESHA*`) over the authenticated safe
//!
use cms::cert::x509::spki::AlgorithmIdentifierOwned;
use der::asn1::{ObjectIdentifier, OctetString};
use hmac::{Hmac, Mac, digest::Digest};
use pkcs12::{digest_info::DigestInfo, kdf, mac_data::MacData};
use rand::random;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::{Result, error::Error, oid, pbe::SALT_LEN, policy::check_iteration_count};

const MAC_PREFIX: &str = "hmacpbe";

// Derives the MAC key per RFC 7292 appendix B and feeds the data into a keyed HMAC
macro_rules! hmac_pbe {
    ($digest:ty, $password:expr, $salt:expr, $iterations:expr, $data:expr) => {{
        let key = Zeroizing::new(kdf::derive_key_utf8::<$digest>(
            $password,
            $salt,
            kdf::Pkcs12KeyType::Mac,
            $iterations,
            <$digest>::output_size(),
        )?);
        let mut hmac = Hmac::<$digest>::new_from_slice(&key).map_err(|_| Error::InvalidLength)?;
        hmac.update($data);
        hmac
    }};
}

/// Digest identifier for a MAC algorithm name such as `HmacPBESHA256`
pub(crate) fn digest_oid(algorithm: &str) -> Result<ObjectIdentifier> {
    let lower = algorithm.to_ascii_lowercase().replace('-', "");
    match lower.strip_prefix(MAC_PREFIX) {
        Some("sha1") => Ok(oid::SHA1_OID),
        Some("sha224") => Ok(oid::SHA224_OID),
        Some("sha256") => Ok(oid::SHA256_OID),
        Some("sha384") => Ok(oid::SHA384_OID),
        Some("sha512") => Ok(oid::SHA512_OID),
        _ => Err(Error::AlgorithmNotSupported(algorithm.to_owned())),
    }
}

/// MAC algorithm name for a digest identifier
pub(crate) fn algorithm_name(digest_oid: &ObjectIdentifier) -> Result<&'static str> {
    match *digest_oid {
        oid::SHA1_OID => Ok("HmacPBESHA1"),
        oid::SHA224_OID => Ok("HmacPBESHA224"),
        oid::SHA256_OID => Ok("HmacPBESHA256"),
        oid::SHA384_OID => Ok("HmacPBESHA384"),
        oid::SHA512_OID => Ok("HmacPBESHA512"),
        other => Err(Error::AlgorithmNotSupported(other.to_string())),
    }
}

/// Iteration count of a decoded MacData, checked against the ceiling
pub(crate) fn iteration_count(mac_data: &MacData) -> Result<u64> {
    if mac_data.iterations <= 0 {
        return Err(Error::MalformedStructure("MacData iteration count must be positive"));
    }
    check_iteration_count(mac_data.iterations as u64)
}

fn digest(digest_oid: &ObjectIdentifier, password: &str, salt: &[u8], iterations: i32, data: &[u8]) -> Result<Vec<u8>> {
    Ok(match *digest_oid {
        oid::SHA1_OID => hmac_pbe!(Sha1, password, salt, iterations, data)
            .finalize()
            .into_bytes()
            .to_vec(),
        oid::SHA224_OID => hmac_pbe!(Sha224, password, salt, iterations, data)
            .finalize()
            .into_bytes()
            .to_vec(),
        oid::SHA256_OID => hmac_pbe!(Sha256, password, salt, iterations, data)
            .finalize()
            .into_bytes()
            .to_vec(),
        oid::SHA384_OID => hmac_pbe!(Sha384, password, salt, iterations, data)
            .finalize()
            .into_bytes()
            .to_vec(),
        oid::SHA512_OID => hmac_pbe!(Sha512, password, salt, iterations, data)
            .finalize()
            .into_bytes()
            .to_vec(),
        other => return Err(Error::AlgorithmNotSupported(other.to_string())),
    })
}

/// Verify the MAC in constant time
pub(crate) fn verify(mac_data: &MacData, password: &str, data: &[u8]) -> Result<()> {
    let iterations = iteration_count(mac_data)? as i32;
    let salt = mac_data.mac_salt.as_bytes();
    let expected = mac_data.mac.digest.as_bytes();

    match mac_data.mac.algorithm.oid {
        oid::SHA1_OID => hmac_pbe!(Sha1, password, salt, iterations, data).verify_slice(expected)?,
        oid::SHA224_OID => hmac_pbe!(Sha224, password, salt, iterations, data).verify_slice(expected)?,
        oid::SHA256_OID => hmac_pbe!(Sha256, password, salt, iterations, data).verify_slice(expected)?,
        oid::SHA384_OID => hmac_pbe!(Sha384, password, salt, iterations, data).verify_slice(expected)?,
        oid::SHA512_OID => hmac_pbe!(Sha512, password, salt, iterations, data).verify_slice(expected)?,
        other => return Err(Error::AlgorithmNotSupported(other.to_string())),
    }
    Ok(())
}

/// Compute MacData over the data with a fresh salt
pub(crate) fn compute(algorithm: &str, iterations: u64, password: &str, data: &[u8]) -> Result<MacData> {
    let digest_oid = digest_oid(algorithm)?;
    let iterations = check_iteration_count(iterations)?;
    let salt: [u8; SALT_LEN] = random();

    let digest = digest(&digest_oid, password, &salt, iterations as i32, data)?;

    Ok(MacData {
        mac: DigestInfo {
            algorithm: AlgorithmIdentifierOwned {
                oid: digest_oid,
                parameters: None,
            },
            digest: OctetString::new(digest)?,
        },
        mac_salt: OctetString::new(salt.to_vec())?,
        iterations: iterations as _,
    })
}
