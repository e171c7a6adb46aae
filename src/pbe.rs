//!
//! Password-based encryption dispatch: PBES2 through `pkcs5`, legacy schemes through [Pbes1](crate::pbes1)
//!
use cms::cert::x509::spki::AlgorithmIdentifierOwned;
use der::{Any, Decode, Encode, Sequence, asn1::OctetString};
use pkcs5::pbes2::{self, EncryptionScheme, Kdf, Pbkdf2Prf};
use rand::random;
use zeroize::Zeroizing;

#[cfg(feature = "pbes1")]
use crate::pbes1::{PbeMode, Pbes1};
use crate::{
    Result,
    error::Error,
    oid,
    policy::{self, check_iteration_count},
};

/// Salt length for freshly generated PBE parameters
pub(crate) const SALT_LEN: usize = 20;

/// PBEParameter shared by the PKCS#12 v1 and PKCS#5 v1.5 schemes
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct PbeParameter {
    salt: OctetString,
    iterations: u64,
}

fn pbes1_params(alg: &AlgorithmIdentifierOwned) -> Result<PbeParameter> {
    let params = alg.parameters.as_ref().ok_or(Error::InvalidParameters)?;
    Ok(PbeParameter::from_der(&params.to_der()?)?)
}

fn pbes2_iterations(params: &pbes2::Parameters<'_>) -> Result<u64> {
    match &params.kdf {
        Kdf::Pbkdf2(p) => Ok(p.iteration_count as u64),
        _ => Err(Error::AlgorithmNotSupported("PBES2 with scrypt".to_owned())),
    }
}

/// Iteration count carried by the algorithm parameters, checked against the ceiling
pub(crate) fn iteration_count(alg: &AlgorithmIdentifierOwned) -> Result<u64> {
    let iterations = if alg.oid == oid::PBES2_OID {
        let params = alg.parameters.as_ref().ok_or(Error::InvalidParameters)?.to_der()?;
        pbes2_iterations(&pbes2::Parameters::from_der(&params)?)?
    } else {
        pbes1_params(alg)?.iterations
    };
    check_iteration_count(iterations)
}

/// Human readable name of the algorithm, e.g. `PBEWithHmacSHA256AndAES_256`
pub(crate) fn algorithm_name(alg: &AlgorithmIdentifierOwned) -> Result<String> {
    policy::oid_and_params_to_algorithm_name(&alg.oid, alg.parameters.as_ref())
}

pub(crate) fn pbes2_algorithm_name(params: &Any) -> Result<String> {
    let der = params.to_der()?;
    let params = pbes2::Parameters::from_der(&der)?;

    let prf = match &params.kdf {
        Kdf::Pbkdf2(p) => match p.prf {
            Pbkdf2Prf::HmacWithSha1 => "SHA1",
            Pbkdf2Prf::HmacWithSha224 => "SHA224",
            Pbkdf2Prf::HmacWithSha256 => "SHA256",
            Pbkdf2Prf::HmacWithSha384 => "SHA384",
            Pbkdf2Prf::HmacWithSha512 => "SHA512",
            #[allow(unreachable_patterns)]
            _ => return Err(Error::AlgorithmNotSupported("PBKDF2 PRF".to_owned())),
        },
        _ => return Err(Error::AlgorithmNotSupported("PBES2 with scrypt".to_owned())),
    };

    let cipher = match params.encryption {
        EncryptionScheme::Aes128Cbc { .. } => "AES_128",
        EncryptionScheme::Aes192Cbc { .. } => "AES_192",
        EncryptionScheme::Aes256Cbc { .. } => "AES_256",
        #[allow(unreachable_patterns)]
        _ => return Err(Error::AlgorithmNotSupported("PBES2 encryption scheme".to_owned())),
    };

    Ok(format!("PBEWithHmac{prf}And{cipher}"))
}

// Splits `PBEWithHmacSHA256AndAES_256` into its PRF and key size
fn parse_pbes2_name(name: &str) -> Result<(Pbkdf2Prf, usize)> {
    let unsupported = || Error::AlgorithmNotSupported(name.to_owned());
    let lower = name.to_ascii_lowercase();
    let rest = lower.strip_prefix("pbewithhmacsha").ok_or_else(unsupported)?;
    let (digest, cipher) = rest.split_once("and").ok_or_else(unsupported)?;

    let prf = match digest {
        "1" => Pbkdf2Prf::HmacWithSha1,
        "224" => Pbkdf2Prf::HmacWithSha224,
        "256" => Pbkdf2Prf::HmacWithSha256,
        "384" => Pbkdf2Prf::HmacWithSha384,
        "512" => Pbkdf2Prf::HmacWithSha512,
        _ => return Err(unsupported()),
    };

    let key_size = match cipher {
        "aes_128" => 128,
        "aes_192" => 192,
        "aes_256" => 256,
        _ => return Err(unsupported()),
    };

    Ok((prf, key_size))
}

/// Decrypt data protected with the given algorithm
pub(crate) fn decrypt(alg: &AlgorithmIdentifierOwned, data: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let iterations = iteration_count(alg)?;

    match alg.oid {
        oid::PBES2_OID => {
            let params = alg.parameters.as_ref().ok_or(Error::InvalidParameters)?.to_der()?;
            let params = pbes2::Parameters::from_der(&params)?;

            Ok(Zeroizing::new(
                params
                    .decrypt(password.as_bytes(), data)
                    .map_err(|e| Error::Pkcs5Error(format!("{e}")))?,
            ))
        }
        #[cfg(feature = "pbes1")]
        alg_oid if Pbes1::is_supported(&alg_oid) => {
            let params = pbes1_params(alg)?;
            Pbes1::new(alg_oid, params.salt.as_bytes(), iterations, PbeMode::Decrypt).encrypt_decrypt(data, password)
        }
        other => Err(Error::AlgorithmNotSupported(other.to_string())),
    }
}

/// Encrypt data with a named algorithm, fresh salt and the given iteration count
pub(crate) fn encrypt(
    algorithm: &str,
    iterations: u64,
    data: &[u8],
    password: &str,
) -> Result<(AlgorithmIdentifierOwned, Vec<u8>)> {
    let alg_oid = policy::algorithm_name_to_oid(algorithm)?;
    let iterations = check_iteration_count(iterations)?;

    match alg_oid {
        oid::PBES2_OID => {
            let (prf, key_size) = parse_pbes2_name(algorithm)?;
            let salt: [u8; SALT_LEN] = random();
            let iv: [u8; 16] = random();

            let mut params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(iterations as _, &salt, &iv)
                .map_err(|e| Error::Pkcs5Error(e.to_string()))?;
            if let Kdf::Pbkdf2(ref mut kdf) = params.kdf {
                kdf.prf = prf;
            }
            params.encryption = match key_size {
                128 => EncryptionScheme::Aes128Cbc { iv: &iv },
                192 => EncryptionScheme::Aes192Cbc { iv: &iv },
                _ => EncryptionScheme::Aes256Cbc { iv: &iv },
            };

            let encrypted = params
                .encrypt(password.as_bytes(), data)
                .map_err(|e| Error::Pkcs5Error(format!("{e}")))?;

            let alg_id = AlgorithmIdentifierOwned {
                oid: alg_oid,
                parameters: Some(Any::from_der(&params.to_der()?)?),
            };

            Ok((alg_id, encrypted))
        }
        #[cfg(feature = "pbes1")]
        alg_oid if Pbes1::is_supported(&alg_oid) => {
            let salt: [u8; SALT_LEN] = random();
            let salt = &salt[..Pbes1::salt_len(&alg_oid)];
            let encrypted =
                Pbes1::new(alg_oid, salt, iterations, PbeMode::Encrypt).encrypt_decrypt(data, password)?;

            let params = PbeParameter {
                salt: OctetString::new(salt)?,
                iterations,
            };

            let alg_id = AlgorithmIdentifierOwned {
                oid: alg_oid,
                parameters: Some(Any::from_der(&params.to_der()?)?),
            };
            Ok((alg_id, encrypted.to_vec()))
        }
        _ => Err(Error::AlgorithmNotSupported(algorithm.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbes2_roundtrip_and_name() {
        for name in [
            "PBEWithHmacSHA256AndAES_256",
            "PBEWithHmacSHA1AndAES_128",
            "PBEWithHmacSHA512AndAES_256",
        ] {
            let (alg, encrypted) = encrypt(name, 1000, b"secret material", "changeit").unwrap();
            assert_eq!(alg.oid, oid::PBES2_OID);
            assert_eq!(algorithm_name(&alg).unwrap(), name);
            assert_eq!(iteration_count(&alg).unwrap(), 1000);

            let decrypted = decrypt(&alg, &encrypted, "changeit").unwrap();
            assert_eq!(decrypted.as_slice(), b"secret material");
        }
    }

    #[cfg(feature = "pbes1")]
    #[test]
    fn test_pbes1_params() {
        let (alg, encrypted) = encrypt("PBEWithSHA1AndDES", 10, b"legacy", "pw").unwrap();
        assert_eq!(alg.oid, oid::PBE_WITH_SHA1_AND_DES_CBC_OID);
        assert_eq!(pbes1_params(&alg).unwrap().salt.as_bytes().len(), 8);
        assert_eq!(decrypt(&alg, &encrypted, "pw").unwrap().as_slice(), b"legacy");

        let (alg, _) = encrypt("PBEWithSHA1AndRC2_40", 10, b"legacy", "pw").unwrap();
        assert_eq!(pbes1_params(&alg).unwrap().salt.as_bytes().len(), SALT_LEN);
        assert_eq!(algorithm_name(&alg).unwrap(), "PBEWithSHA1AndRC2_40");
    }

    #[test]
    fn test_iteration_ceiling_is_checked_before_derivation() {
        let params = PbeParameter {
            salt: OctetString::new(vec![1u8; 20]).unwrap(),
            iterations: 5_000_001,
        };
        let alg = AlgorithmIdentifierOwned {
            oid: oid::PBE_WITH_SHA_AND3_KEY_TRIPLE_DES_CBC_OID,
            parameters: Some(Any::from_der(&params.to_der().unwrap()).unwrap()),
        };
        assert!(matches!(
            decrypt(&alg, &[0u8; 16], "pw"),
            Err(Error::IterationCountTooLarge(5_000_001))
        ));
    }

    #[test]
    fn test_unsupported_names() {
        assert!(matches!(
            encrypt("PBEWithHmacSHA256AndDES", 1, b"x", "pw"),
            Err(Error::AlgorithmNotSupported(_))
        ));
        assert!(matches!(
            encrypt("PBEWithSHA1AndRC4_128", 1, b"x", "pw"),
            Err(Error::AlgorithmNotSupported(_))
        ));
    }
}
