//!
//! Algorithm selection for certificate protection, key protection and integrity (MAC).
//!
//! An [AlgorithmPolicy] is built once and handed to [KeyStore](crate::KeyStore) at construction;
//! nothing in this crate reads process-wide state after that.
//!
use std::{env, fmt, str::FromStr};

use der::{Any, asn1::ObjectIdentifier};
use serde::Deserialize;

use crate::{Result, error::Error, oid, pbe};

/// Upper bound for any PBE or MAC iteration count, both when configuring and when decoding
pub const MAX_ITERATION_COUNT: u64 = 5_000_000;

/// Algorithm name meaning "no protection"
pub const NONE: &str = "NONE";

const DEFAULT_CERT_PBE_ALGORITHM: &str = "PBEWithHmacSHA256AndAES_256";
const DEFAULT_KEY_PBE_ALGORITHM: &str = "PBEWithHmacSHA256AndAES_256";
const DEFAULT_MAC_ALGORITHM: &str = "HmacPBESHA256";
const DEFAULT_PBE_ITERATION_COUNT: u64 = 10000;
const DEFAULT_MAC_ITERATION_COUNT: u64 = 10000;

const LEGACY_CERT_PBE_ALGORITHM: &str = "PBEWithSHA1AndRC2_40";
const LEGACY_KEY_PBE_ALGORITHM: &str = "PBEWithSHA1AndDESede";
const LEGACY_MAC_ALGORITHM: &str = "HmacPBESHA1";
const LEGACY_PBE_ITERATION_COUNT: u64 = 50000;
const LEGACY_MAC_ITERATION_COUNT: u64 = 100000;

const PBES2_PREFIX: &str = "pbewithhmacsha";

const ENV_PREFIX: &str = "PFX_KEYSTORE_";

// Static PBE registry, names compared case-insensitively
const PBE_REGISTRY: &[(&str, ObjectIdentifier)] = &[
    ("PBEWithSHA1AndDESede", oid::PBE_WITH_SHA_AND3_KEY_TRIPLE_DES_CBC_OID),
    ("PBEWithSHA1AndDESede2", oid::PBE_WITH_SHA_AND2_KEY_TRIPLE_DES_CBC_OID),
    ("PBEWithSHA1AndRC2_40", oid::PBE_WITH_SHA_AND_40BIT_RC2_CBC_OID),
    ("PBEWithSHA1AndRC2_128", oid::PBE_WITH_SHA_AND_128BIT_RC2_CBC_OID),
    ("PBEWithSHA1AndRC4_40", oid::PBE_WITH_SHA_AND_40BIT_RC4_OID),
    ("PBEWithSHA1AndRC4_128", oid::PBE_WITH_SHA_AND_128BIT_RC4_OID),
    ("PBEWithMD5AndDES", oid::PBE_WITH_MD5_AND_DES_CBC_OID),
    ("PBEWithSHA1AndDES", oid::PBE_WITH_SHA1_AND_DES_CBC_OID),
    ("PBES2", oid::PBES2_OID),
];

/// What an algorithm or iteration count is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Encryption of the certificate safe contents
    CertProtection,
    /// Encryption of individual private and secret keys
    KeyProtection,
    /// Integrity MAC over the authenticated safe
    Mac,
}

impl Purpose {
    fn algorithm_key(self) -> &'static str {
        match self {
            Purpose::CertProtection => "certProtectionAlgorithm",
            Purpose::KeyProtection => "keyProtectionAlgorithm",
            Purpose::Mac => "macAlgorithm",
        }
    }

    fn iteration_key(self) -> &'static str {
        match self {
            Purpose::CertProtection => "certPbeIterationCount",
            Purpose::KeyProtection => "keyPbeIterationCount",
            Purpose::Mac => "macIterationCount",
        }
    }

    fn env_suffixes(self) -> (&'static str, &'static str) {
        match self {
            Purpose::CertProtection => ("CERT_PROTECTION_ALGORITHM", "CERT_PBE_ITERATION_COUNT"),
            Purpose::KeyProtection => ("KEY_PROTECTION_ALGORITHM", "KEY_PBE_ITERATION_COUNT"),
            Purpose::Mac => ("MAC_ALGORITHM", "MAC_ITERATION_COUNT"),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm_key())
    }
}

/// An iteration count as it appears in configuration: either a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IterationSetting {
    Number(i64),
    Text(String),
}

/// Raw configuration overrides, typically deserialized from an application config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PolicyOverrides {
    /// When set, the legacy algorithms are used regardless of any other override
    pub legacy: bool,
    pub cert_protection_algorithm: Option<String>,
    pub cert_pbe_iteration_count: Option<IterationSetting>,
    pub key_protection_algorithm: Option<String>,
    pub key_pbe_iteration_count: Option<IterationSetting>,
    pub mac_algorithm: Option<String>,
    pub mac_iteration_count: Option<IterationSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PurposeOverride {
    algorithm: Option<String>,
    iterations: Option<u64>,
}

/// Immutable algorithm selection policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgorithmPolicy {
    legacy: bool,
    cert: PurposeOverride,
    key: PurposeOverride,
    mac: PurposeOverride,
}

impl AlgorithmPolicy {
    /// Policy with the modern defaults and no overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy which always answers with the legacy algorithms
    pub fn legacy() -> Self {
        Self {
            legacy: true,
            ..Self::default()
        }
    }

    /// Build a policy from configuration overrides, validating every iteration count
    pub fn from_overrides(overrides: &PolicyOverrides) -> Result<Self> {
        let mut policy = Self {
            legacy: overrides.legacy,
            ..Self::default()
        };

        let purposes = [
            (
                Purpose::CertProtection,
                &overrides.cert_protection_algorithm,
                &overrides.cert_pbe_iteration_count,
            ),
            (
                Purpose::KeyProtection,
                &overrides.key_protection_algorithm,
                &overrides.key_pbe_iteration_count,
            ),
            (Purpose::Mac, &overrides.mac_algorithm, &overrides.mac_iteration_count),
        ];

        for (purpose, algorithm, iterations) in purposes {
            let slot = policy.slot_mut(purpose);
            slot.algorithm = algorithm.as_deref().and_then(non_empty);
            slot.iterations = match iterations {
                None => None,
                Some(IterationSetting::Number(n)) => Some(validate_iteration_count(purpose, &n.to_string())?),
                Some(IterationSetting::Text(s)) if s.trim().is_empty() => None,
                Some(IterationSetting::Text(s)) => Some(validate_iteration_count(purpose, s)?),
            };
        }

        Ok(policy)
    }

    /// Build a policy from `PFX_KEYSTORE_*` environment variables.
    ///
    /// The presence of `PFX_KEYSTORE_LEGACY` turns legacy mode on.
    pub fn from_env() -> Result<Self> {
        let read = |suffix: &str| env::var(format!("{ENV_PREFIX}{suffix}")).ok();

        let mut overrides = PolicyOverrides {
            legacy: env::var_os(format!("{ENV_PREFIX}LEGACY")).is_some(),
            ..PolicyOverrides::default()
        };

        let (alg, ic) = Purpose::CertProtection.env_suffixes();
        overrides.cert_protection_algorithm = read(alg);
        overrides.cert_pbe_iteration_count = read(ic).map(IterationSetting::Text);

        let (alg, ic) = Purpose::KeyProtection.env_suffixes();
        overrides.key_protection_algorithm = read(alg);
        overrides.key_pbe_iteration_count = read(ic).map(IterationSetting::Text);

        let (alg, ic) = Purpose::Mac.env_suffixes();
        overrides.mac_algorithm = read(alg);
        overrides.mac_iteration_count = read(ic).map(IterationSetting::Text);

        Self::from_overrides(&overrides)
    }

    /// Override the algorithm for one purpose. An empty name restores the default.
    pub fn with_algorithm(mut self, purpose: Purpose, algorithm: &str) -> Self {
        self.slot_mut(purpose).algorithm = non_empty(algorithm);
        self
    }

    /// Override the iteration count for one purpose
    pub fn with_iteration_count(mut self, purpose: Purpose, iterations: u64) -> Result<Self> {
        self.slot_mut(purpose).iterations = Some(validate_iteration_count(purpose, &iterations.to_string())?);
        Ok(self)
    }

    /// Whether legacy mode is on
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Default algorithm name for a purpose
    pub fn default_algorithm(&self, purpose: Purpose) -> String {
        if self.legacy {
            return match purpose {
                Purpose::CertProtection => LEGACY_CERT_PBE_ALGORITHM,
                Purpose::KeyProtection => LEGACY_KEY_PBE_ALGORITHM,
                Purpose::Mac => LEGACY_MAC_ALGORITHM,
            }
            .to_owned();
        }

        match &self.slot(purpose).algorithm {
            Some(algorithm) => algorithm.clone(),
            None => match purpose {
                Purpose::CertProtection => DEFAULT_CERT_PBE_ALGORITHM,
                Purpose::KeyProtection => DEFAULT_KEY_PBE_ALGORITHM,
                Purpose::Mac => DEFAULT_MAC_ALGORITHM,
            }
            .to_owned(),
        }
    }

    /// Default iteration count for a purpose
    pub fn default_iteration_count(&self, purpose: Purpose) -> u64 {
        if self.legacy {
            return match purpose {
                Purpose::Mac => LEGACY_MAC_ITERATION_COUNT,
                _ => LEGACY_PBE_ITERATION_COUNT,
            };
        }

        self.slot(purpose).iterations.unwrap_or(match purpose {
            Purpose::Mac => DEFAULT_MAC_ITERATION_COUNT,
            _ => DEFAULT_PBE_ITERATION_COUNT,
        })
    }

    fn slot(&self, purpose: Purpose) -> &PurposeOverride {
        match purpose {
            Purpose::CertProtection => &self.cert,
            Purpose::KeyProtection => &self.key,
            Purpose::Mac => &self.mac,
        }
    }

    fn slot_mut(&mut self, purpose: Purpose) -> &mut PurposeOverride {
        match purpose {
            Purpose::CertProtection => &mut self.cert,
            Purpose::KeyProtection => &mut self.key,
            Purpose::Mac => &mut self.mac,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_owned()) }
}

fn validate_iteration_count(purpose: Purpose, value: &str) -> Result<u64> {
    let invalid = || Error::InvalidConfiguration {
        key: purpose.iteration_key().to_owned(),
        value: value.to_owned(),
    };
    let number: i64 = value.trim().parse().map_err(|_| invalid())?;
    if number <= 0 || number as u64 > MAX_ITERATION_COUNT {
        return Err(invalid());
    }
    Ok(number as u64)
}

/// Check a decoded iteration count against [MAX_ITERATION_COUNT]
pub(crate) fn check_iteration_count(iterations: u64) -> Result<u64> {
    if iterations > MAX_ITERATION_COUNT {
        Err(Error::IterationCountTooLarge(iterations))
    } else {
        Ok(iterations)
    }
}

/// Map a PBE algorithm name onto its object identifier
pub fn algorithm_name_to_oid(name: &str) -> Result<ObjectIdentifier> {
    if name.to_ascii_lowercase().starts_with(PBES2_PREFIX) {
        return Ok(oid::PBES2_OID);
    }

    if let Some((_, oid)) = PBE_REGISTRY.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        return Ok(*oid);
    }

    // dotted form is accepted for registered identifiers only
    match ObjectIdentifier::from_str(name) {
        Ok(oid) if PBE_REGISTRY.iter().any(|(_, o)| *o == oid) => Ok(oid),
        _ => Err(Error::AlgorithmNotSupported(name.to_owned())),
    }
}

/// Map a PBE object identifier and its parameters back onto an algorithm name.
///
/// For PBES2 the name is derived from the parameters, which carry the concrete PRF and cipher.
pub fn oid_and_params_to_algorithm_name(oid: &ObjectIdentifier, params: Option<&Any>) -> Result<String> {
    if *oid == oid::PBES2_OID
        && let Some(params) = params
    {
        return pbe::pbes2_algorithm_name(params);
    }

    PBE_REGISTRY
        .iter()
        .find(|(_, o)| o == oid)
        .map(|(name, _)| (*name).to_owned())
        .ok_or_else(|| Error::AlgorithmNotSupported(oid.to_string()))
}
