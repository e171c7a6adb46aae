use std::fmt;

use cms::cert::x509::name::Name;
use der::Decode;
use x509_parser::extensions::ParsedExtension;

use crate::Result;

/// X.509 certificate wrapper
#[derive(Clone)]
pub struct Certificate {
    pub(crate) data: Vec<u8>,
    pub(crate) subject: String,
    pub(crate) issuer: String,
    pub(crate) raw_subject: Vec<u8>,
    pub(crate) raw_issuer: Vec<u8>,
    pub(crate) subject_key_id: Option<Vec<u8>>,
    pub(crate) authority_key_id: Option<Vec<u8>>,
}

impl Certificate {
    /// Create certificate from DER encoding
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)?;

        let mut subject_key_id = None;
        let mut authority_key_id = None;
        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(ski) => subject_key_id = Some(ski.0.to_vec()),
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    authority_key_id = aki.key_identifier.as_ref().map(|k| k.0.to_vec())
                }
                _ => {}
            }
        }

        Ok(Self {
            data: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            raw_subject: cert.subject().as_raw().to_vec(),
            raw_issuer: cert.issuer().as_raw().to_vec(),
            subject_key_id,
            authority_key_id,
        })
    }

    /// Get certificate subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get certificate issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Get certificate data in DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }

    /// Subject key identifier extension value, if present
    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.subject_key_id.as_deref()
    }

    /// Key identifier from the authority key identifier extension, if present
    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.authority_key_id.as_deref()
    }

    /// Subject and issuer names are equal
    pub fn is_self_signed(&self) -> bool {
        self.raw_subject == self.raw_issuer
    }

    /// Subject in RFC 2253 form: most significant RDN last, no space after separators
    pub(crate) fn subject_rfc2253(&self) -> Result<String> {
        Ok(Name::from_der(&self.raw_subject)?.to_string())
    }

    pub(crate) fn is_issued_by(&self, issuer: &Certificate) -> bool {
        self.raw_issuer == issuer.raw_subject
    }
}

// Certificates compare by their encoding
impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("data", &"<X.509>")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .finish()
    }
}
