//!
//! SafeBag attribute codec: friendly name, local key id, trusted key usage and opaque passthrough attributes
//!
use std::fmt;

use der::{
    Any, Decode, Encode, Reader, SliceReader, Tag, Tagged,
    asn1::{BmpString, ObjectIdentifier, OctetString},
};

use crate::{Result, error::Error, oid};

/// A single bag attribute: identifier plus its value set, kept in encoded form
#[derive(Clone, PartialEq, Eq)]
pub struct Pkcs12Attribute {
    oid: ObjectIdentifier,
    values: Vec<Any>,
}

impl Pkcs12Attribute {
    /// Create an attribute from an identifier and a list of DER values
    pub fn new<I>(oid: ObjectIdentifier, values: I) -> Self
    where
        I: IntoIterator<Item = Any>,
    {
        Self {
            oid,
            values: values.into_iter().collect(),
        }
    }

    /// Friendly name attribute (BMPString)
    pub fn friendly_name(name: &str) -> Result<Self> {
        let value = Any::from_der(&BmpString::from_utf8(name)?.to_der()?)?;
        Ok(Self::new(oid::FRIENDLY_NAME_OID, [value]))
    }

    /// Local key id attribute (OCTET STRING)
    pub fn local_key_id(key_id: &[u8]) -> Result<Self> {
        let value = Any::from_der(&OctetString::new(key_id)?.to_der()?)?;
        Ok(Self::new(oid::LOCAL_KEY_ID_OID, [value]))
    }

    /// Trusted key usage attribute (one or more OIDs)
    pub fn trusted_key_usage(usage: &[ObjectIdentifier]) -> Result<Self> {
        let values = usage
            .iter()
            .map(|o| Ok(Any::from_der(&o.to_der()?)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(oid::ORACLE_TRUSTED_KEY_USAGE_OID, values))
    }

    /// Attribute identifier
    pub fn oid(&self) -> &ObjectIdentifier {
        &self.oid
    }

    /// Attribute values
    pub fn values(&self) -> &[Any] {
        &self.values
    }

    fn is_well_known(&self) -> bool {
        matches!(
            self.oid,
            oid::FRIENDLY_NAME_OID | oid::LOCAL_KEY_ID_OID | oid::ORACLE_TRUSTED_KEY_USAGE_OID
        )
    }

    // SEQUENCE { oid, SET { values } } with values kept in their original order
    fn to_any(&self) -> Result<Any> {
        let mut set = Vec::new();
        for value in &self.values {
            value.encode_to_vec(&mut set)?;
        }
        let mut body = self.oid.to_der()?;
        Any::new(Tag::Set, set)?.encode_to_vec(&mut body)?;
        Ok(Any::new(Tag::Sequence, body)?)
    }

    fn from_any(attribute: &Any) -> Result<Self> {
        let malformed = |e: der::Error| Error::MalformedAttribute(e.to_string());

        if attribute.tag() != Tag::Sequence {
            return Err(Error::MalformedAttribute(format!("expected SEQUENCE, got {}", attribute.tag())));
        }

        let mut reader = SliceReader::new(attribute.value()).map_err(malformed)?;
        let oid: ObjectIdentifier = reader.decode().map_err(malformed)?;
        let set: Any = reader.decode().map_err(malformed)?;
        if set.tag() != Tag::Set || !reader.is_finished() {
            return Err(Error::MalformedAttribute(format!("attribute {oid} is not an [oid, set] pair")));
        }

        let mut values = Vec::new();
        let mut reader = SliceReader::new(set.value()).map_err(malformed)?;
        while !reader.is_finished() {
            values.push(reader.decode::<Any>().map_err(malformed)?);
        }

        Ok(Self { oid, values })
    }
}

impl fmt::Debug for Pkcs12Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs12Attribute")
            .field("oid", &self.oid)
            .field("values", &self.values.len())
            .finish()
    }
}

/// Decoded bag attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BagAttributes {
    pub alias: Option<String>,
    pub key_id: Option<Vec<u8>>,
    pub trusted_usage: Option<Vec<ObjectIdentifier>>,
    pub extra: Vec<Pkcs12Attribute>,
}

fn first_value<'a>(attribute: &'a Pkcs12Attribute) -> Result<&'a Any> {
    attribute
        .values
        .first()
        .ok_or_else(|| Error::MalformedAttribute(format!("attribute {} has no values", attribute.oid)))
}

impl BagAttributes {
    /// Decode the raw `SET OF PKCS12Attribute`
    pub fn decode(raw: &Any) -> Result<Self> {
        if raw.tag() != Tag::Set {
            return Err(Error::MalformedAttribute(format!("expected SET, got {}", raw.tag())));
        }

        let mut result = Self::default();
        let mut reader = SliceReader::new(raw.value())?;

        while !reader.is_finished() {
            let any: Any = reader
                .decode()
                .map_err(|e| Error::MalformedAttribute(e.to_string()))?;
            let attribute = Pkcs12Attribute::from_any(&any)?;

            match attribute.oid {
                oid::FRIENDLY_NAME_OID => {
                    let name = BmpString::from_der(&first_value(&attribute)?.to_der()?)?;
                    result.alias = Some(name.to_string());
                }
                oid::LOCAL_KEY_ID_OID => {
                    let key_id = OctetString::from_der(&first_value(&attribute)?.to_der()?)?;
                    result.key_id = Some(key_id.as_bytes().to_vec());
                }
                oid::ORACLE_TRUSTED_KEY_USAGE_OID => {
                    first_value(&attribute)?;
                    let usage = attribute
                        .values
                        .iter()
                        .map(|v| Ok(ObjectIdentifier::from_der(&v.to_der()?)?))
                        .collect::<Result<Vec<_>>>()?;
                    result.trusted_usage = Some(usage);
                }
                _ => result.push_extra(attribute),
            }
        }

        Ok(result)
    }

    /// Encode as a DER SET, or `None` when there is nothing to emit
    pub fn encode(&self) -> Result<Option<Any>> {
        let mut attributes = Vec::new();

        if let Some(ref alias) = self.alias {
            attributes.push(Pkcs12Attribute::friendly_name(alias)?);
        }
        if let Some(ref key_id) = self.key_id {
            attributes.push(Pkcs12Attribute::local_key_id(key_id)?);
        }
        if let Some(ref usage) = self.trusted_usage {
            attributes.push(Pkcs12Attribute::trusted_key_usage(usage)?);
        }
        attributes.extend(self.extra.iter().filter(|a| !a.is_well_known()).cloned());

        if attributes.is_empty() {
            return Ok(None);
        }

        let mut set = Vec::new();
        for attribute in &attributes {
            attribute.to_any()?.encode_to_vec(&mut set)?;
        }
        Ok(Some(Any::new(Tag::Set, set)?))
    }

    /// Add an opaque attribute unless an equal one is already present
    pub fn push_extra(&mut self, attribute: Pkcs12Attribute) {
        if !self.extra.contains(&attribute) {
            self.extra.push(attribute);
        }
    }

    /// All attributes as a flat list, well-known ones first
    pub fn to_list(&self) -> Result<Vec<Pkcs12Attribute>> {
        let mut list = Vec::new();
        if let Some(ref alias) = self.alias {
            list.push(Pkcs12Attribute::friendly_name(alias)?);
        }
        if let Some(ref key_id) = self.key_id {
            list.push(Pkcs12Attribute::local_key_id(key_id)?);
        }
        if let Some(ref usage) = self.trusted_usage {
            list.push(Pkcs12Attribute::trusted_key_usage(usage)?);
        }
        list.extend(self.extra.iter().filter(|a| !a.is_well_known()).cloned());
        Ok(list)
    }
}
