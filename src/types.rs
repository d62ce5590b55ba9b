//! Core type definitions for the WeChat Pay XML API.
//!
//! This module contains the request parameter set, the flat response record, the
//! tagged decode result and the supported signature schemes.

use crate::errors::{Result, WeChatPayError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Envelope and business status value meaning success.
pub const SUCCESS: &str = "SUCCESS";

/// A single scalar parameter value.
///
/// Only text and integers exist on the wire. There is deliberately no conversion from
/// `bool`: the gateway has no boolean encoding, so flags must be passed as the text
/// value the endpoint documents (e.g. `"Y"`, `"FORCE_CHECK"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Text value, written to XML as CDATA
    Text(String),
    /// Integer value, written to XML as raw text
    Integer(i128),
}

impl ParamValue {
    /// Returns `true` for empty text. Integers are never empty, `0` included.
    pub fn is_empty(&self) -> bool {
        matches!(self, ParamValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Text(value.clone())
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Integer(value as i128)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// The parameter set of one API call.
///
/// Entries are kept sorted by key, which makes signing and XML output deterministic.
/// Empty text values are never stored: inserting one removes the key, so an empty
/// value and an absent value both end up omitted from the request.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::types::Params;
///
/// let params = Params::new()
///     .with("out_trade_no", "1001")
///     .with("total_fee", 100)
///     .with("mch_id", "")
///     .with_opt("device_info", None::<String>);
///
/// assert_eq!(params.len(), 2);
/// assert!(!params.contains_key("mch_id"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`. An empty value removes the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }

    /// Sets `key` when `value` is `Some`, leaves the set untouched otherwise.
    pub fn insert_opt<V: Into<ParamValue>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Sets `key` only if it is not present yet.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        if !self.0.contains_key(&key) {
            self.insert(key, value);
        }
    }

    /// Builder form of [`Params::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder form of [`Params::insert_opt`].
    pub fn with_opt<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert_opt(key, value);
        self
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// A flat response record: the children of the `<xml>` root element.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text of field `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets field `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes field `key`, returning its text.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Returns `true` if field `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Envelope status.
    pub fn return_code(&self) -> Option<&str> {
        self.get("return_code")
    }

    /// Business status.
    pub fn result_code(&self) -> Option<&str> {
        self.get("result_code")
    }

    /// Converts the record into a caller-defined struct.
    ///
    /// All values are strings, so target fields must be `String`/`Option<String>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde::Deserialize;
    /// use wechatpay_rs::types::Record;
    ///
    /// #[derive(Deserialize)]
    /// struct Prepay {
    ///     prepay_id: String,
    ///     code_url: Option<String>,
    /// }
    ///
    /// let record: Record = [("prepay_id", "wx2016")].into_iter().collect();
    /// let prepay: Prepay = record.parse_into().unwrap();
    /// assert_eq!(prepay.prepay_id, "wx2016");
    /// assert!(prepay.code_url.is_none());
    /// ```
    pub fn parse_into<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(&self.0)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Consumes the record, returning the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for Record {
    fn from(map: BTreeMap<String, String>) -> Self {
        Record(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Result of decoding a gateway response body.
///
/// Some endpoints answer with non-XML text (bill downloads return CSV), so a body
/// that does not parse as an `<xml>` document is handed back untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayResponse {
    /// A validated `<xml>` record
    Record(Record),
    /// The body as received, because it was not an `<xml>` document
    Raw(String),
}

impl PayResponse {
    /// Returns the record, or `InvalidPayload` if the body was raw text.
    pub fn into_record(self) -> Result<Record> {
        match self {
            PayResponse::Record(record) => Ok(record),
            PayResponse::Raw(text) => Err(WeChatPayError::InvalidPayload(format!(
                "expected an XML record, got: {}",
                text
            ))),
        }
    }

    /// Returns the raw text, or `InvalidPayload` if the body was a record.
    pub fn into_raw(self) -> Result<String> {
        match self {
            PayResponse::Raw(text) => Ok(text),
            PayResponse::Record(record) => Err(WeChatPayError::InvalidPayload(format!(
                "expected raw text, got a record with {} fields",
                record.len()
            ))),
        }
    }

    /// Borrows the record, if any.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            PayResponse::Record(record) => Some(record),
            PayResponse::Raw(_) => None,
        }
    }

    /// Returns `true` if the body was not an `<xml>` document.
    pub fn is_raw(&self) -> bool {
        matches!(self, PayResponse::Raw(_))
    }
}

/// Signature scheme accepted by the gateway.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignType {
    /// Legacy MD5 signing, the gateway default
    #[default]
    #[serde(rename = "MD5")]
    Md5,
    /// HMAC-SHA256 keyed with the API key
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
}

impl SignType {
    /// Wire name, as used in the `sign_type` / `signType` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignType::Md5 => "MD5",
            SignType::HmacSha256 => "HMAC-SHA256",
        }
    }
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignType {
    type Err = WeChatPayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(SignType::Md5),
            "HMAC-SHA256" => Ok(SignType::HmacSha256),
            other => Err(WeChatPayError::ConfigError(format!(
                "unsupported sign type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_omitted() {
        let mut params = Params::new();
        params.insert("out_trade_no", "1001");
        params.insert("mch_id", "");
        params.insert_opt("device_info", None::<&str>);
        params.insert("total_fee", 0);

        assert_eq!(params.len(), 2);
        assert!(!params.contains_key("mch_id"));
        assert!(!params.contains_key("device_info"));
        assert_eq!(params.get("total_fee"), Some(&ParamValue::Integer(0)));
    }

    #[test]
    fn test_empty_insert_clears_existing_key() {
        let mut params = Params::new().with("attach", "x");
        params.insert("attach", String::new());
        assert!(params.is_empty());
    }

    #[test]
    fn test_set_default_keeps_caller_value() {
        let mut params = Params::new().with("nonce_str", "caller");
        params.set_default("nonce_str", "generated");
        params.set_default("mch_id", "1900000109");

        assert_eq!(params.get("nonce_str").unwrap().to_string(), "caller");
        assert_eq!(params.get("mch_id").unwrap().to_string(), "1900000109");
    }

    #[test]
    fn test_iteration_is_sorted() {
        let params: Params = [("b", "2"), ("a", "1"), ("C", "3")].into_iter().collect();
        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["C", "a", "b"]);
    }

    #[test]
    fn test_integer_display() {
        assert_eq!(ParamValue::from(1_000_000u64).to_string(), "1000000");
        assert_eq!(ParamValue::from(-5i32).to_string(), "-5");
    }

    #[test]
    fn test_pay_response_accessors() {
        let raw = PayResponse::Raw("not xml".to_string());
        assert!(raw.is_raw());
        assert!(raw.as_record().is_none());
        assert!(matches!(
            raw.clone().into_record(),
            Err(WeChatPayError::InvalidPayload(_))
        ));
        assert_eq!(raw.into_raw().unwrap(), "not xml");

        let record: Record = [("return_code", "SUCCESS")].into_iter().collect();
        let parsed = PayResponse::Record(record);
        assert_eq!(parsed.as_record().unwrap().return_code(), Some("SUCCESS"));
        assert!(parsed.into_raw().is_err());
    }

    #[test]
    fn test_sign_type_parsing() {
        assert_eq!("md5".parse::<SignType>().unwrap(), SignType::Md5);
        assert_eq!("HMAC-SHA256".parse::<SignType>().unwrap(), SignType::HmacSha256);
        assert!("SHA1".parse::<SignType>().is_err());
        assert_eq!(SignType::default().to_string(), "MD5");
    }

    #[test]
    fn test_record_serializes_as_flat_map() {
        let record: Record = [("return_code", "SUCCESS"), ("appid", "wx1")].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"appid":"wx1","return_code":"SUCCESS"}"#);
    }
}
