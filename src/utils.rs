//! Utility functions for WeChat Pay operations.
//!
//! This module provides request signing, nonce and trade number generation, and
//! timestamp helpers used throughout the library.

use crate::errors::{Result, WeChatPayError};
use crate::types::{Params, Record, SignType};
use crate::xml::to_xml;
use chrono::{Duration, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Timestamp layout used by `time_start`, `time_expire` and generated trade numbers.
pub const TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Builds the string that gets digested: `k1=v1&k2=v2&...&key=<api_key>`.
///
/// Pairs are sorted by key in byte order. Empty values and the `sign` field itself
/// are skipped.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::utils::signing_string;
///
/// let s = signing_string(
///     [("total_fee", "100"), ("out_trade_no", "1001"), ("mch_id", "")],
///     "testkey",
/// );
/// assert_eq!(s, "out_trade_no=1001&total_fee=100&key=testkey");
/// ```
pub fn signing_string<'a, I, V>(pairs: I, api_key: &str) -> String
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: ToString,
{
    let mut entries: Vec<(&str, String)> = pairs
        .into_iter()
        .filter(|(key, _)| *key != "sign")
        .map(|(key, value)| (key, value.to_string()))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (key, value) in &entries {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('&');
    }
    out.push_str("key=");
    out.push_str(api_key);
    out
}

/// Computes the request signature: the uppercase hex digest of [`signing_string`].
///
/// The result does not depend on the iteration order of `pairs`.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::types::SignType;
/// use wechatpay_rs::utils::calculate_signature;
///
/// let sign = calculate_signature([("out_trade_no", "1001")], "testkey", SignType::Md5).unwrap();
/// assert_eq!(sign.len(), 32);
/// assert_eq!(sign, sign.to_uppercase());
/// ```
pub fn calculate_signature<'a, I, V>(pairs: I, api_key: &str, sign_type: SignType) -> Result<String>
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: ToString,
{
    if api_key.is_empty() {
        return Err(WeChatPayError::ConfigError("api_key is empty".to_string()));
    }

    let plain = signing_string(pairs, api_key);
    match sign_type {
        SignType::Md5 => Ok(hex::encode_upper(Md5::digest(plain.as_bytes()))),
        SignType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(api_key.as_bytes())
                .map_err(|e| WeChatPayError::ConfigError(e.to_string()))?;
            Mac::update(&mut mac, plain.as_bytes());
            Ok(hex::encode_upper(mac.finalize().into_bytes()))
        }
    }
}

/// Signs a parameter set and serializes it, signature included, as an `<xml>` document.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::types::{Params, SignType};
/// use wechatpay_rs::utils::sign_and_encode;
///
/// let params = Params::new().with("out_trade_no", "1001").with("total_fee", 100);
/// let doc = sign_and_encode(&params, "testkey", SignType::Md5).unwrap();
/// assert!(doc.starts_with("<xml><out_trade_no>"));
/// assert!(doc.contains("<sign>"));
/// ```
pub fn sign_and_encode(params: &Params, api_key: &str, sign_type: SignType) -> Result<String> {
    let sign = calculate_signature(params.iter(), api_key, sign_type)?;
    to_xml(params, &sign)
}

/// Checks the `sign` field of a record against the signature of its other fields.
///
/// Returns `false` when the record carries no `sign` at all.
pub fn check_signature(record: &Record, api_key: &str, sign_type: SignType) -> Result<bool> {
    let Some(sign) = record.get("sign") else {
        return Ok(false);
    };
    let expected = calculate_signature(record.iter(), api_key, sign_type)?;
    Ok(constant_time_eq(expected.as_bytes(), sign.as_bytes()))
}

// Runs in time independent of where the inputs first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Generates a random alphanumeric string, used for `nonce_str`.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::utils::random_string;
///
/// let nonce = random_string(32);
/// assert_eq!(nonce.len(), 32);
/// assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Current wall-clock time in China Standard Time (UTC+8), the gateway's time zone.
pub fn china_now() -> NaiveDateTime {
    (Utc::now() + Duration::hours(8)).naive_utc()
}

/// Generates a merchant trade number: `<mch_id><yyyymmddHHMMSS><4 random digits>`.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::utils::generate_trade_no;
///
/// let no = generate_trade_no("1900000109");
/// assert_eq!(no.len(), 10 + 14 + 4);
/// assert!(no.starts_with("1900000109"));
/// ```
pub fn generate_trade_no(mch_id: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..10000);
    format!("{}{}{}", mch_id, china_now().format(TIME_FORMAT), suffix)
}

/// Gets the current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::from_xml;

    #[test]
    fn test_scenario_signature() {
        let params = Params::new()
            .with("out_trade_no", "1001")
            .with("total_fee", "100")
            .with("mch_id", "");

        assert_eq!(
            signing_string(params.iter(), "testkey"),
            "out_trade_no=1001&total_fee=100&key=testkey"
        );

        let expected = hex::encode_upper(Md5::digest(b"out_trade_no=1001&total_fee=100&key=testkey"));
        let sign = calculate_signature(params.iter(), "testkey", SignType::Md5).unwrap();
        assert_eq!(sign, expected);
    }

    #[test]
    fn test_known_md5_vector() {
        // Example from the gateway's signing guide.
        let pairs = [
            ("appid", "wxd930ea5d5a258f4f"),
            ("mch_id", "10000100"),
            ("device_info", "1000"),
            ("body", "test"),
            ("nonce_str", "ibuaiVcKdpRxkhJA"),
        ];
        let sign = calculate_signature(pairs, "192006250b4c09247ec02edce69f6a2d", SignType::Md5).unwrap();
        assert_eq!(sign, "9A0A8659F005D6984697E2CA0A9CF3B7");
    }

    #[test]
    fn test_signature_independent_of_order() {
        let forward = [("a", "1"), ("b", "2"), ("c", "3")];
        let backward = [("c", "3"), ("b", "2"), ("a", "1")];
        assert_eq!(
            calculate_signature(forward, "k", SignType::Md5).unwrap(),
            calculate_signature(backward, "k", SignType::Md5).unwrap()
        );
    }

    #[test]
    fn test_empty_values_do_not_change_signature() {
        let with_empty = [("a", "1"), ("b", "")];
        let without = [("a", "1")];
        assert_eq!(
            calculate_signature(with_empty, "k", SignType::Md5).unwrap(),
            calculate_signature(without, "k", SignType::Md5).unwrap()
        );
    }

    #[test]
    fn test_hmac_sha256_signature() {
        let sign = calculate_signature([("a", "1")], "k", SignType::HmacSha256).unwrap();
        assert_eq!(sign.len(), 64);
        assert_eq!(sign, sign.to_uppercase());
        assert_ne!(sign, calculate_signature([("a", "1")], "k", SignType::Md5).unwrap());
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = calculate_signature([("a", "1")], "", SignType::Md5).unwrap_err();
        assert!(matches!(err, WeChatPayError::ConfigError(_)));
    }

    #[test]
    fn test_sign_and_encode_then_check() {
        let params = Params::new()
            .with("appid", "wx2421b1c4370ec43b")
            .with("total_fee", 1)
            .with("body", "JSAPI test");

        let doc = sign_and_encode(&params, "secret", SignType::Md5).unwrap();
        let mut record = from_xml(&doc).unwrap();
        assert!(check_signature(&record, "secret", SignType::Md5).unwrap());
        assert!(!check_signature(&record, "other", SignType::Md5).unwrap());

        record.insert("total_fee", "2");
        assert!(!check_signature(&record, "secret", SignType::Md5).unwrap());

        record.remove("sign");
        assert!(!check_signature(&record, "secret", SignType::Md5).unwrap());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"9A0A8659", b"9A0A8659"));
        assert!(!constant_time_eq(b"9A0A8659", b"9A0A8658"));
        assert!(!constant_time_eq(b"9A0A8659", b"9A0A865"));
        assert!(!constant_time_eq(b"9A0A8659", b"9a0a8659"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_random_string() {
        let a = random_string(32);
        let b = random_string(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_trade_no() {
        let no = generate_trade_no("10000100");
        assert_eq!(no.len(), 8 + 14 + 4);
        assert!(no.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp();
        assert!(ts > 1600000000); // After Sept 2020
    }
}
