//! Error types for the wechatpay-rs library.
//!
//! This module defines all error types that can occur while talking to the WeChat Pay
//! gateway. Gateway-reported failures are carried by [`PaymentError`]; everything else
//! (network, HTTP status, configuration) has its own [`WeChatPayError`] variant.

use serde::Serialize;
use thiserror::Error;

/// Status fields reported by the gateway when a call did not succeed.
///
/// `return_code` is the envelope status and `result_code` the business status. A
/// failing envelope usually comes without a `result_code` at all.
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe_status(.return_code, .result_code, .return_msg, .err_code, .err_code_des))]
pub struct PaymentError {
    /// Envelope status (`SUCCESS` / `FAIL`), empty if the gateway omitted it
    pub return_code: String,

    /// Business status, absent when the envelope already failed
    pub result_code: Option<String>,

    /// Envelope message
    pub return_msg: Option<String>,

    /// Business error code (e.g. `NOAUTH`, `ORDERPAID`)
    pub err_code: Option<String>,

    /// Business error description
    pub err_code_des: Option<String>,
}

impl PaymentError {
    /// Returns `true` if the envelope succeeded and only the business status failed.
    pub fn is_business_error(&self) -> bool {
        self.return_code == "SUCCESS"
    }
}

fn describe_status(
    return_code: &str,
    result_code: &Option<String>,
    return_msg: &Option<String>,
    err_code: &Option<String>,
    err_code_des: &Option<String>,
) -> String {
    let mut out = format!("return_code: {}", return_code);
    let optional = [
        ("result_code", result_code),
        ("return_msg", return_msg),
        ("err_code", err_code),
        ("err_code_des", err_code_des),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            out.push_str(&format!(", {}: {}", name, value));
        }
    }
    out
}

/// Main error type for WeChat Pay operations.
#[derive(Error, Debug)]
pub enum WeChatPayError {
    /// Network-level failure while sending the request or reading the body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx HTTP status
    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// The gateway reported an envelope or business failure
    #[error("WeChat Pay error: {0}")]
    Payment(#[from] PaymentError),

    /// Error while writing an XML document
    #[error("XML error: {0}")]
    Xml(String),

    /// Error reading a certificate or key file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error during JSON conversion of a record
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Signature of an inbound notification did not match
    #[error("Invalid signature")]
    InvalidSignature,

    /// Body could not be interpreted as expected
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl WeChatPayError {
    /// Returns the gateway status fields if this is a payment error.
    pub fn as_payment_error(&self) -> Option<&PaymentError> {
        match self {
            WeChatPayError::Payment(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for WeChat Pay operations.
pub type Result<T> = std::result::Result<T, WeChatPayError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn noauth() -> PaymentError {
        PaymentError {
            return_code: "SUCCESS".to_string(),
            result_code: Some("FAIL".to_string()),
            return_msg: None,
            err_code: Some("NOAUTH".to_string()),
            err_code_des: Some("no permission".to_string()),
        }
    }

    #[test]
    fn test_payment_error_display() {
        assert_eq!(
            noauth().to_string(),
            "return_code: SUCCESS, result_code: FAIL, err_code: NOAUTH, err_code_des: no permission"
        );
    }

    #[test]
    fn test_error_display() {
        let err = WeChatPayError::HttpStatus {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected HTTP status 502: Bad Gateway");

        let err = WeChatPayError::ConfigError("api_key is empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: api_key is empty");
    }

    #[test]
    fn test_error_conversion() {
        let err: WeChatPayError = noauth().into();
        assert!(matches!(err, WeChatPayError::Payment(_)));
        assert!(err.as_payment_error().unwrap().is_business_error());

        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: WeChatPayError = json_err.into();
        assert!(err.as_payment_error().is_none());
    }

    #[test]
    fn test_envelope_failure_is_not_business_error() {
        let err = PaymentError {
            return_code: "FAIL".to_string(),
            result_code: None,
            return_msg: Some("invalid sign".to_string()),
            err_code: None,
            err_code_des: None,
        };
        assert!(!err.is_business_error());
        assert_eq!(err.to_string(), "return_code: FAIL, return_msg: invalid sign");
    }
}
