//! # wechatpay-rs
//!
//! A Rust client for the WeChat Pay merchant API (the XML API served from
//! `https://api.mch.weixin.qq.com/`).
//!
//! Every call follows the same path: the parameter set is completed with the merchant
//! defaults, signed with the merchant API key, serialized as an `<xml>` document and
//! posted to the gateway. The answer is parsed back into a flat record and its
//! envelope and business status are checked before it reaches the caller.
//!
//! ## Features
//!
//! - **Signing**: the gateway's MD5 scheme and HMAC-SHA256
//! - **Validation**: two-tier status checking with a typed [`PaymentError`]
//! - **Merchant certificates**: client certificate support for refunds, red packets and transfers
//! - **Endpoint groups**: orders, refunds, red packets, transfers, coupons and tools
//! - **Notifications**: signature verification of payment result callbacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wechatpay_rs::api::UnifiedOrder;
//! use wechatpay_rs::client::{WeChatPay, WeChatPayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pay = WeChatPay::new(WeChatPayConfig::new(
//!     "wx2421b1c4370ec43b",
//!     "YOUR_API_KEY",
//!     "10000100",
//! ))?;
//!
//! let order = UnifiedOrder::new("NATIVE", "Coffee", 1500, "https://example.com/notify", "8.8.8.8")
//!     .with_product_id("coffee-001");
//! let record = pay.order().create(order).await?;
//! println!("code_url: {:?}", record.get("code_url"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Status Reporting
//!
//! The gateway reports two statuses:
//!
//! 1. **`return_code`**: envelope status. `FAIL` means the request itself was rejected
//!    (bad signature, missing field), and `return_msg` says why.
//! 2. **`result_code`**: business status, only meaningful once the envelope succeeded.
//!    On `FAIL`, `err_code` and `err_code_des` describe the problem.
//!
//! A call succeeds only when both are `SUCCESS`; otherwise it returns
//! [`WeChatPayError::Payment`] carrying all five fields. Bodies that are not XML
//! (bill downloads) come back as [`PayResponse::Raw`].
//!
//! ## References
//!
//! - [WeChat Pay merchant API](https://pay.weixin.qq.com/wiki/doc/api/index.html)
//! - [Signing algorithm](https://pay.weixin.qq.com/wiki/doc/api/jsapi.php?chapter=4_3)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod client;
pub mod errors;
pub mod types;
pub mod utils;
pub mod xml;

// Re-export commonly used items
pub use client::{decode_and_validate, RequestOptions, WeChatPay, WeChatPayConfig, API_BASE_URL};
pub use errors::{PaymentError, Result, WeChatPayError};
pub use types::{ParamValue, Params, PayResponse, Record, SignType};
pub use utils::{calculate_signature, sign_and_encode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        assert_eq!(API_BASE_URL, "https://api.mch.weixin.qq.com/");
    }

    #[test]
    fn test_module_accessibility() {
        // Ensure all endpoint groups are reachable from the client
        let pay = WeChatPay::new(WeChatPayConfig::new("appid", "key", "mch")).unwrap();
        let _ = pay.order();
        let _ = pay.refund();
        let _ = pay.redpack();
        let _ = pay.transfer();
        let _ = pay.coupon();
        let _ = pay.tools();
    }
}
