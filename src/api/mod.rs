//! Endpoint groups of the merchant API.
//!
//! Each group borrows a [`WeChatPay`](crate::client::WeChatPay) client and only
//! assembles the field set of its endpoints; signing, transport and validation all
//! happen in the client.

pub mod coupon;
pub mod order;
pub mod redpack;
pub mod refund;
pub mod tools;
pub mod transfer;

pub use coupon::CouponApi;
pub use order::{AppParams, JsapiParams, OrderApi, OrderRef, UnifiedOrder};
pub use redpack::{GroupRedpack, Redpack, RedpackApi};
pub use refund::{RefundApi, RefundQuery, RefundRequest};
pub use tools::{BillType, ToolsApi};
pub use transfer::{CheckName, Transfer, TransferApi};

/// Default currency.
pub const FEE_TYPE_CNY: &str = "CNY";
