//! Miscellaneous endpoints: short URLs, bill downloads and auth code lookups.

use crate::client::WeChatPay;
use crate::errors::Result;
use crate::types::{Params, Record};
use chrono::NaiveDate;

/// Kind of transactions included in a downloaded bill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BillType {
    /// Every transaction of the day
    #[default]
    All,
    /// Successful payments
    Success,
    /// Refunds
    Refund,
    /// Refunds of recharge coupons
    RechargeRefund,
}

impl BillType {
    /// Wire value of `bill_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::All => "ALL",
            BillType::Success => "SUCCESS",
            BillType::Refund => "REFUND",
            BillType::RechargeRefund => "RECHARGE_REFUND",
        }
    }
}

/// Tool endpoints.
pub struct ToolsApi<'a> {
    client: &'a WeChatPay,
}

impl<'a> ToolsApi<'a> {
    pub(crate) fn new(client: &'a WeChatPay) -> Self {
        Self { client }
    }

    /// Converts a `weixin://wxpay/bizpayurl` link into a short URL.
    pub async fn short_url(&self, long_url: &str) -> Result<Record> {
        let params = Params::new()
            .with("appid", &self.client.config().appid)
            .with("long_url", long_url);
        self.client.post("tools/shorturl", params).await?.into_record()
    }

    /// Downloads the bill of `bill_date`.
    ///
    /// On success the gateway answers with the bill as CSV text instead of an
    /// `<xml>` document; that text is returned as is.
    pub async fn download_bill(
        &self,
        bill_date: NaiveDate,
        bill_type: BillType,
        device_info: Option<&str>,
    ) -> Result<String> {
        let params = bill_params(&self.client.config().appid, bill_date, bill_type, device_info);
        self.client.post("pay/downloadbill", params).await?.into_raw()
    }

    /// Looks up the openid behind a micropay auth code.
    pub async fn auth_code_to_openid(&self, auth_code: &str) -> Result<Record> {
        let params = Params::new()
            .with("appid", &self.client.config().appid)
            .with("auth_code", auth_code);
        self.client
            .post("tools/authcodetoopenid", params)
            .await?
            .into_record()
    }
}

fn bill_params(appid: &str, bill_date: NaiveDate, bill_type: BillType, device_info: Option<&str>) -> Params {
    Params::new()
        .with("appid", appid)
        .with("bill_date", bill_date.format("%Y%m%d").to_string())
        .with("bill_type", bill_type.as_str())
        .with_opt("device_info", device_info)
}
