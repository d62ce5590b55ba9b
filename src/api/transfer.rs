//! Enterprise payment (merchant to user transfer) endpoints.
//!
//! The transfer endpoint names the app id `mch_appid` and the merchant id `mchid`,
//! unlike every other endpoint.

use crate::client::WeChatPay;
use crate::errors::Result;
use crate::types::{Params, Record};
use crate::utils::generate_trade_no;

/// Real-name check performed on the recipient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckName {
    /// No check
    NoCheck,
    /// Fail if the name does not match
    ForceCheck,
    /// Check only for users who completed real-name verification
    #[default]
    OptionCheck,
}

impl CheckName {
    /// Wire value of `check_name`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::NoCheck => "NO_CHECK",
            CheckName::ForceCheck => "FORCE_CHECK",
            CheckName::OptionCheck => "OPTION_CHECK",
        }
    }
}

/// A transfer to a user's balance (`mmpaymkttransfers/promotion/transfers`).
#[derive(Debug, Clone)]
pub struct Transfer {
    /// Recipient openid
    pub user_id: String,
    /// Amount in fen
    pub amount: u64,
    /// Description shown to the recipient
    pub desc: String,
    /// Caller IP
    pub client_ip: String,
    /// Real-name check
    pub check_name: CheckName,
    /// Recipient real name, required by `ForceCheck`
    pub real_name: Option<String>,
    /// Merchant trade number (`partner_trade_no`), generated when absent
    pub out_trade_no: Option<String>,
    /// Device number
    pub device_info: Option<String>,
}

impl Transfer {
    /// Creates a transfer.
    pub fn new(user_id: impl Into<String>, amount: u64, desc: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            desc: desc.into(),
            client_ip: client_ip.into(),
            check_name: CheckName::default(),
            real_name: None,
            out_trade_no: None,
            device_info: None,
        }
    }

    /// Requires the recipient's real name to match.
    pub fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
        self.check_name = CheckName::ForceCheck;
        self.real_name = Some(real_name.into());
        self
    }

    /// Sets the merchant trade number.
    pub fn with_out_trade_no(mut self, out_trade_no: impl Into<String>) -> Self {
        self.out_trade_no = Some(out_trade_no.into());
        self
    }

    fn into_params(self, appid: &str, mch_id: &str) -> Params {
        let out_trade_no = self
            .out_trade_no
            .filter(|no| !no.is_empty())
            .unwrap_or_else(|| generate_trade_no(mch_id));

        Params::new()
            .with("mch_appid", appid)
            .with("mchid", mch_id)
            .with_opt("device_info", self.device_info)
            .with("partner_trade_no", out_trade_no)
            .with("openid", self.user_id)
            .with("check_name", self.check_name.as_str())
            .with_opt("re_user_name", self.real_name)
            .with("amount", self.amount)
            .with("desc", self.desc)
            .with("spbill_create_ip", self.client_ip)
    }
}

/// Enterprise payment endpoints. Require the merchant certificate.
pub struct TransferApi<'a> {
    client: &'a WeChatPay,
}

impl<'a> TransferApi<'a> {
    pub(crate) fn new(client: &'a WeChatPay) -> Self {
        Self { client }
    }

    /// Transfers money to a user.
    pub async fn transfer(&self, transfer: Transfer) -> Result<Record> {
        let config = self.client.config();
        let params = transfer.into_params(&config.appid, &config.mch_id);
        self.client
            .post("mmpaymkttransfers/promotion/transfers", params)
            .await?
            .into_record()
    }

    /// Queries a transfer by merchant trade number.
    pub async fn query(&self, out_trade_no: &str) -> Result<Record> {
        let params = Params::new()
            .with("appid", &self.client.config().appid)
            .with("partner_trade_no", out_trade_no);
        self.client
            .post("mmpaymkttransfers/gettransferinfo", params)
            .await?
            .into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WeChatPayConfig;
    use crate::types::ParamValue;

    #[test]
    fn test_transfer_params() {
        let params = Transfer::new("openid-1", 100, "bonus", "10.0.0.1")
            .with_out_trade_no("T1")
            .into_params("wx2421b1c4370ec43b", "10000100");

        assert_eq!(params.get("mch_appid"), Some(&ParamValue::from("wx2421b1c4370ec43b")));
        assert_eq!(params.get("mchid"), Some(&ParamValue::from("10000100")));
        assert_eq!(params.get("partner_trade_no"), Some(&ParamValue::from("T1")));
        assert_eq!(params.get("check_name"), Some(&ParamValue::from("OPTION_CHECK")));
        assert!(!params.contains_key("re_user_name"));
    }

    #[test]
    fn test_transfer_with_real_name() {
        let params = Transfer::new("openid-1", 100, "bonus", "10.0.0.1")
            .with_real_name("张三")
            .into_params("appid", "mch");

        assert_eq!(params.get("check_name"), Some(&ParamValue::from("FORCE_CHECK")));
        assert_eq!(params.get("re_user_name"), Some(&ParamValue::from("张三")));
    }

    #[test]
    fn test_transfer_does_not_get_mch_id() {
        let pay = WeChatPay::new(WeChatPayConfig::new("appid", "key", "10000100")).unwrap();
        let params = pay.prepare_params(Transfer::new("openid-1", 100, "bonus", "10.0.0.1").into_params("appid", "10000100"));

        assert!(params.contains_key("mchid"));
        assert!(!params.contains_key("mch_id"));
    }
}
