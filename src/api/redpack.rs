//! Cash red packet endpoints. Sending requires the merchant certificate.

use crate::client::WeChatPay;
use crate::errors::Result;
use crate::types::{Params, Record};
use crate::utils::generate_trade_no;

/// A single red packet (`mmpaymkttransfers/sendredpack`).
#[derive(Debug, Clone)]
pub struct Redpack {
    /// Recipient openid
    pub user_id: String,
    /// Amount in fen
    pub total_amount: u64,
    /// Sender name
    pub send_name: String,
    /// Activity name
    pub act_name: String,
    /// Greeting
    pub wishing: String,
    /// Remark
    pub remark: String,
    /// Caller IP
    pub client_ip: String,
    /// Number of recipients
    pub total_num: u32,
    /// Merchant bill number (`mch_billno`), generated when absent
    pub out_trade_no: Option<String>,
    /// Scene id, required for amounts above 200 CNY
    pub scene_id: Option<String>,
    /// Merchant id funding the packet
    pub consume_mch_id: Option<String>,
}

impl Redpack {
    /// Creates a red packet for a single recipient.
    pub fn new(
        user_id: impl Into<String>,
        total_amount: u64,
        send_name: impl Into<String>,
        act_name: impl Into<String>,
        wishing: impl Into<String>,
        remark: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            total_amount,
            send_name: send_name.into(),
            act_name: act_name.into(),
            wishing: wishing.into(),
            remark: remark.into(),
            client_ip: client_ip.into(),
            total_num: 1,
            out_trade_no: None,
            scene_id: None,
            consume_mch_id: None,
        }
    }

    /// Sets the merchant bill number.
    pub fn with_out_trade_no(mut self, out_trade_no: impl Into<String>) -> Self {
        self.out_trade_no = Some(out_trade_no.into());
        self
    }

    /// Sets the scene id.
    pub fn with_scene_id(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = Some(scene_id.into());
        self
    }

    fn into_params(self, appid: &str, mch_id: &str) -> Params {
        Params::new()
            .with("wxappid", appid)
            .with("re_openid", self.user_id)
            .with("total_amount", self.total_amount)
            .with("send_name", self.send_name)
            .with("act_name", self.act_name)
            .with("wishing", self.wishing)
            .with("remark", self.remark)
            .with("client_ip", self.client_ip)
            .with("total_num", self.total_num)
            .with("mch_billno", bill_no(self.out_trade_no, mch_id))
            .with_opt("scene_id", self.scene_id)
            .with_opt("consume_mch_id", self.consume_mch_id)
    }
}

/// A fission red packet split among friends (`mmpaymkttransfers/sendgroupredpack`).
#[derive(Debug, Clone)]
pub struct GroupRedpack {
    /// Seed recipient openid
    pub user_id: String,
    /// Total amount in fen
    pub total_amount: u64,
    /// Sender name
    pub send_name: String,
    /// Activity name
    pub act_name: String,
    /// Greeting
    pub wishing: String,
    /// Remark
    pub remark: String,
    /// Number of shares, at least 3
    pub total_num: u32,
    /// Merchant bill number (`mch_billno`), generated when absent
    pub out_trade_no: Option<String>,
    /// Scene id
    pub scene_id: Option<String>,
}

impl GroupRedpack {
    /// Creates a fission red packet.
    pub fn new(
        user_id: impl Into<String>,
        total_amount: u64,
        send_name: impl Into<String>,
        act_name: impl Into<String>,
        wishing: impl Into<String>,
        remark: impl Into<String>,
        total_num: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            total_amount,
            send_name: send_name.into(),
            act_name: act_name.into(),
            wishing: wishing.into(),
            remark: remark.into(),
            total_num,
            out_trade_no: None,
            scene_id: None,
        }
    }

    fn into_params(self, appid: &str, mch_id: &str) -> Params {
        Params::new()
            .with("wxappid", appid)
            .with("re_openid", self.user_id)
            .with("total_amount", self.total_amount)
            .with("send_name", self.send_name)
            .with("act_name", self.act_name)
            .with("wishing", self.wishing)
            .with("remark", self.remark)
            .with("total_num", self.total_num)
            .with("amt_type", "ALL_RAND")
            .with("mch_billno", bill_no(self.out_trade_no, mch_id))
            .with_opt("scene_id", self.scene_id)
    }
}

fn bill_no(out_trade_no: Option<String>, mch_id: &str) -> String {
    out_trade_no
        .filter(|no| !no.is_empty())
        .unwrap_or_else(|| generate_trade_no(mch_id))
}

/// Red packet endpoints.
pub struct RedpackApi<'a> {
    client: &'a WeChatPay,
}

impl<'a> RedpackApi<'a> {
    pub(crate) fn new(client: &'a WeChatPay) -> Self {
        Self { client }
    }

    /// Sends a red packet.
    pub async fn send(&self, redpack: Redpack) -> Result<Record> {
        let config = self.client.config();
        let params = redpack.into_params(&config.appid, &config.mch_id);
        self.client
            .post("mmpaymkttransfers/sendredpack", params)
            .await?
            .into_record()
    }

    /// Sends a fission red packet.
    pub async fn send_group(&self, redpack: GroupRedpack) -> Result<Record> {
        let config = self.client.config();
        let params = redpack.into_params(&config.appid, &config.mch_id);
        self.client
            .post("mmpaymkttransfers/sendgroupredpack", params)
            .await?
            .into_record()
    }

    /// Queries a red packet by merchant bill number.
    pub async fn query(&self, out_trade_no: &str) -> Result<Record> {
        let params = Params::new()
            .with("appid", &self.client.config().appid)
            .with("mch_billno", out_trade_no)
            .with("bill_type", "MCHT");
        self.client
            .post("mmpaymkttransfers/gethbinfo", params)
            .await?
            .into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;

    #[test]
    fn test_redpack_params() {
        let params = Redpack::new("openid-1", 100, "shop", "new year", "happy", "remark", "10.0.0.1")
            .into_params("wx2421b1c4370ec43b", "10000100");

        assert_eq!(params.get("wxappid"), Some(&ParamValue::from("wx2421b1c4370ec43b")));
        assert!(!params.contains_key("appid"));
        assert_eq!(params.get("re_openid"), Some(&ParamValue::from("openid-1")));
        assert_eq!(params.get("total_num"), Some(&ParamValue::Integer(1)));
        match params.get("mch_billno") {
            Some(ParamValue::Text(no)) => assert!(no.starts_with("10000100")),
            other => panic!("unexpected mch_billno: {:?}", other),
        }
    }

    #[test]
    fn test_group_redpack_params() {
        let params = GroupRedpack::new("openid-1", 300, "shop", "new year", "happy", "remark", 3)
            .into_params("wx2421b1c4370ec43b", "10000100");

        assert_eq!(params.get("amt_type"), Some(&ParamValue::from("ALL_RAND")));
        assert_eq!(params.get("total_num"), Some(&ParamValue::Integer(3)));
        assert!(!params.contains_key("client_ip"));
    }

    #[test]
    fn test_bill_no_keeps_caller_value() {
        assert_eq!(bill_no(Some("B1".to_string()), "mch"), "B1");
        assert!(bill_no(Some(String::new()), "mch").starts_with("mch"));
    }
}
