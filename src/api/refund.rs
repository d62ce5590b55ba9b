//! Refund endpoints.

use crate::api::{OrderRef, FEE_TYPE_CNY};
use crate::client::WeChatPay;
use crate::errors::Result;
use crate::types::{Params, Record};

/// A refund application (`secapi/pay/refund`).
#[derive(Debug, Clone)]
pub struct RefundRequest {
    /// Order being refunded
    pub order: OrderRef,
    /// Merchant refund number
    pub out_refund_no: String,
    /// Order amount in fen
    pub total_fee: u64,
    /// Refund amount in fen
    pub refund_fee: u64,
    /// Refund currency
    pub fee_type: String,
    /// Operator, the merchant id when absent
    pub op_user_id: Option<String>,
    /// Device number
    pub device_info: Option<String>,
    /// Funding account, e.g. `REFUND_SOURCE_RECHARGE_FUNDS`
    pub refund_account: Option<String>,
    /// Refund result callback URL
    pub notify_url: Option<String>,
}

impl RefundRequest {
    /// Creates a refund of `refund_fee` out of an order of `total_fee`.
    pub fn new(order: OrderRef, out_refund_no: impl Into<String>, total_fee: u64, refund_fee: u64) -> Self {
        Self {
            order,
            out_refund_no: out_refund_no.into(),
            total_fee,
            refund_fee,
            fee_type: FEE_TYPE_CNY.to_string(),
            op_user_id: None,
            device_info: None,
            refund_account: None,
            notify_url: None,
        }
    }

    /// Sets the refund result callback URL.
    pub fn with_notify_url(mut self, notify_url: impl Into<String>) -> Self {
        self.notify_url = Some(notify_url.into());
        self
    }

    fn into_params(self, appid: &str, mch_id: &str) -> Params {
        let mut params = Params::new()
            .with("appid", appid)
            .with_opt("device_info", self.device_info)
            .with("out_refund_no", self.out_refund_no)
            .with("total_fee", self.total_fee)
            .with("refund_fee", self.refund_fee)
            .with("refund_fee_type", self.fee_type)
            .with("op_user_id", self.op_user_id.unwrap_or_else(|| mch_id.to_string()))
            .with_opt("refund_account", self.refund_account)
            .with_opt("notify_url", self.notify_url);
        self.order.insert_into(&mut params);
        params
    }
}

/// Identifies the refund(s) to query. The gateway uses the most specific id given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundQuery {
    /// Gateway refund id
    RefundId(String),
    /// Merchant refund number
    OutRefundNo(String),
    /// All refunds of a transaction
    TransactionId(String),
    /// All refunds of a merchant order
    OutTradeNo(String),
}

impl RefundQuery {
    fn field(&self) -> (&'static str, &str) {
        match self {
            RefundQuery::RefundId(v) => ("refund_id", v),
            RefundQuery::OutRefundNo(v) => ("out_refund_no", v),
            RefundQuery::TransactionId(v) => ("transaction_id", v),
            RefundQuery::OutTradeNo(v) => ("out_trade_no", v),
        }
    }
}

/// Refund endpoints.
pub struct RefundApi<'a> {
    client: &'a WeChatPay,
}

impl<'a> RefundApi<'a> {
    pub(crate) fn new(client: &'a WeChatPay) -> Self {
        Self { client }
    }

    /// Applies for a refund. Requires the merchant certificate.
    pub async fn apply(&self, request: RefundRequest) -> Result<Record> {
        let config = self.client.config();
        let params = request.into_params(&config.appid, &config.mch_id);
        self.client.post("secapi/pay/refund", params).await?.into_record()
    }

    /// Queries refunds.
    pub async fn query(&self, query: &RefundQuery, device_info: Option<&str>) -> Result<Record> {
        let (key, value) = query.field();
        let params = Params::new()
            .with("appid", &self.client.config().appid)
            .with_opt("device_info", device_info)
            .with(key, value);
        self.client.post("pay/refundquery", params).await?.into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;

    #[test]
    fn test_refund_params() {
        let params = RefundRequest::new(OrderRef::OutTradeNo("1415701182".to_string()), "R1415701182", 100, 40)
            .with_notify_url("https://example.com/refund")
            .into_params("wx2421b1c4370ec43b", "10000100");

        assert_eq!(params.get("out_trade_no"), Some(&ParamValue::from("1415701182")));
        assert_eq!(params.get("out_refund_no"), Some(&ParamValue::from("R1415701182")));
        assert_eq!(params.get("total_fee"), Some(&ParamValue::Integer(100)));
        assert_eq!(params.get("refund_fee"), Some(&ParamValue::Integer(40)));
        assert_eq!(params.get("refund_fee_type"), Some(&ParamValue::from("CNY")));
        assert_eq!(params.get("op_user_id"), Some(&ParamValue::from("10000100")));
        assert!(!params.contains_key("transaction_id"));
        assert!(!params.contains_key("refund_account"));
    }

    #[test]
    fn test_refund_query_field() {
        assert_eq!(RefundQuery::RefundId("r1".to_string()).field(), ("refund_id", "r1"));
        assert_eq!(RefundQuery::OutTradeNo("o1".to_string()).field(), ("out_trade_no", "o1"));
    }
}
