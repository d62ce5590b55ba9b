//! Coupon endpoints.

use crate::client::WeChatPay;
use crate::errors::Result;
use crate::types::{Params, Record};
use crate::utils::generate_trade_no;

const COUPON_API_VERSION: &str = "1.0";

/// Coupon endpoints. Sending requires the merchant certificate.
pub struct CouponApi<'a> {
    client: &'a WeChatPay,
}

impl<'a> CouponApi<'a> {
    pub(crate) fn new(client: &'a WeChatPay) -> Self {
        Self { client }
    }

    /// Sends a coupon of stock `stock_id` to a user.
    ///
    /// `out_trade_no` becomes `partner_trade_no` and is generated when absent.
    pub async fn send(
        &self,
        user_id: &str,
        stock_id: &str,
        op_user_id: Option<&str>,
        device_info: Option<&str>,
        out_trade_no: Option<&str>,
    ) -> Result<Record> {
        let config = self.client.config();
        let out_trade_no = out_trade_no
            .filter(|no| !no.is_empty())
            .map_or_else(|| generate_trade_no(&config.mch_id), str::to_string);

        let params = self
            .base_params(op_user_id, device_info)
            .with("coupon_stock_id", stock_id)
            .with("openid", user_id)
            .with("openid_count", 1)
            .with("partner_trade_no", out_trade_no);
        self.client
            .post("mmpaymkttransfers/send_coupon", params)
            .await?
            .into_record()
    }

    /// Queries a coupon stock.
    pub async fn query_stock(
        &self,
        stock_id: &str,
        op_user_id: Option<&str>,
        device_info: Option<&str>,
    ) -> Result<Record> {
        let params = self
            .base_params(op_user_id, device_info)
            .with("coupon_stock_id", stock_id);
        self.client
            .post("mmpaymkttransfers/query_coupon_stock", params)
            .await?
            .into_record()
    }

    /// Queries a coupon held by a user.
    pub async fn query_coupon(
        &self,
        coupon_id: &str,
        user_id: &str,
        stock_id: &str,
        op_user_id: Option<&str>,
        device_info: Option<&str>,
    ) -> Result<Record> {
        let params = self
            .base_params(op_user_id, device_info)
            .with("coupon_id", coupon_id)
            .with("openid", user_id)
            .with("stock_id", stock_id);
        self.client
            .post("mmpaymkttransfers/querycouponsinfo", params)
            .await?
            .into_record()
    }

    fn base_params(&self, op_user_id: Option<&str>, device_info: Option<&str>) -> Params {
        Params::new()
            .with("appid", &self.client.config().appid)
            .with_opt("op_user_id", op_user_id)
            .with_opt("device_info", device_info)
            .with("version", COUPON_API_VERSION)
            .with("type", "XML")
    }
}
