//! Order endpoints: unified order, query, close, reverse, and the client-side
//! payment parameters for JSAPI and APP checkouts.

use crate::api::FEE_TYPE_CNY;
use crate::client::WeChatPay;
use crate::errors::Result;
use crate::types::{Params, Record};
use crate::utils::{china_now, current_timestamp, generate_trade_no, random_string, TIME_FORMAT};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How long an order stays payable when `time_expire` is not given.
const DEFAULT_EXPIRY_HOURS: i64 = 2;

/// Identifies an existing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    /// Gateway transaction id
    TransactionId(String),
    /// Merchant trade number
    OutTradeNo(String),
}

impl OrderRef {
    pub(crate) fn insert_into(&self, params: &mut Params) {
        match self {
            OrderRef::TransactionId(id) => params.insert("transaction_id", id),
            OrderRef::OutTradeNo(no) => params.insert("out_trade_no", no),
        }
    }
}

/// A unified order (`pay/unifiedorder`).
///
/// # Examples
///
/// ```
/// use wechatpay_rs::api::UnifiedOrder;
///
/// let order = UnifiedOrder::new("JSAPI", "QQ会员充值", 888, "https://example.com/notify", "8.8.8.8")
///     .with_user_id("oUpF8uMuAJO_M2pxb1Q9zNjWeS6o")
///     .with_attach("gz");
/// assert_eq!(order.fee_type, "CNY");
/// ```
#[derive(Debug, Clone)]
pub struct UnifiedOrder {
    /// `JSAPI`, `NATIVE`, `APP` or `MWEB`
    pub trade_type: String,
    /// Goods description
    pub body: String,
    /// Amount in fen
    pub total_fee: u64,
    /// Payment result callback URL
    pub notify_url: String,
    /// Payer IP (`spbill_create_ip`)
    pub client_ip: String,
    /// Payer openid, required for JSAPI
    pub user_id: Option<String>,
    /// Payer openid under the sub-merchant's app
    pub sub_user_id: Option<String>,
    /// Merchant trade number, generated when absent
    pub out_trade_no: Option<String>,
    /// Goods detail
    pub detail: Option<String>,
    /// Attach data echoed back in notifications
    pub attach: Option<String>,
    /// Currency
    pub fee_type: String,
    /// Order creation time (China Standard Time), now when absent
    pub time_start: Option<NaiveDateTime>,
    /// Order expiry time (China Standard Time), `time_start + 2h` when absent
    pub time_expire: Option<NaiveDateTime>,
    /// Goods tag for coupons
    pub goods_tag: Option<String>,
    /// Product id, required for NATIVE
    pub product_id: Option<String>,
    /// Device number
    pub device_info: Option<String>,
    /// `no_credit` to refuse credit cards
    pub limit_pay: Option<String>,
    /// Scene information, sent as JSON text
    pub scene_info: Option<Value>,
}

impl UnifiedOrder {
    /// Creates an order with the required fields.
    pub fn new(
        trade_type: impl Into<String>,
        body: impl Into<String>,
        total_fee: u64,
        notify_url: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            trade_type: trade_type.into(),
            body: body.into(),
            total_fee,
            notify_url: notify_url.into(),
            client_ip: client_ip.into(),
            user_id: None,
            sub_user_id: None,
            out_trade_no: None,
            detail: None,
            attach: None,
            fee_type: FEE_TYPE_CNY.to_string(),
            time_start: None,
            time_expire: None,
            goods_tag: None,
            product_id: None,
            device_info: None,
            limit_pay: None,
            scene_info: None,
        }
    }

    /// Sets the payer openid.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the merchant trade number.
    pub fn with_out_trade_no(mut self, out_trade_no: impl Into<String>) -> Self {
        self.out_trade_no = Some(out_trade_no.into());
        self
    }

    /// Sets the attach data.
    pub fn with_attach(mut self, attach: impl Into<String>) -> Self {
        self.attach = Some(attach.into());
        self
    }

    /// Sets the product id.
    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Sets the payable window.
    pub fn with_time_window(mut self, time_start: NaiveDateTime, time_expire: NaiveDateTime) -> Self {
        self.time_start = Some(time_start);
        self.time_expire = Some(time_expire);
        self
    }

    /// Sets the scene information.
    pub fn with_scene_info(mut self, scene_info: Value) -> Self {
        self.scene_info = Some(scene_info);
        self
    }

    fn into_params(self, appid: &str, mch_id: &str) -> Params {
        let time_start = self.time_start.unwrap_or_else(china_now);
        let time_expire = self
            .time_expire
            .unwrap_or_else(|| time_start + Duration::hours(DEFAULT_EXPIRY_HOURS));
        let out_trade_no = self
            .out_trade_no
            .filter(|no| !no.is_empty())
            .unwrap_or_else(|| generate_trade_no(mch_id));

        Params::new()
            .with("appid", appid)
            .with_opt("device_info", self.device_info)
            .with("body", self.body)
            .with_opt("detail", self.detail)
            .with_opt("attach", self.attach)
            .with("out_trade_no", out_trade_no)
            .with("fee_type", self.fee_type)
            .with("total_fee", self.total_fee)
            .with("spbill_create_ip", self.client_ip)
            .with("time_start", time_start.format(TIME_FORMAT).to_string())
            .with("time_expire", time_expire.format(TIME_FORMAT).to_string())
            .with_opt("goods_tag", self.goods_tag)
            .with("notify_url", self.notify_url)
            .with("trade_type", self.trade_type)
            .with_opt("limit_pay", self.limit_pay)
            .with_opt("product_id", self.product_id)
            .with_opt("openid", self.user_id)
            .with_opt("sub_openid", self.sub_user_id)
            .with_opt("scene_info", self.scene_info.map(|v| v.to_string()))
    }
}

/// Parameters for `WeixinJSBridge.invoke('getBrandWCPayRequest', ...)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsapiParams {
    /// App id
    #[serde(rename = "appId")]
    pub app_id: String,
    /// Unix timestamp, as text
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    /// Random string
    #[serde(rename = "nonceStr")]
    pub nonce_str: String,
    /// `prepay_id=<id>`
    pub package: String,
    /// Signature scheme name
    #[serde(rename = "signType")]
    pub sign_type: String,
    /// Signature over the other fields
    #[serde(rename = "paySign")]
    pub pay_sign: String,
}

/// Parameters handed to the mobile SDK for an APP checkout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppParams {
    /// App id
    pub appid: String,
    /// Merchant id
    pub partnerid: String,
    /// Prepay id from the unified order
    pub prepayid: String,
    /// Always `Sign=WXPay`
    pub package: String,
    /// Unix timestamp, as text
    pub timestamp: String,
    /// Random string
    pub noncestr: String,
    /// Signature over the other fields
    pub sign: String,
}

/// Order endpoints.
pub struct OrderApi<'a> {
    client: &'a WeChatPay,
}

impl<'a> OrderApi<'a> {
    pub(crate) fn new(client: &'a WeChatPay) -> Self {
        Self { client }
    }

    /// Places a unified order, returning the record with `prepay_id` (and
    /// `code_url` for NATIVE).
    pub async fn create(&self, order: UnifiedOrder) -> Result<Record> {
        let config = self.client.config();
        let params = order.into_params(&config.appid, &config.mch_id);
        self.client.post("pay/unifiedorder", params).await?.into_record()
    }

    /// Queries an order.
    pub async fn query(&self, order: &OrderRef) -> Result<Record> {
        self.client
            .post("pay/orderquery", self.ref_params(order))
            .await?
            .into_record()
    }

    /// Closes an unpaid order.
    pub async fn close(&self, out_trade_no: &str) -> Result<Record> {
        let params = Params::new()
            .with("appid", &self.client.config().appid)
            .with("out_trade_no", out_trade_no);
        self.client.post("pay/closeorder", params).await?.into_record()
    }

    /// Reverses a micropay order. Requires the merchant certificate.
    pub async fn reverse(&self, order: &OrderRef) -> Result<Record> {
        self.client
            .post("secapi/pay/reverse", self.ref_params(order))
            .await?
            .into_record()
    }

    /// Builds signed JSAPI payment parameters for `prepay_id`.
    ///
    /// `timestamp` and `nonce_str` are generated when not given.
    pub fn jsapi_params(
        &self,
        prepay_id: &str,
        timestamp: Option<i64>,
        nonce_str: Option<&str>,
    ) -> Result<JsapiParams> {
        let config = self.client.config();
        let time_stamp = timestamp.unwrap_or_else(current_timestamp).to_string();
        let nonce_str = nonce_str.map_or_else(|| random_string(32), str::to_string);
        let package = format!("prepay_id={}", prepay_id);
        let sign_type = config.sign_type.as_str().to_string();

        let pay_sign = self.client.sign([
            ("appId", config.appid.as_str()),
            ("timeStamp", time_stamp.as_str()),
            ("nonceStr", nonce_str.as_str()),
            ("package", package.as_str()),
            ("signType", sign_type.as_str()),
        ])?;

        Ok(JsapiParams {
            app_id: config.appid.clone(),
            time_stamp,
            nonce_str,
            package,
            sign_type,
            pay_sign,
        })
    }

    /// Builds signed APP payment parameters for `prepay_id`.
    ///
    /// `timestamp` and `nonce_str` are generated when not given.
    pub fn app_params(
        &self,
        prepay_id: &str,
        timestamp: Option<i64>,
        nonce_str: Option<&str>,
    ) -> Result<AppParams> {
        let config = self.client.config();
        let timestamp = timestamp.unwrap_or_else(current_timestamp).to_string();
        let noncestr = nonce_str.map_or_else(|| random_string(32), str::to_string);
        let package = "Sign=WXPay";

        let sign = self.client.sign([
            ("appid", config.appid.as_str()),
            ("partnerid", config.mch_id.as_str()),
            ("prepayid", prepay_id),
            ("package", package),
            ("timestamp", timestamp.as_str()),
            ("noncestr", noncestr.as_str()),
        ])?;

        Ok(AppParams {
            appid: config.appid.clone(),
            partnerid: config.mch_id.clone(),
            prepayid: prepay_id.to_string(),
            package: package.to_string(),
            timestamp,
            noncestr,
            sign,
        })
    }

    fn ref_params(&self, order: &OrderRef) -> Params {
        let mut params = Params::new().with("appid", &self.client.config().appid);
        order.insert_into(&mut params);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WeChatPayConfig;
    use crate::types::{ParamValue, SignType};
    use crate::utils::calculate_signature;
    use chrono::NaiveDate;
    use serde_json::json;

    fn client() -> WeChatPay {
        WeChatPay::new(WeChatPayConfig::new("wx2421b1c4370ec43b", "testkey", "10000100")).unwrap()
    }

    fn text(params: &Params, key: &str) -> String {
        params.get(key).map(ToString::to_string).unwrap_or_default()
    }

    #[test]
    fn test_unified_order_defaults() {
        let params = UnifiedOrder::new("NATIVE", "test", 1, "https://example.com/notify", "127.0.0.1")
            .with_product_id("12235413214070356458058")
            .into_params("wx2421b1c4370ec43b", "10000100");

        assert_eq!(text(&params, "appid"), "wx2421b1c4370ec43b");
        assert_eq!(text(&params, "fee_type"), "CNY");
        assert_eq!(params.get("total_fee"), Some(&ParamValue::Integer(1)));
        assert_eq!(text(&params, "spbill_create_ip"), "127.0.0.1");
        assert!(!params.contains_key("openid"));
        assert!(!params.contains_key("scene_info"));

        let out_trade_no = text(&params, "out_trade_no");
        assert!(out_trade_no.starts_with("10000100"));
        assert_eq!(out_trade_no.len(), 8 + 14 + 4);

        let start = NaiveDateTime::parse_from_str(&text(&params, "time_start"), TIME_FORMAT).unwrap();
        let expire = NaiveDateTime::parse_from_str(&text(&params, "time_expire"), TIME_FORMAT).unwrap();
        assert_eq!(expire - start, Duration::hours(2));
    }

    #[test]
    fn test_unified_order_explicit_fields() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let params = UnifiedOrder::new("JSAPI", "test", 100, "https://example.com/notify", "8.8.8.8")
            .with_user_id("openid-1")
            .with_out_trade_no("20240102001")
            .with_time_window(start, start + Duration::minutes(30))
            .with_scene_info(json!({"store_info": {"id": "SZTX001"}}))
            .into_params("appid", "mch");

        assert_eq!(text(&params, "openid"), "openid-1");
        assert_eq!(text(&params, "out_trade_no"), "20240102001");
        assert_eq!(text(&params, "time_start"), "20240102030405");
        assert_eq!(text(&params, "time_expire"), "20240102033405");
        assert_eq!(text(&params, "scene_info"), r#"{"store_info":{"id":"SZTX001"}}"#);
    }

    #[test]
    fn test_jsapi_params() {
        let pay = client();
        let params = pay
            .order()
            .jsapi_params("wx201410272009395522657a690389285100", Some(1414587457), Some("e61463f8efa94090b1f366cccfbbb444"))
            .unwrap();

        assert_eq!(params.app_id, "wx2421b1c4370ec43b");
        assert_eq!(params.time_stamp, "1414587457");
        assert_eq!(params.package, "prepay_id=wx201410272009395522657a690389285100");
        assert_eq!(params.sign_type, "MD5");

        let expected = calculate_signature(
            [
                ("appId", "wx2421b1c4370ec43b"),
                ("timeStamp", "1414587457"),
                ("nonceStr", "e61463f8efa94090b1f366cccfbbb444"),
                ("package", "prepay_id=wx201410272009395522657a690389285100"),
                ("signType", "MD5"),
            ],
            "testkey",
            SignType::Md5,
        )
        .unwrap();
        assert_eq!(params.pay_sign, expected);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["appId"], "wx2421b1c4370ec43b");
        assert_eq!(json["paySign"], expected.as_str());
    }

    #[test]
    fn test_app_params() {
        let pay = client();
        let params = pay.order().app_params("wx2016", None, None).unwrap();

        assert_eq!(params.partnerid, "10000100");
        assert_eq!(params.package, "Sign=WXPay");
        assert_eq!(params.noncestr.len(), 32);

        let record: Record = serde_json::from_value(serde_json::to_value(&params).unwrap()).unwrap();
        assert!(pay.check_signature(&record).unwrap());
    }

    #[test]
    fn test_ref_params() {
        let pay = client();
        let params = pay.order().ref_params(&OrderRef::TransactionId("4200000001".to_string()));
        assert_eq!(text(&params, "transaction_id"), "4200000001");
        assert!(!params.contains_key("out_trade_no"));
    }
}
