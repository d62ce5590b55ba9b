//! Client-side functionality for the WeChat Pay merchant API.
//!
//! [`WeChatPay`] fills request defaults, signs and encodes the parameter set, sends it
//! and validates the XML answer. Endpoint groups such as [`WeChatPay::order`] are thin
//! views over the same client.

use crate::api::{CouponApi, OrderApi, RedpackApi, RefundApi, ToolsApi, TransferApi};
use crate::errors::{PaymentError, Result, WeChatPayError};
use crate::types::{Params, PayResponse, Record, SignType, SUCCESS};
use crate::utils::{calculate_signature, random_string, sign_and_encode};
use crate::xml::from_xml;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Identity, Method};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default gateway base URL.
pub const API_BASE_URL: &str = "https://api.mch.weixin.qq.com/";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Length of the generated `nonce_str`.
const NONCE_LEN: usize = 32;

/// Configuration for a WeChat Pay merchant account.
#[derive(Clone)]
pub struct WeChatPayConfig {
    /// Official account / app id
    pub appid: String,

    /// Merchant API key used for signing
    pub api_key: String,

    /// Merchant id
    pub mch_id: String,

    /// Sub-merchant id, required in service-provider mode
    pub sub_mch_id: Option<String>,

    /// Path of the merchant certificate (PEM)
    pub mch_cert: Option<PathBuf>,

    /// Path of the merchant certificate's private key (PEM)
    pub mch_key: Option<PathBuf>,

    /// Base URL endpoints are appended to
    pub api_base_url: String,

    /// Signature scheme for outgoing requests
    pub sign_type: SignType,

    /// Request timeout
    pub timeout: Duration,
}

impl WeChatPayConfig {
    /// Creates a new configuration.
    ///
    /// # Arguments
    ///
    /// * `appid` - Official account or app id
    /// * `api_key` - Merchant API key
    /// * `mch_id` - Merchant id
    ///
    /// # Examples
    ///
    /// ```
    /// use wechatpay_rs::client::WeChatPayConfig;
    ///
    /// let config = WeChatPayConfig::new("wx2421b1c4370ec43b", "api-key", "10000100")
    ///     .with_sub_mch_id("1230000109")
    ///     .with_cert("/etc/wechatpay/apiclient_cert.pem", "/etc/wechatpay/apiclient_key.pem");
    ///
    /// assert_eq!(config.api_base_url, "https://api.mch.weixin.qq.com/");
    /// ```
    pub fn new(appid: impl Into<String>, api_key: impl Into<String>, mch_id: impl Into<String>) -> Self {
        Self {
            appid: appid.into(),
            api_key: api_key.into(),
            mch_id: mch_id.into(),
            sub_mch_id: None,
            mch_cert: None,
            mch_key: None,
            api_base_url: API_BASE_URL.to_string(),
            sign_type: SignType::Md5,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Creates a configuration from `WECHATPAY_*` environment variables.
    ///
    /// `WECHATPAY_APPID`, `WECHATPAY_API_KEY` and `WECHATPAY_MCH_ID` are required;
    /// `WECHATPAY_SUB_MCH_ID`, `WECHATPAY_MCH_CERT`, `WECHATPAY_MCH_KEY`,
    /// `WECHATPAY_API_BASE_URL`, `WECHATPAY_SIGN_TYPE` and `WECHATPAY_TIMEOUT_SECS`
    /// are optional.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            required_env("WECHATPAY_APPID")?,
            required_env("WECHATPAY_API_KEY")?,
            required_env("WECHATPAY_MCH_ID")?,
        );

        config.sub_mch_id = optional_env("WECHATPAY_SUB_MCH_ID");
        config.mch_cert = optional_env("WECHATPAY_MCH_CERT").map(PathBuf::from);
        config.mch_key = optional_env("WECHATPAY_MCH_KEY").map(PathBuf::from);

        if let Some(base_url) = optional_env("WECHATPAY_API_BASE_URL") {
            config.api_base_url = base_url;
        }
        if let Some(sign_type) = optional_env("WECHATPAY_SIGN_TYPE") {
            config.sign_type = sign_type.parse()?;
        }
        if let Some(secs) = optional_env("WECHATPAY_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| {
                WeChatPayError::ConfigError(format!("WECHATPAY_TIMEOUT_SECS: {}", e))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the sub-merchant id.
    pub fn with_sub_mch_id(mut self, sub_mch_id: impl Into<String>) -> Self {
        self.sub_mch_id = Some(sub_mch_id.into());
        self
    }

    /// Sets the merchant certificate and private key paths.
    pub fn with_cert(mut self, mch_cert: impl Into<PathBuf>, mch_key: impl Into<PathBuf>) -> Self {
        self.mch_cert = Some(mch_cert.into());
        self.mch_key = Some(mch_key.into());
        self
    }

    /// Sets the base URL endpoints are appended to.
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Sets the signature scheme.
    pub fn with_sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = sign_type;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn required_env(name: &str) -> Result<String> {
    optional_env(name)
        .ok_or_else(|| WeChatPayError::ConfigError(format!("{} environment variable is required", name)))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Per-call options for [`WeChatPay::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Parameters to sign and send as the XML body
    pub data: Option<Params>,

    /// Overrides the configured base URL for this call
    pub api_base_url: Option<String>,

    /// Overrides the configured timeout for this call
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options sending `data` as the request body.
    pub fn data(data: Params) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Sets the base URL override.
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into());
        self
    }

    /// Sets the timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<Params> for RequestOptions {
    fn from(data: Params) -> Self {
        Self::data(data)
    }
}

/// WeChat Pay merchant API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct WeChatPay {
    config: WeChatPayConfig,
    http_client: Client,
}

impl WeChatPay {
    /// Creates a client, loading the merchant certificate if one is configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use wechatpay_rs::client::{WeChatPay, WeChatPayConfig};
    ///
    /// let pay = WeChatPay::new(WeChatPayConfig::new("wx2421b1c4370ec43b", "key", "10000100")).unwrap();
    /// assert_eq!(pay.config().mch_id, "10000100");
    /// ```
    pub fn new(config: WeChatPayConfig) -> Result<Self> {
        let http_client = build_http_client(&config)?;
        Ok(Self { config, http_client })
    }

    /// Creates a client that sends requests through a caller-built HTTP client.
    ///
    /// The configured certificate paths are not applied to `http_client`.
    pub fn with_client(config: WeChatPayConfig, http_client: Client) -> Self {
        Self { config, http_client }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WeChatPayConfig {
        &self.config
    }

    /// Order endpoints.
    pub fn order(&self) -> OrderApi<'_> {
        OrderApi::new(self)
    }

    /// Refund endpoints.
    pub fn refund(&self) -> RefundApi<'_> {
        RefundApi::new(self)
    }

    /// Cash red packet endpoints.
    pub fn redpack(&self) -> RedpackApi<'_> {
        RedpackApi::new(self)
    }

    /// Enterprise payment endpoints.
    pub fn transfer(&self) -> TransferApi<'_> {
        TransferApi::new(self)
    }

    /// Coupon endpoints.
    pub fn coupon(&self) -> CouponApi<'_> {
        CouponApi::new(self)
    }

    /// Miscellaneous tool endpoints.
    pub fn tools(&self) -> ToolsApi<'_> {
        ToolsApi::new(self)
    }

    /// Sends one request and validates the answer.
    ///
    /// `url_or_endpoint` is either a full `http(s)://` URL or an endpoint path that
    /// gets appended to the base URL. When `options.data` is set, request defaults are
    /// filled in (see [`WeChatPay::prepare_params`]) and the signed XML document becomes
    /// the body.
    ///
    /// # Errors
    ///
    /// * [`WeChatPayError::Http`] on network failure
    /// * [`WeChatPayError::HttpStatus`] on a non-2xx status
    /// * [`WeChatPayError::Payment`] when the gateway reports a failure
    ///
    /// A body that is not an `<xml>` document is returned as [`PayResponse::Raw`].
    pub async fn request(
        &self,
        method: Method,
        url_or_endpoint: &str,
        options: impl Into<RequestOptions>,
    ) -> Result<PayResponse> {
        let options = options.into();
        let url = self.resolve_url(url_or_endpoint, options.api_base_url.as_deref())?;

        let mut request = self.http_client.request(method.clone(), url.clone());
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(data) = options.data {
            let params = self.prepare_params(data);
            let body = sign_and_encode(&params, &self.config.api_key, self.config.sign_type)?;
            request = request
                .header(CONTENT_TYPE, "text/xml; charset=utf-8")
                .body(body);
        }

        debug!(%method, %url, "sending WeChat Pay request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%url, status = status.as_u16(), "received WeChat Pay response");

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "WeChat Pay returned HTTP error");
            return Err(WeChatPayError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        decode_and_validate(&body)
    }

    /// Convenience wrapper for GET requests.
    pub async fn get(&self, url: &str, options: impl Into<RequestOptions>) -> Result<PayResponse> {
        self.request(Method::GET, url, options).await
    }

    /// Convenience wrapper for POST requests.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wechatpay_rs::client::{WeChatPay, WeChatPayConfig};
    /// use wechatpay_rs::types::Params;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let pay = WeChatPay::new(WeChatPayConfig::new("wx2421b1c4370ec43b", "key", "10000100"))?;
    /// let params = Params::new()
    ///     .with("appid", "wx2421b1c4370ec43b")
    ///     .with("out_trade_no", "1217752501201407033233368018");
    ///
    /// let record = pay.post("pay/orderquery", params).await?.into_record()?;
    /// println!("trade_state: {:?}", record.get("trade_state"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post(&self, url: &str, options: impl Into<RequestOptions>) -> Result<PayResponse> {
        self.request(Method::POST, url, options).await
    }

    /// Fills the defaults every request carries. Values already present win.
    ///
    /// * `mch_id`, unless the endpoint spells the merchant id `mchid`
    /// * `sub_mch_id`, when configured
    /// * `nonce_str`, 32 random alphanumeric characters
    /// * `sign_type`, when signing with HMAC-SHA256
    pub fn prepare_params(&self, mut params: Params) -> Params {
        // Enterprise payments name the merchant id `mchid`; sending both is rejected.
        if !params.contains_key("mchid") {
            params.set_default("mch_id", self.config.mch_id.as_str());
        }
        if let Some(sub_mch_id) = &self.config.sub_mch_id {
            params.set_default("sub_mch_id", sub_mch_id);
        }
        params.set_default("nonce_str", random_string(NONCE_LEN));
        if self.config.sign_type != SignType::Md5 {
            params.set_default("sign_type", self.config.sign_type.as_str());
        }
        params
    }

    /// Signs arbitrary pairs with the configured key and sign type.
    pub fn sign<'a, I, V>(&self, pairs: I) -> Result<String>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: ToString,
    {
        calculate_signature(pairs, &self.config.api_key, self.config.sign_type)
    }

    /// Verifies the `sign` field of a record received from the gateway.
    ///
    /// The record's own `sign_type` field selects the scheme when present. A record
    /// naming a scheme this client does not know fails verification.
    pub fn check_signature(&self, record: &Record) -> Result<bool> {
        let sign_type = match record.get("sign_type") {
            Some(name) => match name.parse::<SignType>() {
                Ok(sign_type) => sign_type,
                Err(_) => {
                    warn!(sign_type = name, "unsupported sign type in record");
                    return Ok(false);
                }
            },
            None => self.config.sign_type,
        };
        crate::utils::check_signature(record, &self.config.api_key, sign_type)
    }

    /// Parses and authenticates a payment result notification.
    ///
    /// Returns the notification fields without `sign`.
    ///
    /// # Errors
    ///
    /// * [`WeChatPayError::InvalidPayload`] if the body is not an `<xml>` document
    /// * [`WeChatPayError::InvalidSignature`] if the signature does not match
    pub fn parse_payment_result(&self, xml: &str) -> Result<Record> {
        let mut record = from_xml(xml)?;
        if !self.check_signature(&record)? {
            warn!("payment notification signature mismatch");
            return Err(WeChatPayError::InvalidSignature);
        }
        record.remove("sign");
        Ok(record)
    }

    fn resolve_url(&self, url_or_endpoint: &str, api_base_url: Option<&str>) -> Result<Url> {
        if url_or_endpoint.starts_with("http://") || url_or_endpoint.starts_with("https://") {
            return Ok(Url::parse(url_or_endpoint)?);
        }
        let base = api_base_url.unwrap_or(&self.config.api_base_url);
        Ok(Url::parse(&format!("{}{}", base, url_or_endpoint))?)
    }
}

fn build_http_client(config: &WeChatPayConfig) -> Result<Client> {
    let mut builder = Client::builder().timeout(config.timeout);

    if let (Some(cert), Some(key)) = (&config.mch_cert, &config.mch_key) {
        let mut pem = std::fs::read(cert)?;
        pem.push(b'\n');
        pem.extend(std::fs::read(key)?);
        let identity = Identity::from_pem(&pem).map_err(|e| {
            WeChatPayError::ConfigError(format!("invalid merchant certificate: {}", e))
        })?;
        builder = builder.identity(identity);
    }

    Ok(builder.build()?)
}

/// Decodes a response body and checks its status fields.
///
/// Succeeds only if both `return_code` and `result_code` are `SUCCESS`; the whole
/// record is returned then. A body that is not an `<xml>` document comes back as
/// [`PayResponse::Raw`], unchanged.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::client::decode_and_validate;
/// use wechatpay_rs::types::PayResponse;
///
/// let ok = decode_and_validate(
///     "<xml><return_code>SUCCESS</return_code><result_code>SUCCESS</result_code><prepay_id>wx1</prepay_id></xml>",
/// )
/// .unwrap();
/// assert_eq!(ok.as_record().unwrap().get("prepay_id"), Some("wx1"));
///
/// let err = decode_and_validate("<xml><return_code>FAIL</return_code></xml>").unwrap_err();
/// assert_eq!(err.as_payment_error().unwrap().return_code, "FAIL");
///
/// let raw = decode_and_validate("not xml").unwrap();
/// assert_eq!(raw, PayResponse::Raw("not xml".to_string()));
/// ```
pub fn decode_and_validate(body: &str) -> Result<PayResponse> {
    let record = match from_xml(body) {
        Ok(record) => record,
        Err(e) => {
            debug!(error = %e, "response is not an XML document, returning raw body");
            return Ok(PayResponse::Raw(body.to_string()));
        }
    };

    let return_code = record.return_code().unwrap_or_default();
    let result_code = record.result_code();
    if return_code != SUCCESS || result_code != Some(SUCCESS) {
        let err = PaymentError {
            return_code: return_code.to_string(),
            result_code: result_code.map(str::to_string),
            return_msg: record.get("return_msg").map(str::to_string),
            err_code: record.get("err_code").map(str::to_string),
            err_code_des: record.get("err_code_des").map(str::to_string),
        };
        warn!(%err, "WeChat Pay request failed");
        return Err(err.into());
    }

    Ok(PayResponse::Record(record))
}
