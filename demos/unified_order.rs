//! Example unified order.
//!
//! Places a NATIVE order and prints the QR code link, then queries it back.
//!
//! Run with:
//! ```bash
//! cargo run --example unified_order
//! ```
//!
//! Environment variables (a `.env` file is read if present):
//! - WECHATPAY_APPID, WECHATPAY_API_KEY, WECHATPAY_MCH_ID: merchant credentials
//! - WECHATPAY_MCH_CERT, WECHATPAY_MCH_KEY: optional certificate paths
//! - NOTIFY_URL: payment result callback

use wechatpay_rs::api::{OrderRef, UnifiedOrder};
use wechatpay_rs::utils::generate_trade_no;
use wechatpay_rs::{WeChatPay, WeChatPayConfig, WeChatPayError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = WeChatPayConfig::from_env()?;
    let notify_url = std::env::var("NOTIFY_URL")
        .unwrap_or_else(|_| "https://example.com/wechatpay/notify".to_string());

    println!("WeChat Pay example");
    println!("   Merchant: {}", config.mch_id);
    println!("   Gateway:  {}", config.api_base_url);
    println!();

    let out_trade_no = generate_trade_no(&config.mch_id);
    let pay = WeChatPay::new(config)?;

    let order = UnifiedOrder::new("NATIVE", "Example goods", 1, notify_url, "127.0.0.1")
        .with_product_id("example-001")
        .with_out_trade_no(&out_trade_no);
    match pay.order().create(order).await {
        Ok(record) => {
            println!("Order {} placed", out_trade_no);
            println!("   prepay_id: {}", record.get("prepay_id").unwrap_or("-"));
            println!("   code_url:  {}", record.get("code_url").unwrap_or("-"));
        }
        Err(WeChatPayError::Payment(err)) => {
            eprintln!("Gateway refused the order: {}", err);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let record = pay.order().query(&OrderRef::OutTradeNo(out_trade_no)).await?;
    println!("\nOrder state: {}", record.get("trade_state").unwrap_or("-"));

    Ok(())
}
