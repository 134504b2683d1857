//! VNPAY hosted-payment URL construction and return-trip parsing.
//!
//! The gateway contract is string-level: parameters are percent-encoded,
//! sorted by encoded key, joined into `k=v&k=v`, and that exact string is
//! HMAC-SHA512 signed. Re-encoding or re-ordering anywhere breaks the
//! signature, so both the signed payload and the final query are built
//! from one canonical form.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::ExposeSecret;
use sha2::Sha512;
use thiserror::Error;
use url::Url;

use lavande_core::Price;

use crate::config::VnpayConfig;

type HmacSha512 = Hmac<Sha512>;

/// Response code the gateway sends for a completed payment.
pub const RESPONSE_CODE_SUCCESS: &str = "00";

const VNP_VERSION: &str = "2.1.0";
const VNP_COMMAND: &str = "pay";
const VNP_LOCALE: &str = "vn";
const VNP_CURRENCY: &str = "VND";
const VNP_ORDER_TYPE: &str = "other";
const VNP_IP_ADDR: &str = "127.0.0.1";

/// URL prefixes the payment page uses to hand off to banking apps.
/// Navigations to these are opened outside the embedded page.
const BANK_APP_SCHEMES: [&str; 6] = ["viba:", "vcb:", "vietin:", "vietcom:", "tpbank:", "momo:"];

/// Signing failures. HMAC accepts any key length, so in practice this
/// only fires on an empty secret slipping past configuration.
#[derive(Debug, Error)]
pub enum VnpayError {
    #[error("payment signing failed: {0}")]
    Signing(String),
}

/// Build the signed hosted-payment URL for one transaction.
///
/// `created_at` is local wall-clock time; the gateway expects
/// `YYYYMMDDHHmmss` in the merchant's timezone.
///
/// # Errors
///
/// Returns [`VnpayError::Signing`] when the HMAC cannot be constructed.
pub fn build_payment_url(
    config: &VnpayConfig,
    amount: Price,
    txn_ref: &str,
    created_at: DateTime<Local>,
) -> Result<String, VnpayError> {
    let params: [(&str, String); 12] = [
        ("vnp_Version", VNP_VERSION.to_owned()),
        ("vnp_Command", VNP_COMMAND.to_owned()),
        ("vnp_TmnCode", config.tmn_code.clone()),
        ("vnp_Locale", VNP_LOCALE.to_owned()),
        ("vnp_CurrCode", VNP_CURRENCY.to_owned()),
        ("vnp_TxnRef", txn_ref.to_owned()),
        ("vnp_OrderInfo", format!("Thanh toan don hang {txn_ref}")),
        ("vnp_OrderType", VNP_ORDER_TYPE.to_owned()),
        ("vnp_Amount", amount.gateway_minor_units().to_string()),
        ("vnp_ReturnUrl", config.return_url.clone()),
        ("vnp_IpAddr", VNP_IP_ADDR.to_owned()),
        (
            "vnp_CreateDate",
            created_at.format("%Y%m%d%H%M%S").to_string(),
        ),
    ];

    let canonical = canonical_query(&params);
    let signature = sign_payload(config.hash_secret.expose_secret(), &canonical)?;

    Ok(format!(
        "{}?{canonical}&vnp_SecureHash={signature}",
        config.gateway_url
    ))
}

/// Percent-encode, sort by encoded key, and join. The gateway's reference
/// implementation encodes spaces in values as `+`, so this does too.
fn canonical_query(params: &[(&str, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| {
            let value = urlencoding::encode(value).replace("%20", "+");
            (urlencoding::encode(key).into_owned(), value)
        })
        .collect();
    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign_payload(secret: &str, payload: &str) -> Result<String, VnpayError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| VnpayError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Fresh transaction reference in MongoDB ObjectId form: eight hex digits
/// of unix seconds followed by sixteen random hex digits.
#[must_use]
pub fn generate_txn_ref() -> String {
    let secs = Local::now().timestamp().max(0);
    let mut rng = rand::rng();

    let mut reference = format!("{secs:08x}");
    for _ in 0..16 {
        let nibble: u32 = rng.random_range(0..16);
        let _ = write!(reference, "{nibble:x}");
    }
    reference
}

/// Query parameters carried back on the gateway's return redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentCallback {
    pub response_code: Option<String>,
    pub txn_ref: Option<String>,
    /// Raw amount string in minor units (hundredths of a đồng).
    pub amount: Option<String>,
    pub order_info: Option<String>,
    pub transaction_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
}

impl PaymentCallback {
    /// Pull the known `vnp_` parameters out of a return URL.
    ///
    /// Unparseable input yields an empty callback, which reads as a failed
    /// payment rather than an error; the gateway controls that URL and a
    /// mangled one means the payment cannot be confirmed.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let mut callback = Self::default();
        let Ok(parsed) = Url::parse(url) else {
            return callback;
        };

        for (key, value) in parsed.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "vnp_ResponseCode" => callback.response_code = Some(value),
                "vnp_TxnRef" => callback.txn_ref = Some(value),
                "vnp_Amount" => callback.amount = Some(value),
                "vnp_OrderInfo" => callback.order_info = Some(value),
                "vnp_TransactionNo" => callback.transaction_no = Some(value),
                "vnp_BankCode" => callback.bank_code = Some(value),
                "vnp_PayDate" => callback.pay_date = Some(value),
                _ => {}
            }
        }
        callback
    }

    /// Whether the gateway reported the payment as completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_code.as_deref() == Some(RESPONSE_CODE_SUCCESS)
    }

    /// The paid amount, when present and numeric.
    #[must_use]
    pub fn paid_amount(&self) -> Option<Price> {
        let minor: i64 = self.amount.as_deref()?.parse().ok()?;
        Some(Price::from_gateway_minor_units(minor))
    }
}

/// What to do with a navigation observed on the embedded payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// A banking-app handoff; open it with the platform opener.
    External(String),
    /// The gateway's return redirect, parsed.
    Callback(PaymentCallback),
    /// A non-web scheme this client has no handler for.
    UnknownScheme(String),
    /// An ordinary page load inside the gateway flow.
    Page,
}

/// Classify a navigation URL seen during payment.
///
/// `return_marker` is the path fragment identifying the return redirect,
/// from [`VnpayConfig::return_marker`].
#[must_use]
pub fn classify_navigation(url: &str, return_marker: &str) -> Navigation {
    if BANK_APP_SCHEMES
        .iter()
        .any(|scheme| url.starts_with(scheme))
    {
        return Navigation::External(url.to_owned());
    }

    if url.contains(return_marker) {
        return Navigation::Callback(PaymentCallback::from_url(url));
    }

    if let Some((scheme, _)) = url.split_once(':')
        && !scheme.eq_ignore_ascii_case("http")
        && !scheme.eq_ignore_ascii_case("https")
    {
        return Navigation::UnknownScheme(scheme.to_owned());
    }

    Navigation::Page
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::SecretString;

    fn config() -> VnpayConfig {
        VnpayConfig {
            tmn_code: "LAVANDE1".to_string(),
            hash_secret: SecretString::from("HUSXH1330A8TUE57O1UAS2Q5KBJYL1GD".to_string()),
            gateway_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:5173/vnpay_return".to_string(),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 23, 14, 30, 5).unwrap()
    }

    #[test]
    fn test_payment_url_is_deterministic() {
        let amount = Price::from_vnd(250_000);
        let first = build_payment_url(&config(), amount, "68a9c1f0a1b2c3d4e5f60718", fixed_time())
            .unwrap();
        let second = build_payment_url(&config(), amount, "68a9c1f0a1b2c3d4e5f60718", fixed_time())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signed_parameters_are_sorted_and_hash_comes_last() {
        let url = build_payment_url(&config(), Price::from_vnd(100_000), "ref1", fixed_time())
            .unwrap();
        let (_, query) = url.split_once('?').unwrap();

        let keys: Vec<&str> = query
            .split('&')
            .map(|pair| pair.split_once('=').map_or(pair, |(key, _)| key))
            .collect();
        assert_eq!(keys.last(), Some(&"vnp_SecureHash"));

        let signed = &keys[..keys.len() - 1];
        let mut sorted = signed.to_vec();
        sorted.sort_unstable();
        assert_eq!(signed, &sorted[..]);
    }

    #[test]
    fn test_signature_matches_canonical_payload() {
        let url = build_payment_url(&config(), Price::from_vnd(250_000), "ref42", fixed_time())
            .unwrap();
        let (_, query) = url.split_once('?').unwrap();
        let (canonical, hash_pair) = query.rsplit_once('&').unwrap();
        let signature = hash_pair.strip_prefix("vnp_SecureHash=").unwrap();

        let expected = sign_payload("HUSXH1330A8TUE57O1UAS2Q5KBJYL1GD", canonical).unwrap();
        assert_eq!(signature, expected);
    }

    #[test]
    fn test_amount_is_sent_in_minor_units_and_spaces_as_plus() {
        let url = build_payment_url(&config(), Price::from_vnd(250_000), "ref9", fixed_time())
            .unwrap();
        assert!(url.contains("vnp_Amount=25000000"));
        assert!(url.contains("vnp_OrderInfo=Thanh+toan+don+hang+ref9"));
        assert!(url.contains("vnp_CreateDate=20260823143005"));
        // The return URL is percent-encoded inside the query.
        assert!(url.contains("vnp_ReturnUrl=http%3A%2F%2Flocalhost%3A5173%2Fvnpay_return"));
    }

    #[test]
    fn test_txn_ref_shape() {
        let reference = generate_txn_ref();
        assert_eq!(reference.len(), 24);
        assert!(reference.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_txn_ref(), reference);
    }

    #[test]
    fn test_callback_round_trip() {
        let callback = PaymentCallback::from_url(
            "http://localhost:5173/vnpay_return?vnp_Amount=25000000&vnp_BankCode=NCB\
             &vnp_OrderInfo=Thanh+toan+don+hang+ref42&vnp_ResponseCode=00\
             &vnp_TransactionNo=14212881",
        );
        assert!(callback.is_success());
        assert_eq!(callback.paid_amount().unwrap().as_vnd(), 250_000);
        assert_eq!(
            callback.order_info.as_deref(),
            Some("Thanh toan don hang ref42")
        );
        assert_eq!(callback.bank_code.as_deref(), Some("NCB"));
    }

    #[test]
    fn test_declined_callback() {
        let callback = PaymentCallback::from_url(
            "http://localhost:5173/vnpay_return?vnp_ResponseCode=24&vnp_TxnRef=ref42",
        );
        assert!(!callback.is_success());
        assert_eq!(callback.txn_ref.as_deref(), Some("ref42"));
        assert!(callback.paid_amount().is_none());
    }

    #[test]
    fn test_mangled_callback_reads_as_failure() {
        let callback = PaymentCallback::from_url("not a url at all");
        assert!(!callback.is_success());
        assert_eq!(callback, PaymentCallback::default());
    }

    #[test]
    fn test_bank_scheme_goes_external() {
        let nav = classify_navigation("momo://pay?token=abc", "vnpay_return");
        assert_eq!(nav, Navigation::External("momo://pay?token=abc".to_string()));
    }

    #[test]
    fn test_return_redirect_is_parsed() {
        let nav = classify_navigation(
            "http://localhost:5173/vnpay_return?vnp_ResponseCode=00",
            "vnpay_return",
        );
        match nav {
            Navigation::Callback(callback) => assert!(callback.is_success()),
            other => panic!("unexpected navigation: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_scheme_is_flagged() {
        let nav = classify_navigation("intent://resolve#Intent;end", "vnpay_return");
        assert_eq!(nav, Navigation::UnknownScheme("intent".to_string()));
    }

    #[test]
    fn test_gateway_page_load_is_allowed() {
        let nav = classify_navigation(
            "https://sandbox.vnpayment.vn/paymentv2/Payment/Transaction.html",
            "vnpay_return",
        );
        assert_eq!(nav, Navigation::Page);
    }
}
