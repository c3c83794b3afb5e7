//! Payment signature verification
//!
//! The order gateway signs `"{order_id}|{payment_id}"` with the account key secret
//! (HMAC-SHA256, hex encoded) and hands the signature to the browser on success.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verification request as posted by the client after the payment widget succeeds
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentVerification {
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_signature: Option<String>,
}

impl PaymentVerification {
    /// Verify against `key_secret`, returning `(order_id, payment_id)` on success
    pub fn verify(&self, key_secret: &str) -> Result<(String, String)> {
        let fields = (
            self.razorpay_order_id.as_deref().filter(|s| !s.is_empty()),
            self.razorpay_payment_id.as_deref().filter(|s| !s.is_empty()),
            self.razorpay_signature.as_deref().filter(|s| !s.is_empty()),
        );
        let (Some(order_id), Some(payment_id), Some(signature)) = fields else {
            return Err(PaymentError::validation(
                "Missing required fields for verification",
            ));
        };

        verify_payment_signature(order_id, payment_id, signature, key_secret)?;
        Ok((order_id.to_string(), payment_id.to_string()))
    }
}

/// Compute the expected signature for an order/payment pair
pub fn sign_payment(order_id: &str, payment_id: &str, key_secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("Invalid key secret: {e}")))?;
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a payment signature in constant time
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &str,
) -> Result<()> {
    let expected = hex::decode(signature).map_err(|_| PaymentError::SignatureMismatch)?;

    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("Invalid key secret: {e}")))?;
    mac.update(format!("{order_id}|{payment_id}").as_bytes());

    mac.verify_slice(&expected).map_err(|_| {
        tracing::warn!(order_id = %order_id, payment_id = %payment_id, "Payment signature mismatch");
        PaymentError::SignatureMismatch
    })
}
