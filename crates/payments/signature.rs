use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length")
}

/// Signature for a closed-payment transaction request:
/// `HMAC-SHA256(secret, merchant_code || merchant_ref || amount)` in lowercase hex.
pub fn sign_outbound(merchant_code: &str, merchant_ref: &str, amount: i64, secret: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(merchant_code.as_bytes());
    mac.update(merchant_ref.as_bytes());
    mac.update(amount.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Signature over the exact bytes of an inbound callback body.
pub fn sign_inbound(raw_body: &[u8], secret: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a provided hex signature against the raw body.
pub fn verify_inbound(raw_body: &[u8], provided_signature_hex: &str, secret: &str) -> bool {
    let Ok(provided) = hex::decode(provided_signature_hex.trim()) else {
        return false;
    };

    let mut mac = mac_for(secret);
    mac.update(raw_body);
    mac.verify_slice(&provided).is_ok()
}
