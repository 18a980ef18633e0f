use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Computes the hex-encoded HMAC-SHA512 of a webhook body, as sent in the `x-paystack-signature` header.
pub fn webhook_signature(secret: &str, body: &[u8]) -> String {
    match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        },
        // HMAC accepts keys of any length, so this arm is unreachable in practice
        Err(_) => String::default(),
    }
}

/// Checks the `x-paystack-signature` header value against the raw request body in constant time.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
