//! # Notification Signatures
//!
//! Midtrans signs every HTTP notification with
//! `sha512_hex(order_id + status_code + gross_amount + server_key)` and sends
//! the digest as `signature_key`.

use sha2::{Digest, Sha512};
use shop_core::{Notification, PaymentError, PaymentResult};

/// Expected `signature_key` for a notification's signed fields
pub fn compute_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check `notification.signature_key` against the server key.
pub fn verify_signature(notification: &Notification, server_key: &str) -> PaymentResult<()> {
    let expected = compute_signature(
        &notification.order_id,
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );

    let received = notification.signature_key.to_ascii_lowercase();
    if !constant_time_compare(&received, &expected) {
        return Err(PaymentError::NotificationVerificationFailed(
            "signature_key mismatch".to_string(),
        ));
    }

    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
