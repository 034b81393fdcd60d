use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of an opaque token. Used for storage-side lookup of refresh
/// credentials; this is not password hashing.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Stable digest over the caller's device context. Bound into both token
/// kinds so a stolen refresh token is tied to its origin.
pub fn device_fingerprint(user_agent: &str, source_addr: &str, device: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(source_addr.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(device.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Random 32-byte URL-safe identifier for refresh-token rotation ids.
pub fn random_token_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time equality for stored digests.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(a.as_bytes(), b.as_bytes()).is_ok()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
