use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Sign a claims struct into a compact HMAC-SHA256 JWT. Access and refresh
/// tokens use this with separate secrets.
pub fn mint_token<C: Serialize>(claims: &C, secret: &str) -> Result<String, String> {
    if secret.is_empty() {
        return Err("Signing secret is not set".to_string());
    }

    let header = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT"
    });

    let header_encoded = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&header).map_err(|e| format!("Failed to encode header: {}", e))?,
    );
    let claims_encoded = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(claims).map_err(|e| format!("Failed to encode claims: {}", e))?,
    );

    let signing_input = format!("{}.{}", header_encoded, claims_encoded);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify signature and expiry, then deserialize the claims.
pub fn validate_token<C: DeserializeOwned>(token: &str, secret: &str) -> Result<C, String> {
    if secret.is_empty() {
        return Err("Signing secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    // Expiry is checked on the raw JSON so the check holds for every claim
    // shape that goes through here.
    let raw: serde_json::Value = serde_json::from_str(&claims_json)
        .map_err(|e| format!("Invalid claims format: {}", e))?;

    if let Some(exp) = raw.get("exp").and_then(|v| v.as_i64()) {
        let now = chrono::Utc::now().timestamp();
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    } else {
        return Err("Token has no expiry".to_string());
    }

    let claims: C = serde_json::from_value(raw).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    #[test]
    fn mint_then_validate_round_trips() {
        let claims = TestClaims {
            sub: "abc".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = mint_token(&claims, "secret-key").unwrap();
        let parsed: TestClaims = validate_token(&token, "secret-key").unwrap();
        assert_eq!(parsed.sub, "abc");
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = TestClaims {
            sub: "abc".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = mint_token(&claims, "secret-key").unwrap();
        let result: Result<TestClaims, _> = validate_token(&token, "other-key");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let claims = TestClaims {
            sub: "abc".to_string(),
            exp: chrono::Utc::now().timestamp() - 10,
        };
        let token = mint_token(&claims, "secret-key").unwrap();
        let result: Result<TestClaims, _> = validate_token(&token, "secret-key");
        assert_eq!(result.unwrap_err(), "Token expired");
    }

    #[test]
    fn rejects_mangled_token() {
        let result: Result<TestClaims, _> = validate_token("nodots", "secret-key");
        assert_eq!(result.unwrap_err(), "Invalid token format");
    }
}
