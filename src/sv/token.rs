use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::prelude::*;

type HmacSha256 = Hmac<Sha256>;

/// Stateless signed download links. A token binds
/// `(user, product, license, issued-at)` under the server secret; nothing
/// is persisted, verification is recomputation.
pub struct Tokens<'a> {
  secret: &'a str,
  ttl: Duration,
}

#[derive(Debug, Default, Serialize)]
pub struct TokenVerification {
  pub valid: bool,
  pub expired: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub product_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub license_key: Option<String>,
}

impl TokenVerification {
  fn invalid() -> Self {
    Self::default()
  }
}

impl<'a> Tokens<'a> {
  pub fn new(secret: &'a str, ttl: Duration) -> Self {
    Self { secret, ttl }
  }

  pub fn generate(
    &self,
    user_id: &str,
    product_id: &str,
    license_key: &str,
  ) -> Result<String> {
    self.generate_at(user_id, product_id, license_key, Utc::now().timestamp())
  }

  fn generate_at(
    &self,
    user_id: &str,
    product_id: &str,
    license_key: &str,
    issued_at: i64,
  ) -> Result<String> {
    // ':' is the payload separator and never appears in uuids or license
    // keys; reject it rather than emit an ambiguous token.
    if [user_id, product_id, license_key].iter().any(|s| s.contains(':')) {
      return Err(Error::InvalidArgs("token fields must not contain ':'".into()));
    }

    let payload = format!("{user_id}:{product_id}:{license_key}:{issued_at}");
    let signature = self.sign(&payload)?;

    Ok(URL_SAFE_NO_PAD.encode(format!("{payload}:{signature}")))
  }

  /// Bad encoding, truncation and signature mismatch all collapse into
  /// `valid: false`; staleness is reported separately once the signature
  /// checks out.
  pub fn verify(&self, token: &str) -> TokenVerification {
    self.verify_at(token, Utc::now().timestamp())
  }

  fn verify_at(&self, token: &str, now: i64) -> TokenVerification {
    let Ok(raw) = URL_SAFE_NO_PAD.decode(token) else {
      return TokenVerification::invalid();
    };
    let Ok(decoded) = String::from_utf8(raw) else {
      return TokenVerification::invalid();
    };

    let parts: Vec<&str> = decoded.split(':').collect();
    let &[user_id, product_id, license_key, issued_at, signature] =
      parts.as_slice()
    else {
      return TokenVerification::invalid();
    };

    let Ok(issued_at) = issued_at.parse::<i64>() else {
      return TokenVerification::invalid();
    };
    let Ok(signature) = hex::decode(signature) else {
      return TokenVerification::invalid();
    };

    let payload = format!("{user_id}:{product_id}:{license_key}:{issued_at}");
    let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes())
    else {
      return TokenVerification::invalid();
    };
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
      return TokenVerification::invalid();
    }

    let expired = now - issued_at > self.ttl.as_secs() as i64;

    TokenVerification {
      valid: !expired,
      expired,
      user_id: Some(user_id.to_string()),
      product_id: Some(product_id.to_string()),
      license_key: Some(license_key.to_string()),
    }
  }

  fn sign(&self, payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
      .map_err(|_| Error::Internal("invalid HMAC key length".into()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TTL: Duration = Duration::from_secs(24 * 3600);

  fn tokens(secret: &str) -> Tokens<'_> {
    Tokens::new(secret, TTL)
  }

  #[test]
  fn test_round_trip() {
    let sv = tokens("test-secret");
    let token = sv.generate("u1", "p1", "AAAA-BBBB-CCCC-DDDD").unwrap();

    let verified = sv.verify(&token);
    assert!(verified.valid);
    assert!(!verified.expired);
    assert_eq!(verified.user_id.as_deref(), Some("u1"));
    assert_eq!(verified.product_id.as_deref(), Some("p1"));
    assert_eq!(verified.license_key.as_deref(), Some("AAAA-BBBB-CCCC-DDDD"));
  }

  #[test]
  fn test_stale_token_reports_expired() {
    let sv = tokens("test-secret");
    let issued = Utc::now().timestamp();
    let token = sv.generate_at("u1", "p1", "k1", issued).unwrap();

    let verified = sv.verify_at(&token, issued + 25 * 3600);
    assert!(!verified.valid);
    assert!(verified.expired);
  }

  #[test]
  fn test_tampered_payload_is_invalid_not_expired() {
    let sv = tokens("test-secret");
    let token = sv.generate("u1", "p1", "k1").unwrap();

    let decoded = String::from_utf8(
      base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(&token)
        .unwrap(),
    )
    .unwrap();
    let tampered = decoded.replacen("u1", "u2", 1);
    let tampered = base64::engine::general_purpose::URL_SAFE_NO_PAD
      .encode(tampered.as_bytes());

    let verified = sv.verify(&tampered);
    assert!(!verified.valid);
    assert!(!verified.expired);
    assert_eq!(verified.user_id, None);
  }

  #[test]
  fn test_wrong_secret_rejected() {
    let token = tokens("secret-a").generate("u1", "p1", "k1").unwrap();
    let verified = tokens("secret-b").verify(&token);
    assert!(!verified.valid);
  }

  #[test]
  fn test_garbage_is_invalid() {
    let sv = tokens("test-secret");
    assert!(!sv.verify("not base64 at all!").valid);
    assert!(!sv.verify(&URL_SAFE_NO_PAD.encode("too:few:parts")).valid);
  }

  #[test]
  fn test_separator_in_fields_rejected() {
    let sv = tokens("test-secret");
    assert!(sv.generate("u:1", "p1", "k1").is_err());
  }
}
