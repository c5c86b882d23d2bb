use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::{
    config::JwtConfig,
    error::{AccountError, AccountResult},
};

/// Signing and verification keys derived once from the process secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }

    pub fn issue(&self, user_id: i64) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    /// Signature, expiry, issuer and audience must all hold; every failure collapses
    /// into `InvalidToken`.
    pub fn verify(&self, token: &str) -> AccountResult<i64> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AccountError::InvalidToken
        })?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
pub(crate) fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret".into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
        ttl_minutes: 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::new(&test_jwt_config())
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys();
        for id in [1_i64, 42, i64::MAX] {
            let token = keys.issue(id).expect("sign");
            assert_eq!(keys.verify(&token).expect("verify"), id);
        }
    }

    const B64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    #[test]
    fn flipped_signature_bit_is_rejected() {
        let keys = make_keys();
        let token = keys.issue(7).unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;
        for i in sig_start..token.len() {
            let sextet = B64URL.iter().position(|&c| c == token.as_bytes()[i]).unwrap();
            for bit in 0..6 {
                let mut bytes = token.clone().into_bytes();
                bytes[i] = B64URL[sextet ^ (1 << bit)];
                let tampered = String::from_utf8(bytes).unwrap();
                assert!(
                    matches!(keys.verify(&tampered), Err(AccountError::InvalidToken)),
                    "bit {bit} at position {i} was accepted"
                );
            }
        }
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keys = make_keys();
        let token = keys.issue(7).unwrap();
        let other = keys.issue(8).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        parts[1] = other_parts[1];
        assert!(matches!(keys.verify(&parts.join(".")), Err(AccountError::InvalidToken)));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let keys = make_keys();
        for t in ["", "abc", "a.b.c", "Bearer x.y.z"] {
            assert!(matches!(keys.verify(t), Err(AccountError::InvalidToken)));
        }
    }

    #[test]
    fn token_from_rotated_secret_is_rejected() {
        let keys = make_keys();
        let rotated = JwtKeys::new(&JwtConfig {
            secret: "rotated-secret".into(),
            ..test_jwt_config()
        });
        let token = keys.issue(3).unwrap();
        assert!(matches!(rotated.verify(&token), Err(AccountError::InvalidToken)));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys();
        let bad = JwtKeys::new(&JwtConfig {
            issuer: "bad-iss".into(),
            audience: "bad-aud".into(),
            ..test_jwt_config()
        });
        let token = good.issue(3).unwrap();
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = test_jwt_config();
        let keys = JwtKeys::new(&cfg);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: 9,
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(cfg.secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(keys.verify(&token), Err(AccountError::InvalidToken)));
    }
}
