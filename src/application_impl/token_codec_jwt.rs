use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_key: Vec<u8>,
    pub refresh_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // keeps tokens issued in the same second distinct
    typ: TokenKind,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    fn key(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.cfg.access_key,
            TokenKind::Refresh => &self.cfg.refresh_key,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        }
    }

    fn encode_at(
        &self,
        uid: UserId,
        kind: TokenKind,
        iat_dt: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let exp_dt = TimeDelta::from_std(self.ttl(kind))
            .ok()
            .and_then(|ttl| iat_dt.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Internal(format!("{kind} token lifetime out of range")))?;
        let claims = Claims {
            sub: uid.0.to_string(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            typ: kind,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.key(kind)),
        )
        .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn decode(&self, token: &str, kind: TokenKind) -> Result<UserId, AuthError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = 0;
        v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);

        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.key(kind)), &v)
            .map_err(|_| AuthError::InvalidToken)?;
        if data.claims.typ != kind {
            return Err(AuthError::InvalidToken);
        }
        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken)
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue(&self, user: UserId) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let (access_token, _) = self.encode_at(user, TokenKind::Access, now)?;
        let (refresh_token, refresh_expires_at) = self.encode_at(user, TokenKind::Refresh, now)?;
        Ok(TokenPair {
            access_token: AccessToken(access_token),
            refresh_token: RefreshToken(refresh_token),
            expires_in: self.cfg.access_ttl.as_secs(),
            refresh_expires_at,
        })
    }

    fn verify_access(&self, token: &AccessToken) -> Result<UserId, AuthError> {
        self.decode(&token.0, TokenKind::Access)
    }

    fn verify_refresh(&self, token: &RefreshToken) -> Result<UserId, AuthError> {
        self.decode(&token.0, TokenKind::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            issuer: "cadence.test".to_string(),
            audience: "cadence-client".to_string(),
            access_ttl: Duration::from_secs(3600),
            refresh_ttl: Duration::from_secs(30 * 24 * 3600),
            access_key: b"access-secret".to_vec(),
            refresh_key: b"refresh-secret".to_vec(),
        }
    }

    #[test]
    fn issued_pair_verifies() {
        let codec = JwtHs256Codec::new(config());
        let user = UserId::new_v4();
        let pair = codec.issue(user).unwrap();

        assert_eq!(pair.expires_in, 3600);
        assert_eq!(codec.verify_access(&pair.access_token).unwrap(), user);
        assert_eq!(codec.verify_refresh(&pair.refresh_token).unwrap(), user);
        assert!(pair.refresh_expires_at > Utc::now() + chrono::Duration::days(29));
    }

    #[test]
    fn tokens_issued_back_to_back_differ() {
        let codec = JwtHs256Codec::new(config());
        let user = UserId::new_v4();
        let first = codec.issue(user).unwrap();
        let second = codec.issue(user).unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_ne!(first.access_token, second.access_token);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let codec = JwtHs256Codec::new(config());
        let pair = codec.issue(UserId::new_v4()).unwrap();

        let as_refresh = RefreshToken(pair.access_token.0.clone());
        let as_access = AccessToken(pair.refresh_token.0.clone());
        assert!(matches!(
            codec.verify_refresh(&as_refresh),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            codec.verify_access(&as_access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn token_type_is_checked_even_with_a_shared_secret() {
        let mut cfg = config();
        cfg.refresh_key = cfg.access_key.clone();
        let codec = JwtHs256Codec::new(cfg);
        let pair = codec.issue(UserId::new_v4()).unwrap();

        let as_refresh = RefreshToken(pair.access_token.0.clone());
        assert!(matches!(
            codec.verify_refresh(&as_refresh),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = JwtHs256Codec::new(config());
        let user = UserId::new_v4();
        let long_ago = Utc::now() - chrono::Duration::days(60);

        let (access, _) = codec.encode_at(user, TokenKind::Access, long_ago).unwrap();
        let (refresh, exp) = codec.encode_at(user, TokenKind::Refresh, long_ago).unwrap();
        assert!(exp < Utc::now());

        assert!(matches!(
            codec.verify_access(&AccessToken(access)),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            codec.verify_refresh(&RefreshToken(refresh)),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let codec = JwtHs256Codec::new(config());
        let mut other_cfg = config();
        other_cfg.refresh_key = b"someone-else".to_vec();
        let other = JwtHs256Codec::new(other_cfg);

        let pair = other.issue(UserId::new_v4()).unwrap();
        assert!(matches!(
            codec.verify_refresh(&pair.refresh_token),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            codec.verify_refresh(&RefreshToken("not.a.jwt".to_string())),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn oversized_lifetime_is_an_error_not_a_panic() {
        let mut cfg = config();
        cfg.refresh_ttl = Duration::from_secs(u64::MAX / 2);
        let codec = JwtHs256Codec::new(cfg);

        assert!(matches!(
            codec.issue(UserId::new_v4()),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let codec = JwtHs256Codec::new(config());
        let mut other_cfg = config();
        other_cfg.audience = "another-client".to_string();
        let other = JwtHs256Codec::new(other_cfg);

        let pair = other.issue(UserId::new_v4()).unwrap();
        assert!(matches!(
            codec.verify_access(&pair.access_token),
            Err(AuthError::InvalidToken)
        ));
    }
}
