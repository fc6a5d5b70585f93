use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims issued by the hosted auth provider for a company account.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Company ID
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

pub struct JwtService;

impl JwtService {
    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Self::verify_with_secret(token, &crate::config::Config::jwt_secret())
    }

    pub fn verify_with_secret(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "65f1c0ffee0000000000beef".to_string(),
            email: Some("owner@cafe.com".to_string()),
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_token_signed_with_shared_secret() {
        let claims = JwtService::verify_with_secret(&token("s3cret", 600), "s3cret").unwrap();
        assert_eq!(claims.sub, "65f1c0ffee0000000000beef");
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        assert!(JwtService::verify_with_secret(&token("other", 600), "s3cret").is_err());
        assert!(JwtService::verify_with_secret(&token("s3cret", -3600), "s3cret").is_err());
    }
}
