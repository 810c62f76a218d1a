use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Identity block the backend embeds in the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: UserClaims,
}

/// Why a token could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token carries no user email")]
    MissingEmail,
}

/// Read the claims of a token without checking its signature.
///
/// The result is only fit for showing who is signed in. The backend
/// verifies the token on every request; nothing here should be used to
/// grant access.
pub fn decode_unverified(token: &str) -> Result<Claims, DecodeError> {
    let header = decode_header(token).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if data.claims.user.email.trim().is_empty() {
        return Err(DecodeError::MissingEmail);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn sign(payload: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"backend-only-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_backend_token() {
        let token = sign(json!({
            "user": {"name": "Sammy Slug", "email": "sammy@ucsc.edu", "picture": null}
        }));

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.user.email, "sammy@ucsc.edu");
        assert_eq!(claims.user.name.as_deref(), Some("Sammy Slug"));
        assert_eq!(claims.user.picture, None);
    }

    #[test]
    fn test_decode_ignores_expiry() {
        let token = sign(json!({
            "user": {"email": "sammy@ucsc.edu"},
            "exp": 1
        }));
        assert!(decode_unverified(&token).is_ok());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_unverified("definitely-not-a-jwt"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_without_user() {
        let token = sign(json!({"sub": "123"}));
        assert!(matches!(decode_unverified(&token), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_blank_email() {
        let token = sign(json!({"user": {"email": "  "}}));
        assert_eq!(decode_unverified(&token), Err(DecodeError::MissingEmail));
    }

    #[test]
    fn test_decode_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(DecodeError::MissingEmail);
        assert_eq!(err.to_string(), "token carries no user email");

        let err = DecodeError::Malformed("bad header".to_string());
        assert_eq!(err.to_string(), "malformed token: bad header");
    }
}
