//! Direct access token signing.
//!
//! Signs media server access tokens locally with the configured API key and
//! secret (HS256). Tokens expire five minutes after issue and carry the full
//! participant grant for exactly one room. `nbf` is 0 so a media server
//! whose clock runs behind the issuer still accepts a fresh token.

use crate::config::SigningCredentials;
use crate::errors::IssuerError;
use common::jwt::{AccessTokenClaims, VideoGrant, ACCESS_TOKEN_TTL};
use common::secret::ExposeSecret;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tracing::instrument;

/// Inputs for a participant token.
#[derive(Debug, Clone)]
pub struct ParticipantTokenRequest<'a> {
    pub room_name: &'a str,
    pub participant_name: &'a str,
    pub identity: &'a str,
    pub metadata: &'a str,
}

/// Build the claims for a participant token issued at `now` (Unix seconds).
pub fn participant_claims(
    api_key: &str,
    request: &ParticipantTokenRequest<'_>,
    now: i64,
) -> AccessTokenClaims {
    let ttl = i64::try_from(ACCESS_TOKEN_TTL.as_secs()).unwrap_or(300);

    AccessTokenClaims {
        iss: api_key.to_string(),
        sub: request.identity.to_string(),
        name: request.participant_name.to_string(),
        metadata: request.metadata.to_string(),
        nbf: 0,
        exp: now + ttl,
        jti: request.identity.to_string(),
        video: VideoGrant::participant(request.room_name),
    }
}

/// Sign a participant token.
///
/// # Errors
///
/// Returns `IssuerError::Crypto` if encoding fails.
#[instrument(skip_all)]
pub fn sign_participant_token(
    credentials: &SigningCredentials,
    request: &ParticipantTokenRequest<'_>,
    now: i64,
) -> Result<String, IssuerError> {
    let claims = participant_claims(&credentials.api_key, request, now);

    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());

    let encoding_key = EncodingKey::from_secret(credentials.api_secret.expose_secret().as_bytes());

    encode(&header, &claims, &encoding_key).map_err(|e| IssuerError::Crypto(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::SecretString;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    const NOW: i64 = 1_700_000_000;

    fn credentials() -> SigningCredentials {
        SigningCredentials {
            api_key: "APIkey".to_string(),
            api_secret: SecretString::from("test-secret-test-secret-test-secret"),
        }
    }

    fn request() -> ParticipantTokenRequest<'static> {
        ParticipantTokenRequest {
            room_name: "r1",
            participant_name: "alice",
            identity: "alice__ab12",
            metadata: "{\"role\":\"guest\"}",
        }
    }

    fn decode_unchecked_time(token: &str, secret: &str) -> AccessTokenClaims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        decode::<AccessTokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_participant_claims() {
        let claims = participant_claims("APIkey", &request(), NOW);

        assert_eq!(claims.iss, "APIkey");
        assert_eq!(claims.sub, "alice__ab12");
        assert_eq!(claims.jti, "alice__ab12");
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.metadata, "{\"role\":\"guest\"}");
        assert_eq!(claims.nbf, 0);
        assert_eq!(claims.exp, NOW + 300);
        assert!(claims.grants_room("r1"));
    }

    #[test]
    fn test_signed_token_verifies_with_secret() {
        let token = sign_participant_token(&credentials(), &request(), NOW).unwrap();
        let claims = decode_unchecked_time(&token, "test-secret-test-secret-test-secret");

        assert_eq!(claims, participant_claims("APIkey", &request(), NOW));
        assert_eq!(claims.expires_in(NOW), 300);
    }

    #[test]
    fn test_token_accepted_by_verifier_with_slow_clock() {
        // Issuer clock a minute ahead of the verifier's.
        let issued_at = chrono::Utc::now().timestamp() + 60;
        let token = sign_participant_token(&credentials(), &request(), issued_at).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        let result = decode::<AccessTokenClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret-test-secret-test-secret"),
            &validation,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_signed_token_rejected_with_other_secret() {
        let token = sign_participant_token(&credentials(), &request(), NOW).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let result = decode::<AccessTokenClaims>(
            &token,
            &DecodingKey::from_secret(b"some-other-secret"),
            &validation,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_header_is_hs256_jwt() {
        let token = sign_participant_token(&credentials(), &request(), NOW).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_empty_participant_name_is_signed() {
        let req = ParticipantTokenRequest {
            room_name: "r1",
            participant_name: "",
            identity: "__ab12",
            metadata: "",
        };
        let token = sign_participant_token(&credentials(), &req, NOW).unwrap();
        let claims = decode_unchecked_time(&token, "test-secret-test-secret-test-secret");
        assert_eq!(claims.sub, "__ab12");
        assert!(claims.name.is_empty());
    }
}
