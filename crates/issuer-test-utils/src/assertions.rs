//! Custom test assertions for issued tokens and identity cookies.

use crate::fixtures::{TEST_API_KEY, TEST_API_SECRET};
use chrono::{DateTime, NaiveDateTime, Utc};
use common::jwt::AccessTokenClaims;
use common::types::{IDENTITY_COOKIE_NAME, IDENTITY_SEPARATOR};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

/// Verify a token with the fixture secret and return its claims.
///
/// Panics if the signature does not verify or the token has expired.
pub fn verify_test_token(token: &str) -> AccessTokenClaims {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 5;
    validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);
    validation.validate_nbf = true;

    decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(TEST_API_SECRET.as_bytes()),
        &validation,
    )
    .unwrap_or_else(|e| panic!("token failed verification with fixture secret: {e}"))
    .claims
}

/// Suffix part of an identity produced for `participant_name`.
///
/// Panics if `identity` is not `participant_name__suffix`.
pub fn identity_suffix<'a>(identity: &'a str, participant_name: &str) -> &'a str {
    let prefix = format!("{participant_name}{IDENTITY_SEPARATOR}");
    identity
        .strip_prefix(&prefix)
        .unwrap_or_else(|| panic!("identity {identity:?} does not start with {prefix:?}"))
}

/// Parsed identity `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCookie {
    pub suffix: String,
    pub attributes: Vec<String>,
    pub expires: DateTime<Utc>,
}

impl IdentityCookie {
    /// Parse a `Set-Cookie` value. Panics if it is not the identity cookie
    /// or has no parseable `Expires` attribute.
    pub fn parse(set_cookie: &str) -> Self {
        let mut parts = set_cookie.split(';').map(str::trim);

        let first = parts.next().unwrap_or_default();
        let (name, suffix) = first
            .split_once('=')
            .unwrap_or_else(|| panic!("malformed Set-Cookie: {set_cookie:?}"));
        assert_eq!(name, IDENTITY_COOKIE_NAME, "unexpected cookie name");

        let attributes: Vec<String> = parts.map(str::to_string).collect();

        let expires_raw = attributes
            .iter()
            .find_map(|a| a.strip_prefix("Expires="))
            .unwrap_or_else(|| panic!("Set-Cookie has no Expires: {set_cookie:?}"));
        let expires = NaiveDateTime::parse_from_str(expires_raw, "%a, %d %b %Y %H:%M:%S GMT")
            .unwrap_or_else(|e| panic!("unparseable Expires {expires_raw:?}: {e}"))
            .and_utc();

        Self {
            suffix: suffix.to_string(),
            attributes,
            expires,
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// Assertions on issued participant tokens.
///
/// # Example
/// ```rust,ignore
/// details.participant_token
///     .assert_signed_by_fixture()
///     .assert_for_room("r1")
///     .assert_for_participant("alice");
/// ```
pub trait TokenAssertions {
    /// Assert the token verifies with the fixture secret and names the
    /// fixture key as issuer.
    fn assert_signed_by_fixture(&self) -> &Self;

    /// Assert the grant is the full participant grant for `room`.
    fn assert_for_room(&self, room: &str) -> &Self;

    /// Assert the subject is `participant_name__<suffix>` and the display
    /// name is `participant_name`.
    fn assert_for_participant(&self, participant_name: &str) -> &Self;

    /// Assert the token expires `seconds` from now, give or take the test's
    /// own run time, and has no not-before bound.
    fn assert_lifetime(&self, seconds: i64) -> &Self;
}

impl TokenAssertions for String {
    fn assert_signed_by_fixture(&self) -> &Self {
        let claims = verify_test_token(self);
        assert_eq!(claims.iss, TEST_API_KEY, "token issuer is not the fixture key");
        self
    }

    fn assert_for_room(&self, room: &str) -> &Self {
        let claims = verify_test_token(self);
        assert!(
            claims.grants_room(room),
            "token grant {:?} is not the full grant for room {room:?}",
            claims.video
        );
        self
    }

    fn assert_for_participant(&self, participant_name: &str) -> &Self {
        let claims = verify_test_token(self);
        let suffix = identity_suffix(&claims.sub, participant_name);
        assert!(!suffix.is_empty(), "identity suffix is empty");
        assert_eq!(claims.name, participant_name, "display name mismatch");
        assert_eq!(claims.jti, claims.sub, "jti should equal the identity");
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = verify_test_token(self);
        let remaining = claims.expires_in(Utc::now().timestamp());
        assert!(
            (seconds - 5..=seconds).contains(&remaining),
            "token expires in {remaining}s, expected about {seconds}s"
        );
        assert_eq!(claims.nbf, 0, "token should be valid immediately");
        self
    }
}
