//! Meeting links, room ids and end-to-end encryption passphrases.
//!
//! A meeting link is `/rooms/<name>`, optionally prefixed with an
//! `http(s)://host` origin. Room names are ASCII letters, digits and `-`.
//! An encrypted meeting carries its shared passphrase in the fragment,
//! percent-encoded: `/rooms/<name>#<passphrase>`. The fragment never reaches
//! a server.
//!
//! A custom link, `/custom/?liveKitUrl=<url>&token=<token>[&codec=<codec>]`,
//! carries a ready descriptor for a user-run media server and takes the same
//! passphrase fragment.

use crate::media::{ConnectOptions, VideoCodec};
use common::jwt::peek_claims;
use common::secret::{ExposeSecret, SecretString};
use common::types::ConnectionDetails;
use std::fmt;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const PASSPHRASE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const ROOM_ID_GROUP_LEN: usize = 4;

/// Length of a generated passphrase.
pub const PASSPHRASE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomLinkError {
    #[error("Please enter a meeting link")]
    Empty,

    #[error("Invalid meeting link format. Please use: /rooms/room-name")]
    InvalidFormat,

    #[error("Custom link is missing {0}")]
    MissingParameter(&'static str),

    #[error("Failed to generate random value")]
    Rng,
}

/// A parsed meeting link.
#[derive(Debug, Clone)]
pub struct MeetingLink {
    pub room_name: String,
    /// Shared passphrase for an end-to-end encrypted meeting.
    pub passphrase: Option<SecretString>,
}

impl MeetingLink {
    pub fn is_encrypted(&self) -> bool {
        self.passphrase.is_some()
    }
}

/// A parsed custom-server link.
#[derive(Clone)]
pub struct CustomLink {
    pub server_url: String,
    pub participant_token: String,
    pub options: ConnectOptions,
}

impl fmt::Debug for CustomLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomLink")
            .field("server_url", &self.server_url)
            .field("participant_token", &"[REDACTED]")
            .field("options", &self.options)
            .finish()
    }
}

impl CustomLink {
    /// Descriptor for `SessionBootstrapper::connect_with_details`, plus the
    /// options to connect with. Room and display name are read from the
    /// token; an unreadable token leaves them empty and the media server
    /// decides.
    pub fn into_details(self) -> (ConnectionDetails, ConnectOptions) {
        let (room_name, participant_name) = match peek_claims(&self.participant_token) {
            Ok(claims) => (claims.video.room, claims.name),
            Err(e) => {
                tracing::debug!(target: "bootstrapper.room_link", error = %e, "Custom token is not a readable access token");
                (String::new(), String::new())
            }
        };

        let details = ConnectionDetails {
            server_url: self.server_url,
            room_name,
            participant_token: self.participant_token,
            participant_name,
        };
        (details, self.options)
    }
}

/// Parse a meeting link.
///
/// Accepts `/rooms/<name>` and `http(s)://<host>/rooms/<name>`, each with an
/// optional `#<passphrase>` fragment. Surrounding whitespace is ignored. An
/// empty fragment means no encryption.
///
/// # Errors
///
/// - `RoomLinkError::Empty` for blank input
/// - `RoomLinkError::InvalidFormat` for anything else that does not match,
///   including a fragment that does not decode to UTF-8
pub fn parse_meeting_link(link: &str) -> Result<MeetingLink, RoomLinkError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(RoomLinkError::Empty);
    }

    let (link, fragment) = split_fragment(link);
    let path = strip_origin(link)?;

    let name = path
        .strip_prefix("/rooms/")
        .ok_or(RoomLinkError::InvalidFormat)?;

    if !is_valid_room_name(name) {
        return Err(RoomLinkError::InvalidFormat);
    }

    Ok(MeetingLink {
        room_name: name.to_string(),
        passphrase: fragment.map(decode_passphrase).transpose()?.flatten(),
    })
}

/// Parse a custom-server link.
///
/// `liveKitUrl` and `token` are required; `codec` is optional and unknown
/// codecs are ignored. Other query parameters are ignored.
///
/// # Errors
///
/// - `RoomLinkError::Empty` for blank input
/// - `RoomLinkError::MissingParameter` if `liveKitUrl` or `token` is absent
///   or empty
/// - `RoomLinkError::InvalidFormat` if the path is not `/custom` or a value
///   does not decode to UTF-8
pub fn parse_custom_link(link: &str) -> Result<CustomLink, RoomLinkError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(RoomLinkError::Empty);
    }

    let (link, fragment) = split_fragment(link);
    let (path, query) = link.split_once('?').unwrap_or((link, ""));
    if !strip_origin(path)?.trim_end_matches('/').ends_with("/custom") {
        return Err(RoomLinkError::InvalidFormat);
    }

    let mut server_url = None;
    let mut token = None;
    let mut codec = None;
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "liveKitUrl" => server_url = Some(decode_query_value(value)?),
            "token" => token = Some(decode_query_value(value)?),
            "codec" => codec = VideoCodec::from_query(Some(decode_query_value(value)?.as_str())),
            _ => {}
        }
    }

    let server_url = server_url
        .filter(|url| !url.is_empty())
        .ok_or(RoomLinkError::MissingParameter("liveKitUrl"))?;
    let participant_token = token
        .filter(|token| !token.is_empty())
        .ok_or(RoomLinkError::MissingParameter("token"))?;

    Ok(CustomLink {
        server_url,
        participant_token,
        options: ConnectOptions {
            e2ee_passphrase: fragment.map(decode_passphrase).transpose()?.flatten(),
            video_codec: codec,
            ..ConnectOptions::default()
        },
    })
}

fn split_fragment(link: &str) -> (&str, Option<&str>) {
    match link.split_once('#') {
        Some((link, fragment)) => (link, Some(fragment)),
        None => (link, None),
    }
}

/// Path part of a link, with any `http(s)://host` origin removed.
fn strip_origin(link: &str) -> Result<&str, RoomLinkError> {
    match link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
    {
        // Host runs up to the first '/'; it must be non-empty
        Some(rest) => match rest.find('/') {
            Some(0) | None => Err(RoomLinkError::InvalidFormat),
            Some(idx) => rest.get(idx..).ok_or(RoomLinkError::InvalidFormat),
        },
        None => Ok(link),
    }
}

/// Form-encoded query value: `+` is a space.
fn decode_query_value(value: &str) -> Result<String, RoomLinkError> {
    urlencoding::decode(&value.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| RoomLinkError::InvalidFormat)
}

/// Path of the meeting link for `room_name`, with the passphrase in the
/// fragment when given.
pub fn meeting_link(room_name: &str, passphrase: Option<&SecretString>) -> String {
    match passphrase {
        Some(passphrase) => format!(
            "/rooms/{room_name}#{}",
            encode_passphrase(passphrase.expose_secret())
        ),
        None => format!("/rooms/{room_name}"),
    }
}

/// Percent-encode a passphrase for a link fragment.
pub fn encode_passphrase(passphrase: &str) -> String {
    urlencoding::encode(passphrase).into_owned()
}

/// Decode a link fragment. An empty fragment is no passphrase.
///
/// # Errors
///
/// Returns `RoomLinkError::InvalidFormat` if the fragment does not decode to
/// UTF-8.
pub fn decode_passphrase(fragment: &str) -> Result<Option<SecretString>, RoomLinkError> {
    if fragment.is_empty() {
        return Ok(None);
    }
    let decoded = urlencoding::decode(fragment).map_err(|_| RoomLinkError::InvalidFormat)?;
    Ok(Some(SecretString::from(decoded.into_owned())))
}

/// Non-empty, ASCII letters, digits and `-` only.
pub fn is_valid_room_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Generate a fresh room id of the form `xxxx-xxxx` from `[a-z0-9]`.
///
/// # Errors
///
/// Returns `RoomLinkError::Rng` if the system RNG fails.
pub fn generate_room_id() -> Result<String, RoomLinkError> {
    let first = random_string(ROOM_ID_ALPHABET, ROOM_ID_GROUP_LEN)?;
    let second = random_string(ROOM_ID_ALPHABET, ROOM_ID_GROUP_LEN)?;
    Ok(format!("{first}-{second}"))
}

/// Generate a 64-character passphrase from `[A-Za-z0-9]`.
///
/// # Errors
///
/// Returns `RoomLinkError::Rng` if the system RNG fails.
pub fn generate_passphrase() -> Result<SecretString, RoomLinkError> {
    random_string(PASSPHRASE_ALPHABET, PASSPHRASE_LEN).map(SecretString::from)
}

fn random_string(alphabet: &[u8], len: usize) -> Result<String, RoomLinkError> {
    let rng = SystemRandom::new();
    // Bytes at or above the largest multiple of the alphabet size are
    // rejected so every character is equally likely.
    let threshold = 256 - 256 % alphabet.len();
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];

    while out.len() < len {
        rng.fill(&mut buf).map_err(|_| {
            tracing::error!(target: "bootstrapper.room_link", "Failed to generate random bytes");
            RoomLinkError::Rng
        })?;

        for byte in buf.iter().map(|b| usize::from(*b)).filter(|b| *b < threshold) {
            if out.len() == len {
                break;
            }
            if let Some(&c) = alphabet.get(byte % alphabet.len()) {
                out.push(char::from(c));
            }
        }
    }

    Ok(out)
}
