//! Session bootstrapper library.
//!
//! Client side of joining a video room: validate the pre-join choices, ask
//! the connection issuer for a descriptor, connect the media session and
//! push the display name. Leaving goes through one teardown path no matter
//! what triggered it.
//!
//! # Architecture
//!
//! ```text
//! SessionBootstrapper -> CredentialSource (IssuerClient)
//!                     -> MediaSession (media SDK)
//!                     -> Navigator (host UI)
//! ```
//!
//! The three collaborators are traits; each has a `mock` module for tests.
//!
//! # Modules
//!
//! - `bootstrapper` - Join flow and the single leave path
//! - `choices` - Pre-join user choices and validation
//! - `errors` - Error types
//! - `issuer_client` - HTTP client for the connection issuer
//! - `media` - Media session and navigator seams
//! - `observability` - Metrics
//! - `room_link` - Meeting and custom-server links, room ids, passphrases
//! - `state` - Lifecycle state

pub mod bootstrapper;
pub mod choices;
pub mod errors;
pub mod issuer_client;
pub mod media;
pub mod observability;
pub mod room_link;
pub mod state;

pub use bootstrapper::{
    BootstrapConfig, JoinOutcome, JoinRequest, LeaveTrigger, SessionBootstrapper,
};
pub use choices::UserChoices;
pub use errors::BootstrapError;
pub use media::{ConnectOptions, VideoCodec};
pub use room_link::{parse_custom_link, parse_meeting_link, CustomLink, MeetingLink};
pub use state::BootstrapState;
