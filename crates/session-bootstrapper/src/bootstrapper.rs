//! The join flow.
//!
//! `SessionBootstrapper` asks the issuer for a connection descriptor, opens
//! the media session with it, applies the pre-join device choices and pushes
//! the display name until the server reports it back. Every way out of a
//! session (the user's leave control, the SDK's `Disconnected` event, a
//! programmatic call) goes through [`SessionBootstrapper::leave`], which
//! tears the session down exactly once.
//!
//! State lives in a `tokio::sync::watch` channel. Transitions are
//! compare-and-set through `send_if_modified`, so a join racing a leave can
//! never move the bootstrapper out of `Disposed`.

use crate::choices::{validate_choices, UserChoices};
use crate::errors::BootstrapError;
use crate::issuer_client::{CredentialRequest, CredentialSource};
use crate::media::{ConnectOptions, MediaSession, Navigator, SessionEvent, VideoCodec};
use crate::observability::metrics;
use crate::state::BootstrapState;
use common::jwt::peek_claims;
use common::secret::SecretString;
use common::types::{ConnectionDetails, ServerType};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Wait between pushing the display name and checking it was applied.
pub const DEFAULT_NAME_CONFIRMATION_DELAY: Duration = Duration::from_secs(2);

/// Upper bound on display name pushes per join.
pub const DEFAULT_NAME_CONFIRMATION_ATTEMPTS: u32 = 3;

/// Tunables for the join flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub name_confirmation_delay: Duration,
    pub name_confirmation_attempts: u32,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            name_confirmation_delay: DEFAULT_NAME_CONFIRMATION_DELAY,
            name_confirmation_attempts: DEFAULT_NAME_CONFIRMATION_ATTEMPTS,
        }
    }
}

/// Room, issuer and media options for a join. The participant name comes
/// from the validated [`UserChoices`].
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_name: String,
    pub server_type: ServerType,
    pub region: Option<String>,
    pub metadata: Option<String>,
    pub connect_options: ConnectOptions,
}

impl JoinRequest {
    /// Delegated-mode join with no region or metadata.
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            server_type: ServerType::Custom,
            region: None,
            metadata: None,
            connect_options: ConnectOptions::default(),
        }
    }

    pub fn with_server_type(mut self, server_type: ServerType) -> Self {
        self.server_type = server_type;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// End-to-end encrypt the session with the passphrase from the meeting
    /// link fragment.
    pub fn with_e2ee_passphrase(mut self, passphrase: SecretString) -> Self {
        self.connect_options.e2ee_passphrase = Some(passphrase);
        self
    }

    pub fn with_video_codec(mut self, codec: VideoCodec) -> Self {
        self.connect_options.video_codec = Some(codec);
        self
    }

    fn credential_request(&self, participant_name: &str) -> CredentialRequest {
        CredentialRequest {
            room_name: self.room_name.clone(),
            participant_name: participant_name.to_string(),
            server_type: self.server_type,
            region: self.region.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub room_name: String,
    pub server_url: String,
    /// The server reported the requested display name within the retry
    /// bound.
    pub name_confirmed: bool,
}

/// What caused a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveTrigger {
    /// The user's leave control.
    User,
    /// The media session reported a disconnect.
    SessionDisconnected,
    /// Host code tearing the bootstrapper down.
    Programmatic,
}

impl LeaveTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveTrigger::User => "user",
            LeaveTrigger::SessionDisconnected => "session_disconnected",
            LeaveTrigger::Programmatic => "programmatic",
        }
    }
}

struct Inner {
    credentials: Arc<dyn CredentialSource>,
    session: Arc<dyn MediaSession>,
    navigator: Arc<dyn Navigator>,
    config: BootstrapConfig,
    state: watch::Sender<BootstrapState>,
    /// Cancelled once, by the first `leave`.
    cancel_token: CancellationToken,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut task) = self.event_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

/// Drives one media session from credential request to teardown.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionBootstrapper {
    inner: Arc<Inner>,
}

impl SessionBootstrapper {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        session: Arc<dyn MediaSession>,
        navigator: Arc<dyn Navigator>,
        config: BootstrapConfig,
    ) -> Self {
        let (state, _) = watch::channel(BootstrapState::Idle);
        Self {
            inner: Arc::new(Inner {
                credentials,
                session,
                navigator,
                config,
                state,
                cancel_token: CancellationToken::new(),
                event_task: Mutex::new(None),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> BootstrapState {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<BootstrapState> {
        self.inner.state.subscribe()
    }

    /// Request a descriptor from the issuer and connect with it.
    ///
    /// Allowed from `Idle` or `Failed`. Returns once the session is
    /// connected, device choices are applied and display name confirmation
    /// has finished (confirmed or not).
    ///
    /// # Errors
    ///
    /// - `BootstrapError::InvalidState` if a join is already in progress,
    ///   the session is connected, or the bootstrapper was disposed
    /// - `BootstrapError::InvalidChoices` for a blank username
    /// - `BootstrapError::Issuer` / `BootstrapError::Transport` if no
    ///   descriptor could be obtained (the session is never connected)
    /// - `BootstrapError::Connect` if the media session failed to connect
    /// - `BootstrapError::Cancelled` if `leave` ran while the join was in
    ///   flight
    #[instrument(skip_all, fields(room_name = %request.room_name, mode = %request.server_type))]
    pub async fn join(
        &self,
        request: JoinRequest,
        choices: UserChoices,
    ) -> Result<JoinOutcome, BootstrapError> {
        let start = Instant::now();
        self.begin("join", BootstrapState::RequestingCredential, start)?;

        let result = self.request_and_connect(request, choices).await;
        self.finish(result, start)
    }

    /// Connect with a descriptor the user supplied directly, skipping the
    /// issuer. `options` carries the passphrase and codec from the custom
    /// connection link.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join) minus the issuer errors.
    #[instrument(skip_all, fields(room_name = %details.room_name))]
    pub async fn connect_with_details(
        &self,
        details: ConnectionDetails,
        choices: UserChoices,
        options: ConnectOptions,
    ) -> Result<JoinOutcome, BootstrapError> {
        let start = Instant::now();
        self.begin("connect", BootstrapState::Connecting, start)?;

        let result = match validate_choices(choices) {
            Ok(choices) => self.connect_session(details, choices, &options).await,
            Err(e) => Err(e),
        };
        self.finish(result, start)
    }

    /// Tear the session down.
    ///
    /// The first call from any non-disposed state moves to `Disposed`,
    /// cancels an in-flight join, stops camera and microphone, disconnects
    /// the media session and exits the room. Later calls do nothing and
    /// return `false`.
    pub async fn leave(&self, trigger: LeaveTrigger) -> bool {
        let mut previous = None;
        self.inner.state.send_if_modified(|state| {
            if state.is_disposed() {
                return false;
            }
            previous = Some(std::mem::replace(state, BootstrapState::Disposed));
            true
        });

        let Some(previous) = previous else {
            debug!(target: "bootstrapper.session", trigger = trigger.as_str(), "Already disposed");
            return false;
        };

        info!(
            target: "bootstrapper.session",
            trigger = trigger.as_str(),
            from = previous.label(),
            "Leaving session"
        );

        self.inner.cancel_token.cancel();

        let session = &self.inner.session;
        if let Err(e) = session.set_camera_enabled(false, None).await {
            warn!(target: "bootstrapper.session", error = %e, "Failed to stop camera");
        }
        if let Err(e) = session.set_microphone_enabled(false, None).await {
            warn!(target: "bootstrapper.session", error = %e, "Failed to stop microphone");
        }
        session.disconnect().await;
        self.inner.navigator.exit_room();

        metrics::record_leave(trigger.as_str());

        // May be the calling task; nothing below awaits.
        if let Ok(mut task) = self.inner.event_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }

        true
    }

    fn begin(
        &self,
        operation: &'static str,
        next: BootstrapState,
        start: Instant,
    ) -> Result<(), BootstrapError> {
        self.transition(BootstrapState::can_join, next)
            .map_err(|current| {
                debug!(target: "bootstrapper.session", operation, state = current.label(), "Rejected");
                metrics::record_join("rejected", start.elapsed());
                BootstrapError::InvalidState {
                    operation,
                    state: current.to_string(),
                }
            })
    }

    /// Move to `next` if `allowed` holds for the current state. On refusal
    /// returns the state that was found.
    fn transition(
        &self,
        allowed: impl FnOnce(&BootstrapState) -> bool,
        next: BootstrapState,
    ) -> Result<(), BootstrapState> {
        let mut rejected = None;
        self.inner.state.send_if_modified(|state| {
            if allowed(state) {
                *state = next;
                true
            } else {
                rejected = Some(state.clone());
                false
            }
        });

        match rejected {
            None => Ok(()),
            Some(state) => Err(state),
        }
    }

    fn finish(
        &self,
        result: Result<JoinOutcome, BootstrapError>,
        start: Instant,
    ) -> Result<JoinOutcome, BootstrapError> {
        match result {
            Ok(outcome) => {
                info!(
                    target: "bootstrapper.session",
                    name_confirmed = outcome.name_confirmed,
                    "Joined room"
                );
                metrics::record_join("connected", start.elapsed());
                Ok(outcome)
            }
            Err(BootstrapError::Cancelled) => {
                info!(target: "bootstrapper.session", "Join cancelled by leave");
                metrics::record_join("cancelled", start.elapsed());
                Err(BootstrapError::Cancelled)
            }
            Err(e) => {
                let failed = BootstrapState::Failed(e.to_string());
                if self.transition(BootstrapState::is_joining, failed).is_err() {
                    // Disposed while the failure was on its way back.
                    metrics::record_join("cancelled", start.elapsed());
                    return Err(BootstrapError::Cancelled);
                }
                warn!(
                    target: "bootstrapper.session",
                    error_type = e.error_type(),
                    error = %e,
                    "Join failed"
                );
                metrics::record_join("failed", start.elapsed());
                Err(e)
            }
        }
    }

    async fn request_and_connect(
        &self,
        request: JoinRequest,
        choices: UserChoices,
    ) -> Result<JoinOutcome, BootstrapError> {
        let choices = validate_choices(choices)?;
        let credential_request = request.credential_request(&choices.username);

        let details = self
            .unless_cancelled(self.inner.credentials.fetch(&credential_request))
            .await??;

        self.transition(
            |state| *state == BootstrapState::RequestingCredential,
            BootstrapState::Connecting,
        )
        .map_err(|_| BootstrapError::Cancelled)?;

        self.connect_session(details, choices, &request.connect_options)
            .await
    }

    /// Run `fut` unless `leave` fires first, in which case it is dropped.
    async fn unless_cancelled<T>(
        &self,
        fut: impl Future<Output = T>,
    ) -> Result<T, BootstrapError> {
        tokio::select! {
            biased;
            () = self.inner.cancel_token.cancelled() => Err(BootstrapError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Connect, apply device choices and confirm the display name. Entered
    /// in `Connecting`.
    async fn connect_session(
        &self,
        details: ConnectionDetails,
        choices: UserChoices,
        options: &ConnectOptions,
    ) -> Result<JoinOutcome, BootstrapError> {
        let session = &self.inner.session;

        inspect_token(&details);

        // Subscribe first so events fired during connect are not lost.
        let events = session.subscribe();

        self.unless_cancelled(session.connect(
            &details.server_url,
            &details.participant_token,
            options,
        ))
        .await?
        .map_err(|e| BootstrapError::Connect(e.to_string()))?;

        if self
            .transition(
                |state| *state == BootstrapState::Connecting,
                BootstrapState::Connected,
            )
            .is_err()
        {
            // Connect completed after leave; drop the connection it opened.
            session.disconnect().await;
            return Err(BootstrapError::Cancelled);
        }

        debug!(
            target: "bootstrapper.session",
            server_url = %details.server_url,
            e2ee = options.e2ee_enabled(),
            "Media session connected"
        );

        self.spawn_event_listener(events);
        self.apply_device_choices(&choices).await?;
        let name_confirmed = self.confirm_display_name(&choices.username).await?;

        if self.inner.cancel_token.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }

        Ok(JoinOutcome {
            room_name: details.room_name,
            server_url: details.server_url,
            name_confirmed,
        })
    }

    /// Apply the pre-join camera and microphone choices. A call still
    /// waiting on its device when `leave` fires is dropped.
    async fn apply_device_choices(&self, choices: &UserChoices) -> Result<(), BootstrapError> {
        let session = &self.inner.session;

        if let Err(e) = self
            .unless_cancelled(session.set_camera_enabled(
                choices.video_enabled,
                choices.video_device_id.as_deref(),
            ))
            .await?
        {
            warn!(target: "bootstrapper.session", error = %e, "Failed to apply camera choice");
        }

        if let Err(e) = self
            .unless_cancelled(session.set_microphone_enabled(
                choices.audio_enabled,
                choices.audio_device_id.as_deref(),
            ))
            .await?
        {
            warn!(target: "bootstrapper.session", error = %e, "Failed to apply microphone choice");
        }

        Ok(())
    }

    /// Push the display name until the server reports it back, bounded by
    /// the configured attempts. Returns whether it was confirmed.
    async fn confirm_display_name(&self, name: &str) -> Result<bool, BootstrapError> {
        let session = &self.inner.session;
        let metadata = serde_json::json!({ "name": name }).to_string();
        let attempts = self.inner.config.name_confirmation_attempts.max(1);

        for attempt in 1..=attempts {
            if let Err(e) = self.unless_cancelled(session.set_name(name)).await? {
                warn!(target: "bootstrapper.session", attempt, error = %e, "Failed to set display name");
            }
            if let Err(e) = self.unless_cancelled(session.set_metadata(&metadata)).await? {
                warn!(target: "bootstrapper.session", attempt, error = %e, "Failed to set metadata");
            }

            self.unless_cancelled(tokio::time::sleep(self.inner.config.name_confirmation_delay))
                .await?;

            if session.local_name().as_deref() == Some(name) {
                debug!(target: "bootstrapper.session", attempt, "Display name confirmed");
                metrics::record_name_confirmation(true, attempt);
                return Ok(true);
            }

            debug!(target: "bootstrapper.session", attempt, "Display name not yet confirmed");
        }

        warn!(
            target: "bootstrapper.session",
            attempts,
            "Server did not confirm the display name"
        );
        metrics::record_name_confirmation(false, attempts);
        Ok(false)
    }

    fn spawn_event_listener(&self, events: broadcast::Receiver<SessionEvent>) {
        let handle = tokio::spawn(listen_for_events(Arc::downgrade(&self.inner), events));

        if let Ok(mut task) = self.inner.event_task.lock() {
            if let Some(previous) = task.replace(handle) {
                previous.abort();
            }
            // Leave ran between connect and here.
            if self.inner.cancel_token.is_cancelled() {
                if let Some(handle) = task.take() {
                    handle.abort();
                }
            }
        }
    }
}

/// Log what the token grants. Never rejects; the media server decides.
fn inspect_token(details: &ConnectionDetails) {
    match peek_claims(&details.participant_token) {
        Ok(claims) if claims.video.room != details.room_name => {
            warn!(
                target: "bootstrapper.session",
                granted_room = %claims.video.room,
                "Token is scoped to a different room"
            );
        }
        Ok(claims) => {
            debug!(target: "bootstrapper.session", expires_at = claims.exp, "Token inspected");
        }
        Err(e) => {
            debug!(target: "bootstrapper.session", error = %e, "Token is not a readable access token");
        }
    }
}

async fn listen_for_events(inner: Weak<Inner>, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Disconnected) => {
                if let Some(inner) = inner.upgrade() {
                    SessionBootstrapper { inner }
                        .leave(LeaveTrigger::SessionDisconnected)
                        .await;
                }
                break;
            }
            Ok(SessionEvent::Connected) => {
                debug!(target: "bootstrapper.events", "Session connected");
            }
            Ok(SessionEvent::ParticipantConnected { .. }) => {
                debug!(target: "bootstrapper.events", "Remote participant connected");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target: "bootstrapper.events", skipped, "Session event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
