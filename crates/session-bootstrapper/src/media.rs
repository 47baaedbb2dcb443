//! Seams to the real-time media SDK and the host application.
//!
//! `MediaSession` wraps the SDK's room object; `Navigator` is whatever the
//! host uses to leave the meeting view. Both are traits so the join flow can
//! be driven by the mocks in [`mock`] in tests.

use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

/// Error reported by the media SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MediaError(pub String);

/// Video codec preference for published tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    H264,
    Vp9,
    Av1,
    H265,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "vp8",
            VideoCodec::H264 => "h264",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Av1 => "av1",
            VideoCodec::H265 => "h265",
        }
    }

    /// Interpret a `codec` query value. Unknown values mean "SDK default".
    pub fn from_query(value: Option<&str>) -> Option<Self> {
        match value? {
            "vp8" => Some(VideoCodec::Vp8),
            "h264" => Some(VideoCodec::H264),
            "vp9" => Some(VideoCodec::Vp9),
            "av1" => Some(VideoCodec::Av1),
            "h265" => Some(VideoCodec::H265),
            _ => None,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options passed through to the SDK's connect call.
///
/// Key exchange for end-to-end encryption belongs to the SDK; the
/// bootstrapper only hands it the shared passphrase.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Subscribe to remote tracks as they are published.
    pub auto_subscribe: bool,
    /// Shared passphrase. `Some` turns end-to-end encryption on.
    pub e2ee_passphrase: Option<SecretString>,
    /// `None` leaves the codec to the SDK.
    pub video_codec: Option<VideoCodec>,
}

impl ConnectOptions {
    pub fn e2ee_enabled(&self) -> bool {
        self.e2ee_passphrase.is_some()
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            auto_subscribe: true,
            e2ee_passphrase: None,
            video_codec: None,
        }
    }
}

/// Events emitted by the media session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    ParticipantConnected { identity: String },
    Disconnected,
}

/// The SDK room object.
#[async_trait::async_trait]
pub trait MediaSession: Send + Sync {
    /// Open the signalling connection and join the room the token grants.
    async fn connect(
        &self,
        server_url: &str,
        token: &str,
        options: &ConnectOptions,
    ) -> Result<(), MediaError>;

    /// Request a display name change for the local participant.
    async fn set_name(&self, name: &str) -> Result<(), MediaError>;

    /// Replace the local participant's metadata.
    async fn set_metadata(&self, metadata: &str) -> Result<(), MediaError>;

    /// Display name of the local participant as last reported by the server.
    fn local_name(&self) -> Option<String>;

    async fn set_camera_enabled(
        &self,
        enabled: bool,
        device_id: Option<&str>,
    ) -> Result<(), MediaError>;

    async fn set_microphone_enabled(
        &self,
        enabled: bool,
        device_id: Option<&str>,
    ) -> Result<(), MediaError>;

    async fn disconnect(&self);

    /// Subscribe to session events. Events sent before the call are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Host navigation.
pub trait Navigator: Send + Sync {
    /// Leave the meeting view (e.g. return to the landing page).
    fn exit_room(&self);
}

/// Mock media session and navigator for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Calls recorded by `MockMediaSession`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MediaCall {
        Connect { server_url: String, token: String },
        SetName(String),
        SetMetadata(String),
        SetCamera { enabled: bool, device_id: Option<String> },
        SetMicrophone { enabled: bool, device_id: Option<String> },
        Disconnect,
    }

    /// How the mock answers `connect`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ConnectBehavior {
        Succeed,
        Fail(String),
        /// Never completes.
        Hang,
    }

    /// Mock SDK room.
    ///
    /// `local_name` starts reporting the requested name after the configured
    /// number of `set_name` calls, which lets tests drive the confirmation
    /// retry.
    pub struct MockMediaSession {
        connect_behavior: ConnectBehavior,
        /// `set_name` calls needed before the name is reported back.
        /// `None` means never.
        confirm_name_after: Option<usize>,
        set_name_calls: AtomicUsize,
        reported_name: Mutex<Option<String>>,
        calls: Mutex<Vec<MediaCall>>,
        connect_options: Mutex<Option<ConnectOptions>>,
        /// Time a device takes to start when enabled.
        device_start_delay: Option<Duration>,
        connected: AtomicBool,
        events: broadcast::Sender<SessionEvent>,
    }

    impl MockMediaSession {
        fn with(connect_behavior: ConnectBehavior, confirm_name_after: Option<usize>) -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                connect_behavior,
                confirm_name_after,
                set_name_calls: AtomicUsize::new(0),
                reported_name: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
                connect_options: Mutex::new(None),
                device_start_delay: None,
                connected: AtomicBool::new(false),
                events,
            }
        }

        /// Connects, and confirms the name on the first attempt.
        pub fn connecting() -> Self {
            Self::with(ConnectBehavior::Succeed, Some(1))
        }

        /// Connects; the name is confirmed after `attempts` `set_name` calls.
        pub fn confirming_name_after(attempts: usize) -> Self {
            Self::with(ConnectBehavior::Succeed, Some(attempts))
        }

        /// Connects, but the server never reports the requested name.
        pub fn never_confirming_name() -> Self {
            Self::with(ConnectBehavior::Succeed, None)
        }

        /// `connect` fails with `message`.
        pub fn failing(message: &str) -> Self {
            Self::with(ConnectBehavior::Fail(message.to_string()), Some(1))
        }

        /// `connect` never completes.
        pub fn hanging() -> Self {
            Self::with(ConnectBehavior::Hang, Some(1))
        }

        /// Enabling camera or microphone takes `delay` and is recorded when
        /// it completes. Disabling is immediate.
        pub fn with_slow_device_start(mut self, delay: Duration) -> Self {
            self.device_start_delay = Some(delay);
            self
        }

        /// Options passed to the last `connect`.
        pub fn last_connect_options(&self) -> Option<ConnectOptions> {
            self.connect_options.lock().ok().and_then(|o| o.clone())
        }

        /// Emit an SDK event to subscribers.
        pub fn emit(&self, event: SessionEvent) {
            let _ = self.events.send(event);
        }

        pub fn calls(&self) -> Vec<MediaCall> {
            self.calls.lock().map(|c| c.to_vec()).unwrap_or_default()
        }

        pub fn count(&self, matches: impl Fn(&MediaCall) -> bool) -> usize {
            self.calls().iter().filter(|c| matches(c)).count()
        }

        pub fn connect_count(&self) -> usize {
            self.count(|c| matches!(c, MediaCall::Connect { .. }))
        }

        pub fn disconnect_count(&self) -> usize {
            self.count(|c| matches!(c, MediaCall::Disconnect))
        }

        pub fn set_name_count(&self) -> usize {
            self.set_name_calls.load(Ordering::SeqCst)
        }

        pub fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn record(&self, call: MediaCall) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        async fn start_device(&self, enabled: bool) {
            if let (true, Some(delay)) = (enabled, self.device_start_delay) {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait::async_trait]
    impl MediaSession for MockMediaSession {
        async fn connect(
            &self,
            server_url: &str,
            token: &str,
            options: &ConnectOptions,
        ) -> Result<(), MediaError> {
            self.record(MediaCall::Connect {
                server_url: server_url.to_string(),
                token: token.to_string(),
            });
            if let Ok(mut last) = self.connect_options.lock() {
                *last = Some(options.clone());
            }

            match &self.connect_behavior {
                ConnectBehavior::Succeed => {
                    self.connected.store(true, Ordering::SeqCst);
                    self.emit(SessionEvent::Connected);
                    Ok(())
                }
                ConnectBehavior::Fail(message) => Err(MediaError(message.clone())),
                ConnectBehavior::Hang => std::future::pending().await,
            }
        }

        async fn set_name(&self, name: &str) -> Result<(), MediaError> {
            self.record(MediaCall::SetName(name.to_string()));
            let calls = self.set_name_calls.fetch_add(1, Ordering::SeqCst) + 1;

            if self.confirm_name_after.is_some_and(|n| calls >= n) {
                if let Ok(mut reported) = self.reported_name.lock() {
                    *reported = Some(name.to_string());
                }
            }
            Ok(())
        }

        async fn set_metadata(&self, metadata: &str) -> Result<(), MediaError> {
            self.record(MediaCall::SetMetadata(metadata.to_string()));
            Ok(())
        }

        fn local_name(&self) -> Option<String> {
            self.reported_name.lock().ok().and_then(|n| n.clone())
        }

        async fn set_camera_enabled(
            &self,
            enabled: bool,
            device_id: Option<&str>,
        ) -> Result<(), MediaError> {
            self.start_device(enabled).await;
            self.record(MediaCall::SetCamera {
                enabled,
                device_id: device_id.map(str::to_string),
            });
            Ok(())
        }

        async fn set_microphone_enabled(
            &self,
            enabled: bool,
            device_id: Option<&str>,
        ) -> Result<(), MediaError> {
            self.start_device(enabled).await;
            self.record(MediaCall::SetMicrophone {
                enabled,
                device_id: device_id.map(str::to_string),
            });
            Ok(())
        }

        async fn disconnect(&self) {
            self.record(MediaCall::Disconnect);
            if self.connected.swap(false, Ordering::SeqCst) {
                self.emit(SessionEvent::Disconnected);
            }
        }

        fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
            self.events.subscribe()
        }
    }

    /// Mock navigator counting `exit_room` calls.
    #[derive(Default)]
    pub struct MockNavigator {
        exits: AtomicUsize,
    }

    impl MockNavigator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn exit_count(&self) -> usize {
            self.exits.load(Ordering::SeqCst)
        }
    }

    impl Navigator for MockNavigator {
        fn exit_room(&self) {
            self.exits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_confirms_name_after_threshold() {
        let session = MockMediaSession::confirming_name_after(2);

        assert!(session.set_name("alice").await.is_ok());
        assert_eq!(session.local_name(), None);

        assert!(session.set_name("alice").await.is_ok());
        assert_eq!(session.local_name().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_mock_disconnect_emits_once() {
        let session = MockMediaSession::connecting();
        let mut events = session.subscribe();

        assert!(session
            .connect("wss://m", "t", &ConnectOptions::default())
            .await
            .is_ok());
        assert_eq!(events.recv().await.ok(), Some(SessionEvent::Connected));

        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(events.recv().await.ok(), Some(SessionEvent::Disconnected));
        assert!(events.try_recv().is_err());
        assert_eq!(session.disconnect_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_failing_connect() {
        let session = MockMediaSession::failing("ws closed");
        let result = session
            .connect("wss://m", "t", &ConnectOptions::default())
            .await;
        assert_eq!(result, Err(MediaError("ws closed".to_string())));
        assert!(!session.is_connected());
    }

    #[test]
    fn test_connect_options_default() {
        let options = ConnectOptions::default();
        assert!(options.auto_subscribe);
        assert!(!options.e2ee_enabled());
        assert_eq!(options.video_codec, None);
    }

    #[test]
    fn test_video_codec_from_query() {
        assert_eq!(VideoCodec::from_query(Some("vp9")), Some(VideoCodec::Vp9));
        assert_eq!(VideoCodec::from_query(Some("av1")), Some(VideoCodec::Av1));
        assert_eq!(VideoCodec::from_query(Some("VP9")), None);
        assert_eq!(VideoCodec::from_query(Some("")), None);
        assert_eq!(VideoCodec::from_query(None), None);
        assert_eq!(VideoCodec::H264.to_string(), "h264");
    }

    #[tokio::test]
    async fn test_mock_keeps_connect_options() {
        let session = MockMediaSession::connecting();
        let options = ConnectOptions {
            e2ee_passphrase: Some(SecretString::from("pass")),
            video_codec: Some(VideoCodec::Vp9),
            ..ConnectOptions::default()
        };

        assert!(session.connect("wss://m", "t", &options).await.is_ok());

        let seen = session.last_connect_options();
        assert!(seen.as_ref().is_some_and(ConnectOptions::e2ee_enabled));
        assert_eq!(seen.and_then(|o| o.video_codec), Some(VideoCodec::Vp9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_slow_device_records_on_completion() {
        let session = MockMediaSession::connecting().with_slow_device_start(Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        assert!(session.set_camera_enabled(true, None).await.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(1));

        let stopped_at = tokio::time::Instant::now();
        assert!(session.set_camera_enabled(false, None).await.is_ok());
        assert_eq!(stopped_at.elapsed(), Duration::ZERO);
        assert_eq!(session.calls().len(), 2);
    }

    #[test]
    fn test_mock_navigator_counts() {
        let navigator = MockNavigator::new();
        navigator.exit_room();
        navigator.exit_room();
        assert_eq!(navigator.exit_count(), 2);
    }
}
