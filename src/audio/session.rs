//! # Playback Session Management
//!
//! A session is one continuous assistant response stream: one sample store, one pair of playback
//! handles, one set of stats. The manager enforces the concurrent-session limit and cleans up
//! sessions that have ended.
//!
//! ## Session Lifecycle:
//! 1. **Created**: store allocated, signals already accepted (pre-roll can fill early)
//! 2. **Playing**: the host clock has taken the output handle
//! 3. **Ended**: upstream finished or the host shut down; further signals are ignored
//! 4. **Error**: the host failed; further signals are ignored

use crate::audio::driver::PlaybackState;
use crate::audio::shared::{playback_channel, PlaybackControl, PlaybackOutput};
use crate::audio::signal::{InboundSignal, SignalHandler};
use crate::audio::store::{SampleStore, SampleStoreConfig};
use crate::error::{AppError, AppResult};
use crate::stats::{PlaybackStats, StatsSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Current status of a playback session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Created,
    Playing,
    Ended,
    /// Host failure, with the reason
    Error(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Playing => "playing",
            SessionStatus::Ended => "ended",
            SessionStatus::Error(_) => "error",
        }
    }

    pub fn accepts_signals(&self) -> bool {
        matches!(self, SessionStatus::Created | SessionStatus::Playing)
    }
}

/// One playback stream.
///
/// ## Thread Safety:
/// The session is shared as `Arc<PlaybackSession>` between the task that reads inbound signals
/// and whatever reports on it. The control handle sits behind its own `Mutex` so signals are
/// applied one at a time in arrival order. The output handle is moved out once, onto the host
/// clock, and never touched through the session again.
pub struct PlaybackSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    ended_at: RwLock<Option<DateTime<Utc>>>,
    status: RwLock<SessionStatus>,
    pub config: SampleStoreConfig,
    stats: Arc<PlaybackStats>,
    control: Mutex<PlaybackControl>,
    output: Mutex<Option<PlaybackOutput>>,
}

impl PlaybackSession {
    pub fn new(session_id: String, config: SampleStoreConfig) -> Self {
        let stats = Arc::new(PlaybackStats::new());
        let (control, output) = playback_channel(SampleStore::new(config), Arc::clone(&stats));

        Self {
            session_id,
            created_at: Utc::now(),
            ended_at: RwLock::new(None),
            status: RwLock::new(SessionStatus::Created),
            config,
            stats,
            control: Mutex::new(control),
            output: Mutex::new(Some(output)),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_status(&self, new_status: SessionStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = new_status;
    }

    fn control(&self) -> MutexGuard<'_, PlaybackControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.stats
    }

    pub fn state(&self) -> PlaybackState {
        self.control().state()
    }

    /// Samples buffered and not yet played.
    pub fn occupied(&self) -> usize {
        self.control().occupied()
    }

    /// Start playback and hand the output handle to the host clock.
    ///
    /// ## State Transition:
    /// Created → Playing. The output handle can only be taken once.
    pub fn start(&self) -> AppResult<PlaybackOutput> {
        let current_status = self.status();
        if current_status != SessionStatus::Created {
            return Err(AppError::SessionError(format!(
                "Cannot start session {} from status: {}",
                self.session_id,
                current_status.as_str()
            )));
        }

        let output = self
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                AppError::SessionError(format!(
                    "Output handle for session {} was already taken",
                    self.session_id
                ))
            })?;

        self.set_status(SessionStatus::Playing);
        info!(session_id = %self.session_id, "Playback session started");
        Ok(output)
    }

    /// Forward one inbound signal. Returns false when the session no longer accepts signals.
    pub fn handle_signal(&self, signal: &InboundSignal) -> bool {
        let status = self.status();
        if !status.accepts_signals() {
            self.stats.record_ignored_signal();
            debug!(
                session_id = %self.session_id,
                kind = signal.kind(),
                status = status.as_str(),
                "Ignoring signal for inactive session"
            );
            return false;
        }

        self.control().handle(signal);
        true
    }

    /// Barge-in shortcut.
    pub fn interrupt(&self) -> bool {
        self.handle_signal(&InboundSignal::Interrupt)
    }

    /// End the session.
    ///
    /// ## State Transition:
    /// Created/Playing → Ended
    pub fn end(&self) -> AppResult<()> {
        let current_status = self.status();
        if !current_status.accepts_signals() {
            return Err(AppError::SessionError(format!(
                "Cannot end session {} from status: {}",
                self.session_id,
                current_status.as_str()
            )));
        }

        self.set_status(SessionStatus::Ended);
        *self.ended_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        info!(session_id = %self.session_id, "Playback session ended");
        Ok(())
    }

    /// Mark the session as failed.
    pub fn set_error(&self, error_message: String) {
        *self.ended_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        self.set_status(SessionStatus::Error(error_message));
    }

    /// Seconds from creation to now, or to the end time.
    pub fn duration_seconds(&self) -> f64 {
        let end_time = self
            .ended_at
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(Utc::now);
        end_time.signed_duration_since(self.created_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            status: self.status().as_str().to_string(),
            state: self.state().as_str().to_string(),
            duration_seconds: self.duration_seconds(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Serializable view of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: String,
    pub state: String,
    pub duration_seconds: f64,
    pub stats: StatsSnapshot,
}

/// Tracks concurrent playback sessions.
///
/// ## Resource Management:
/// - Enforces the maximum concurrent session limit (ended sessions count until cleaned up)
/// - Every session gets the same store sizing
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<PlaybackSession>>>,
    max_concurrent_sessions: usize,
    default_config: SampleStoreConfig,
}

impl SessionManager {
    pub fn new(max_concurrent_sessions: usize, default_config: SampleStoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_concurrent_sessions,
            default_config,
        }
    }

    /// Create a session. A UUID is generated when no ID is given.
    ///
    /// ## Returns:
    /// - **Ok(session)**: Session created
    /// - **Err(SessionError)**: Limit reached or the ID is already in use
    pub fn create_session(&self, session_id: Option<String>) -> AppResult<Arc<PlaybackSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if sessions.len() >= self.max_concurrent_sessions {
            return Err(AppError::SessionError(format!(
                "Maximum concurrent sessions ({}) reached",
                self.max_concurrent_sessions
            )));
        }

        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if sessions.contains_key(&session_id) {
            return Err(AppError::SessionError(format!(
                "Session ID '{}' already exists",
                session_id
            )));
        }

        let session = Arc::new(PlaybackSession::new(session_id.clone(), self.default_config));
        sessions.insert(session_id.clone(), Arc::clone(&session));

        debug!(
            session_id = %session_id,
            initial_capacity = self.default_config.initial_capacity,
            pre_roll_threshold = self.default_config.pre_roll_threshold,
            "Playback session created"
        );
        Ok(session)
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<PlaybackSession>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned()
    }

    pub fn remove_session(&self, session_id: &str) -> AppResult<Arc<PlaybackSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .remove(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", session_id)))
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop sessions that have ended or failed. Returns how many were removed.
    pub fn cleanup_ended_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| session.status().accepts_signals());
        before - sessions.len()
    }

    pub fn summary(&self) -> SessionManagerSummary {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);

        let mut status_counts = HashMap::new();
        let mut total_samples_written = 0;

        for session in sessions.values() {
            *status_counts
                .entry(session.status().as_str().to_string())
                .or_insert(0) += 1;
            total_samples_written += session.stats().snapshot().samples_written;
        }

        SessionManagerSummary {
            total_sessions: sessions.len(),
            max_sessions: self.max_concurrent_sessions,
            status_counts,
            total_samples_written,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionManagerSummary {
    pub total_sessions: usize,
    pub max_sessions: usize,
    pub status_counts: HashMap<String, usize>,
    pub total_samples_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SampleStoreConfig {
        SampleStoreConfig {
            initial_capacity: 8,
            pre_roll_threshold: 2,
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let session = PlaybackSession::new("s1".to_string(), small_config());
        assert_eq!(session.status(), SessionStatus::Created);
        assert_eq!(session.state(), PlaybackState::PreRolling);

        // pre-roll can fill before the clock starts
        assert!(session.handle_signal(&InboundSignal::AudioChunk { samples: vec![0.5; 4] }));
        assert_eq!(session.state(), PlaybackState::Playing);

        let mut output = session.start().unwrap();
        assert_eq!(session.status(), SessionStatus::Playing);
        assert_eq!(output.process(4), vec![0.5; 4]);

        session.end().unwrap();
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(session.end().is_err());
    }

    #[test]
    fn test_output_taken_once() {
        let session = PlaybackSession::new("s1".to_string(), small_config());
        assert!(session.start().is_ok());
        assert!(matches!(session.start(), Err(AppError::SessionError(_))));
    }

    #[test]
    fn test_signals_ignored_after_end() {
        let session = PlaybackSession::new("s1".to_string(), small_config());
        session.end().unwrap();

        assert!(!session.handle_signal(&InboundSignal::AudioChunk { samples: vec![1.0; 4] }));
        assert!(!session.interrupt());

        let snapshot = session.stats().snapshot();
        assert_eq!(snapshot.ignored_signals, 2);
        assert_eq!(snapshot.chunks_received, 0);
    }

    #[test]
    fn test_interrupt_through_session() {
        let session = PlaybackSession::new("s1".to_string(), small_config());
        let mut output = session.start().unwrap();
        session.handle_signal(&InboundSignal::AudioChunk { samples: vec![0.5; 6] });

        assert!(session.interrupt());
        assert_eq!(output.process(2), vec![0.0, 0.0]);
        assert_eq!(session.summary().stats.interrupts, 1);
    }

    #[test]
    fn test_manager_limit_and_cleanup() {
        let manager = SessionManager::new(2, small_config());
        let first = manager.create_session(Some("a".to_string())).unwrap();
        manager.create_session(None).unwrap();
        assert!(matches!(manager.create_session(None), Err(AppError::SessionError(_))));

        first.end().unwrap();
        assert_eq!(manager.cleanup_ended_sessions(), 1);
        assert_eq!(manager.active_session_count(), 1);
        assert!(manager.get_session("a").is_none());
    }

    #[test]
    fn test_manager_duplicate_and_missing_ids() {
        let manager = SessionManager::new(4, small_config());
        manager.create_session(Some("dup".to_string())).unwrap();
        assert!(manager.create_session(Some("dup".to_string())).is_err());

        assert!(matches!(manager.remove_session("nope"), Err(AppError::NotFound(_))));
        assert!(manager.remove_session("dup").is_ok());
    }

    #[test]
    fn test_manager_summary() {
        let manager = SessionManager::new(4, small_config());
        let session = manager.create_session(None).unwrap();
        session.handle_signal(&InboundSignal::AudioChunk { samples: vec![0.1; 3] });
        manager.create_session(None).unwrap().end().unwrap();

        let summary = manager.summary();
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.status_counts.get("created"), Some(&1));
        assert_eq!(summary.status_counts.get("ended"), Some(&1));
        assert_eq!(summary.total_samples_written, 3);
    }
}
