//! Membership of users in yoga sessions.
//!
//! `add` and `remove` do find → mutate → save on the session row. Existence
//! checks always run before membership checks, and the session is only saved
//! on success. Two concurrent calls on the same session are not serialized;
//! whichever saves last wins.

use thiserror::Error;
use tracing::info;

use crate::error::AppError;
use crate::storage::{SharedEntityStore, StoreError, User, YogaSession};

#[derive(Debug, Error)]
pub enum ParticipationError {
    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("user {user_id} already participates in session {session_id}")]
    AlreadyParticipating { session_id: i64, user_id: i64 },

    #[error("user {user_id} does not participate in session {session_id}")]
    NotParticipating { session_id: i64, user_id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind { NotFound, Conflict, Transient }

impl ParticipationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ParticipationError::SessionNotFound(_) | ParticipationError::UserNotFound(_) => FailureKind::NotFound,
            ParticipationError::AlreadyParticipating { .. } | ParticipationError::NotParticipating { .. } => FailureKind::Conflict,
            ParticipationError::Store(_) => FailureKind::Transient,
        }
    }
}

impl From<ParticipationError> for AppError {
    fn from(err: ParticipationError) -> Self {
        let code = match &err {
            ParticipationError::SessionNotFound(_) => "session_not_found",
            ParticipationError::UserNotFound(_) => "user_not_found",
            ParticipationError::AlreadyParticipating { .. } => "already_participating",
            ParticipationError::NotParticipating { .. } => "not_participating",
            ParticipationError::Store(_) => "store_unavailable",
        };
        let message = err.to_string();
        match err.kind() {
            FailureKind::NotFound => AppError::not_found(code.to_string(), message),
            FailureKind::Conflict => AppError::conflict(code.to_string(), message),
            FailureKind::Transient => AppError::io(code.to_string(), message),
        }
    }
}

#[derive(Clone)]
pub struct ParticipationManager {
    sessions: SharedEntityStore<YogaSession>,
    users: SharedEntityStore<User>,
}

impl ParticipationManager {
    pub fn new(sessions: SharedEntityStore<YogaSession>, users: SharedEntityStore<User>) -> Self {
        Self { sessions, users }
    }

    /// Add `user_id` to the session's participants.
    pub fn add(&self, session_id: i64, user_id: i64) -> Result<(), ParticipationError> {
        let mut session = self.sessions.find(session_id)?.ok_or(ParticipationError::SessionNotFound(session_id))?;
        if self.users.find(user_id)?.is_none() {
            return Err(ParticipationError::UserNotFound(user_id));
        }
        if !session.users.insert(user_id) {
            return Err(ParticipationError::AlreadyParticipating { session_id, user_id });
        }
        self.sessions.save(session)?;
        info!(target: "yoga_app::participation", session_id, user_id, "participate");
        Ok(())
    }

    /// Remove `user_id` from the session's participants. Only membership is
    /// checked; the user itself may no longer exist.
    pub fn remove(&self, session_id: i64, user_id: i64) -> Result<(), ParticipationError> {
        let mut session = self.sessions.find(session_id)?.ok_or(ParticipationError::SessionNotFound(session_id))?;
        if !session.users.remove(&user_id) {
            return Err(ParticipationError::NotParticipating { session_id, user_id });
        }
        self.sessions.save(session)?;
        info!(target: "yoga_app::participation", session_id, user_id, "no longer participate");
        Ok(())
    }
}
