// 커넥션 상태 머신
//
//   Connecting → Authenticating → Joining → Active → Closing → Closed
//        └────────────┴─────────────┴──→ Rejected (종단)
//
// 건너뛰기 금지. 전이표 밖의 전이는 InvalidTransition.

use std::fmt;
use tracing::{trace, warn};

use crate::error::{ChatError, ChatResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Authenticating,
    Joining,
    Active,
    Closing,
    Closed,
    Rejected,
}

impl ConnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::Connecting     => "connecting",
            ConnState::Authenticating => "authenticating",
            ConnState::Joining        => "joining",
            ConnState::Active         => "active",
            ConnState::Closing        => "closing",
            ConnState::Closed         => "closed",
            ConnState::Rejected       => "rejected",
        }
    }

    pub fn can_transition(&self, next: ConnState) -> bool {
        use ConnState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Authenticating, Joining)
                | (Joining, Active)
                | (Active, Active)
                | (Active, Closing)
                | (Closing, Closed)
                | (Connecting, Rejected)
                | (Authenticating, Rejected)
                | (Joining, Rejected)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnState::Closed | ConnState::Rejected)
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// [ConnSession] 커넥션 하나의 상태 보관
// ----------------------------------------------------------------------------

pub struct ConnSession {
    pub conn_id: u64,
    state:       ConnState,
}

impl ConnSession {
    pub fn new(conn_id: u64) -> Self {
        Self { conn_id, state: ConnState::Connecting }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ConnState::Active
    }

    pub fn transition(&mut self, next: ConnState) -> ChatResult<()> {
        if !self.state.can_transition(next) {
            warn!("[conn] conn={} invalid transition {} -> {}", self.conn_id, self.state, next);
            return Err(ChatError::InvalidTransition { from: self.state, to: next });
        }
        trace!("[conn] conn={} {} -> {}", self.conn_id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Active 에서만 프레임 처리
    pub fn ensure_active(&self) -> ChatResult<()> {
        if self.is_active() { Ok(()) } else { Err(ChatError::NotReady) }
    }
}
