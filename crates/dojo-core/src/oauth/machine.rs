//! Pure state machine for one OAuth connection attempt.
//!
//! [`transition`] never performs I/O. It returns the next state plus the
//! [`Effect`]s the driver must carry out, so every path can be unit tested
//! without timers or a window.

use crate::models::ConnectionStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingAuth {
        connection_id: String,
        auth_url: String,
        consecutive_errors: u32,
    },
    Active {
        connection_id: String,
    },
    Failed {
        connection_id: Option<String>,
        reason: String,
    },
    Cancelled {
        connection_id: String,
    },
    TimedOut {
        connection_id: String,
    },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Active { .. } | Self::Failed { .. } | Self::Cancelled { .. } | Self::TimedOut { .. }
        )
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingAuth { .. })
    }

    pub fn connection_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AwaitingAuth { connection_id, .. }
            | Self::Active { connection_id }
            | Self::Cancelled { connection_id }
            | Self::TimedOut { connection_id } => Some(connection_id),
            Self::Failed { connection_id, .. } => connection_id.as_deref(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::AwaitingAuth { .. } => "AWAITING_AUTH",
            Self::Active { .. } => "ACTIVE",
            Self::Failed { .. } => "FAILED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::TimedOut { .. } => "TIMED_OUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Initiated {
        connection_id: String,
        auth_url: String,
    },
    InitiateFailed(String),
    StatusPolled(ConnectionStatus),
    PollError(String),
    WindowClosed,
    WindowFailed(String),
    Deadline,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenWindow(String),
    StartTimers,
    StopTimers,
    CloseWindow,
    NotifyConnected(String),
    ShowError(String),
    Warn(String),
    LogPollError(String),
}

/// Compute the next state for `event`.
///
/// Events that make no sense in the current state (a late poll result after
/// the flow ended, a second `Initiated`) leave the state unchanged and
/// produce no effects.
pub fn transition(
    state: &FlowState,
    event: FlowEvent,
    poll_error_threshold: u32,
) -> (FlowState, Vec<Effect>) {
    match (state, event) {
        (FlowState::Idle, FlowEvent::Initiated { connection_id, auth_url }) => (
            FlowState::AwaitingAuth {
                connection_id,
                auth_url: auth_url.clone(),
                consecutive_errors: 0,
            },
            vec![Effect::OpenWindow(auth_url), Effect::StartTimers],
        ),
        (FlowState::Idle, FlowEvent::InitiateFailed(reason)) => {
            (FlowState::Idle, vec![Effect::ShowError(reason)])
        }

        (
            FlowState::AwaitingAuth {
                connection_id,
                auth_url,
                consecutive_errors,
            },
            event,
        ) => awaiting(
            connection_id,
            auth_url,
            *consecutive_errors,
            event,
            poll_error_threshold,
        ),

        (s, FlowEvent::Reset) if s.is_terminal() => (FlowState::Idle, Vec::new()),
        (s, _) => (s.clone(), Vec::new()),
    }
}

fn awaiting(
    connection_id: &str,
    auth_url: &str,
    consecutive_errors: u32,
    event: FlowEvent,
    poll_error_threshold: u32,
) -> (FlowState, Vec<Effect>) {
    let connection_id = connection_id.to_string();
    match event {
        FlowEvent::StatusPolled(ConnectionStatus::Active) => (
            FlowState::Active {
                connection_id: connection_id.clone(),
            },
            vec![
                Effect::StopTimers,
                Effect::CloseWindow,
                Effect::NotifyConnected(connection_id),
            ],
        ),
        FlowEvent::StatusPolled(status @ (ConnectionStatus::Failed | ConnectionStatus::Expired)) => {
            let reason = format!("Connection {} ended with status {}", connection_id, status);
            (
                FlowState::Failed {
                    connection_id: Some(connection_id),
                    reason: reason.clone(),
                },
                vec![Effect::StopTimers, Effect::CloseWindow, Effect::ShowError(reason)],
            )
        }
        FlowEvent::StatusPolled(ConnectionStatus::Pending) => (
            FlowState::AwaitingAuth {
                connection_id,
                auth_url: auth_url.to_string(),
                consecutive_errors: 0,
            },
            Vec::new(),
        ),
        FlowEvent::PollError(message) => {
            let errors = consecutive_errors.saturating_add(1);
            let mut effects = vec![Effect::LogPollError(message)];
            if errors == poll_error_threshold {
                effects.push(Effect::Warn(format!(
                    "Status checks for {} have failed {} times in a row; still waiting",
                    connection_id, errors
                )));
            }
            (
                FlowState::AwaitingAuth {
                    connection_id,
                    auth_url: auth_url.to_string(),
                    consecutive_errors: errors,
                },
                effects,
            )
        }
        FlowEvent::WindowClosed => (
            FlowState::Cancelled { connection_id },
            vec![Effect::StopTimers],
        ),
        FlowEvent::WindowFailed(reason) => (
            FlowState::Failed {
                connection_id: Some(connection_id),
                reason: reason.clone(),
            },
            vec![Effect::StopTimers, Effect::ShowError(reason)],
        ),
        FlowEvent::Deadline => {
            let reason = format!("Timed out waiting for authorization of {}", connection_id);
            (
                FlowState::TimedOut { connection_id },
                vec![Effect::StopTimers, Effect::CloseWindow, Effect::ShowError(reason)],
            )
        }
        FlowEvent::Initiated { .. } | FlowEvent::InitiateFailed(_) | FlowEvent::Reset => (
            FlowState::AwaitingAuth {
                connection_id,
                auth_url: auth_url.to_string(),
                consecutive_errors,
            },
            Vec::new(),
        ),
    }
}
