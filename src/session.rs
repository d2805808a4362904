//! Sans-IO session state machine.
//!
//! Tracks the connect → authenticate → join lifecycle without performing
//! any I/O: the engine feeds transport callbacks in, and gets back actions
//! (channels to join, a timer to arm). Some servers silently ignore a JOIN
//! sent too soon after login, so one delayed re-request is scheduled and
//! fired only if the primary channel is still unconfirmed.

use std::collections::HashSet;
use std::time::Duration;

/// Lifecycle state of the protocol session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport connection.
    #[default]
    Disconnected,
    /// Transport connect requested, no confirmation yet.
    Connecting,
    /// Connected, waiting for the logged-in callback.
    AuthPending,
    /// Logged in, join requests sent, primary channel not confirmed.
    ChannelPending,
    /// Primary channel confirmed joined.
    Joined,
}

/// Actions produced by the state machine. The caller performs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Request to join this channel.
    Join(String),
    /// Arm a one-shot timer; call [`Session::rejoin_due`] when it fires.
    ArmRejoin(Duration),
}

/// Session state owned by the protocol engine, one per process.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    primary: String,
    joined: HashSet<String>,
    /// Whether the delayed re-join for this connection was already used.
    rejoin_spent: bool,
    rejoin_delay: Duration,
}

impl Session {
    pub fn new(primary: impl Into<String>, rejoin_delay: Duration) -> Self {
        Self {
            state: SessionState::Disconnected,
            primary: primary.into(),
            joined: HashSet::new(),
            rejoin_spent: false,
            rejoin_delay,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether protocol traffic may be sent on this channel.
    pub fn is_joined(&self, channel: &str) -> bool {
        self.joined.contains(channel)
    }

    pub fn primary_joined(&self) -> bool {
        self.joined.contains(&self.primary)
    }

    /// A connect was requested.
    pub fn begin_connect(&mut self) {
        if self.state == SessionState::Disconnected {
            self.state = SessionState::Connecting;
        }
    }

    /// Transport reports the connection is up.
    pub fn on_connected(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::AuthPending;
        }
    }

    /// Transport reports the connect attempt failed.
    pub fn on_connect_failed(&mut self) {
        self.reset();
    }

    /// Logged in: request every registered channel and arm the re-join
    /// window for this connection.
    pub fn on_logged_in<'a, I>(&mut self, channels: I) -> Vec<SessionAction>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.state != SessionState::AuthPending {
            return Vec::new();
        }
        self.state = SessionState::ChannelPending;
        let mut actions: Vec<SessionAction> = channels
            .into_iter()
            .map(|c| SessionAction::Join(c.to_string()))
            .collect();
        actions.push(SessionAction::ArmRejoin(self.rejoin_delay));
        actions
    }

    /// We joined a channel.
    pub fn on_self_joined(&mut self, channel: &str) {
        self.joined.insert(channel.to_string());
        if self.state == SessionState::ChannelPending && channel == self.primary {
            self.state = SessionState::Joined;
        }
    }

    /// We left (or were removed from) a channel.
    pub fn on_self_parted(&mut self, channel: &str) {
        self.joined.remove(channel);
        if self.state == SessionState::Joined && channel == self.primary {
            self.state = SessionState::ChannelPending;
        }
    }

    /// The re-join timer fired. Emits one more round of join requests for
    /// unconfirmed channels, at most once per connection, and only while
    /// the primary channel is still pending.
    pub fn rejoin_due<'a, I>(&mut self, channels: I) -> Vec<SessionAction>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.rejoin_spent || self.state != SessionState::ChannelPending {
            return Vec::new();
        }
        self.rejoin_spent = true;
        channels
            .into_iter()
            .filter(|c| !self.joined.contains(*c))
            .map(|c| SessionAction::Join(c.to_string()))
            .collect()
    }

    /// Any-state transition back to Disconnected. Per-channel flags clear;
    /// the correlation cache is untouched because queued judgements key on
    /// revision ids, not on this session.
    pub fn on_disconnected(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.joined.clear();
        self.rejoin_spent = false;
    }
}
