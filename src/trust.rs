//! Sender classification.
//!
//! Trust-sensitive verbs (rollback, warning) are only honored when the
//! transport-level sender matches a configured bot mask. Everything else
//! is an ordinary peer; unknown senders are never trusted.

use vandal_proto::mask;

/// Classifies transport senders as trusted bots or ordinary peers.
#[derive(Debug, Default, Clone)]
pub struct BotFilter {
    nick_masks: Vec<String>,
    host_masks: Vec<String>,
}

impl BotFilter {
    pub fn new(nick_masks: Vec<String>, host_masks: Vec<String>) -> Self {
        Self { nick_masks, host_masks }
    }

    /// Whether a sender counts as a trusted bot.
    ///
    /// A match on either the nick or the host list is sufficient. With no
    /// masks configured this is always false.
    pub fn is_bot(&self, nick: &str, host: &str) -> bool {
        self.nick_masks.iter().any(|m| mask::matches(m, nick))
            || self.host_masks.iter().any(|m| mask::matches(m, host))
    }
}
