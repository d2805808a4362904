//! Typed protocol events shared by the encoder and decoder.

/// Revision identifier of a wiki edit.
pub type RevId = u64;

/// Identity a notice is attributed to, as carried in the command payload.
///
/// This is the wiki user the event is about (or self-reported by), not the
/// transport-level sender of the line. Sender trust is a transport concern
/// and is evaluated separately against [`crate::mask`] patterns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Nickname.
    pub nick: String,
    /// Ident (username) portion.
    pub ident: String,
    /// Hostname portion.
    pub host: String,
}

impl Identity {
    /// Build an identity from its three parts.
    pub fn new(
        nick: impl Into<String>,
        ident: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            nick: nick.into(),
            ident: ident.into(),
            host: host.into(),
        }
    }
}

/// A protocol event, one variant per wire verb.
///
/// A single sum type rather than a trait hierarchy so the codec and the
/// correlation queues can match exhaustively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// An edit was reviewed and judged constructive.
    Good {
        /// Revision the judgement applies to.
        rev: RevId,
        /// Peer the judgement is attributed to.
        from: Identity,
    },
    /// An edit was reverted.
    Rollback {
        /// Revision that was reverted.
        rev: RevId,
        /// Peer that performed the revert.
        from: Identity,
    },
    /// An edit looks suspicious but was not acted on.
    Suspicious {
        /// Revision under suspicion.
        rev: RevId,
        /// Peer reporting the suspicion.
        from: Identity,
    },
    /// A peer contributes a score adjustment for an edit.
    Rescore {
        /// Revision the adjustment applies to.
        rev: RevId,
        /// Signed score contribution, added to the local score.
        score: i64,
        /// Peer contributing the score.
        from: Identity,
    },
    /// A warning was delivered to a wiki user.
    Warning {
        /// Wiki user that was warned.
        user: String,
        /// Warning level (escalation step).
        level: u8,
    },
}

impl Notice {
    /// The wire verb for this notice.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Notice::Good { .. } => "good",
            Notice::Rollback { .. } => "rollback",
            Notice::Suspicious { .. } => "suspicious",
            Notice::Rescore { .. } => "rescore",
            Notice::Warning { .. } => "warning",
        }
    }

    /// The revision this notice references, if any.
    ///
    /// Warnings are keyed by user rather than revision and return `None`.
    #[must_use]
    pub fn rev(&self) -> Option<RevId> {
        match self {
            Notice::Good { rev, .. }
            | Notice::Rollback { rev, .. }
            | Notice::Suspicious { rev, .. }
            | Notice::Rescore { rev, .. } => Some(*rev),
            Notice::Warning { .. } => None,
        }
    }
}
