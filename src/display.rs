//! Display line stream and pure formatting helpers.
//!
//! The engine emits classified lines over an unbounded channel; whatever
//! front end consumes them (terminal printer in the binary, a recording
//! sink in tests) is free to render however it likes. The HTML helpers
//! are stateless and live here because they are formatting, not protocol.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use vandal_proto::RevId;

/// Classification of a display line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Chat from an ordinary peer.
    User,
    /// Chat or notice from a trusted bot.
    Bot,
    /// Talk-page traffic (user warnings).
    UserTalk,
    /// Engine status information.
    Info,
}

/// One line destined for the visible log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub kind: MessageType,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl DisplayLine {
    pub fn new(kind: MessageType, text: impl Into<String>) -> Self {
        Self { kind, text: text.into(), at: Utc::now() }
    }
}

/// Sending half of the display stream.
pub type DisplaySender = mpsc::UnboundedSender<DisplayLine>;

/// Receiving half of the display stream.
pub type DisplayReceiver = mpsc::UnboundedReceiver<DisplayLine>;

/// Create a display stream pair.
pub fn channel() -> (DisplaySender, DisplayReceiver) {
    mpsc::unbounded_channel()
}

/// Escape text for embedding in an HTML log widget.
pub fn safe_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the diff URL for a revision on a site with the given script root.
pub fn diff_href(script_url: &str, rev: RevId) -> String {
    format!("{}index.php?diff={rev}", script_url)
}

/// Wrap `label` in a hyperlink to the diff of `rev`.
pub fn diff_link(label: &str, script_url: &str, rev: RevId) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        diff_href(script_url, rev),
        safe_html(label)
    )
}
