//! Protocol engine.
//!
//! Receives transport callbacks, decodes channel traffic, gates
//! trust-sensitive verbs on the bot filter, and reconciles remote
//! judgements with the local edit working set through the correlation
//! cache. Outbound announcements are best-effort: a channel that is not
//! confirmed joined drops the send.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vandal_proto::{decode, encode, Identity, Notice, Payload, RevId};

use crate::cache::{CorrelationCache, ItemKind, PeerItem, PeerScore};
use crate::config::Config;
use crate::display::{DisplayLine, DisplaySender, MessageType};
use crate::edits::{EditRef, EditStore};
use crate::error::{EngineError, EngineResult};
use crate::session::{Session, SessionAction, SessionState};
use crate::sites::SiteRegistry;
use crate::transport::{Transport, TransportEvent};
use crate::trust::BotFilter;

/// Instructions the engine hands back to its driver loop. Everything else
/// (sends, joins, display lines) the engine performs directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Arm a one-shot timer; call [`Engine::rejoin_timer_fired`] on expiry.
    ArmRejoin(Duration),
}

/// The coordination protocol engine. One per process; owns the registry,
/// filter, cache, and session, and must only be driven from one task.
pub struct Engine {
    prefix: String,
    /// Identity our own announcements are attributed to on the wire.
    me: Identity,
    sites: SiteRegistry,
    /// Script roots for building diff links in display lines.
    diff_urls: HashMap<String, String>,
    trust: BotFilter,
    cache: CorrelationCache,
    session: Session,
    store: Arc<dyn EditStore>,
    transport: Arc<dyn Transport>,
    display: DisplaySender,
}

impl Engine {
    /// Build an engine from configuration and its collaborators.
    pub fn new(
        config: &Config,
        store: Arc<dyn EditStore>,
        transport: Arc<dyn Transport>,
        display: DisplaySender,
    ) -> Self {
        let mut sites = SiteRegistry::new();
        let mut diff_urls = HashMap::new();
        for site in &config.sites {
            sites.register(site.name.clone(), site.channel.clone());
            if let Some(url) = &site.url {
                diff_urls.insert(site.name.clone(), url.clone());
            }
        }
        Self {
            prefix: config.protocol.prefix.clone(),
            me: Identity::new(
                config.network.nick.clone(),
                config.network.ident.clone(),
                config.network.host.clone(),
            ),
            sites,
            diff_urls,
            trust: BotFilter::new(
                config.trust.bot_nicks.clone(),
                config.trust.bot_hosts.clone(),
            ),
            cache: CorrelationCache::with_capacity(config.protocol.queue_cap),
            session: Session::new(
                config.primary_channel(),
                Duration::from_secs(config.protocol.rejoin_delay_secs),
            ),
            store,
            transport,
            display,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Deferred judgements currently waiting for their edits.
    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    /// Whether a revision is locally parsed. Backed by the edit store; the
    /// cache consults this to choose immediate apply versus deferral.
    pub fn is_parsed(&self, rev: RevId) -> bool {
        self.store.is_parsed(rev)
    }

    /// Request a transport connection.
    pub fn connect(&mut self) -> EngineResult {
        self.session.begin_connect();
        self.transport.connect()?;
        Ok(())
    }

    /// Tear the session down. Queued judgements stay; they key on revision
    /// ids and remain valid after a reconnect.
    pub fn disconnect(&mut self) -> EngineResult {
        self.transport.disconnect()?;
        self.session.on_disconnected();
        Ok(())
    }

    /// Tell peers an edit was reviewed and judged constructive.
    pub fn announce_good(&self, edit: &EditRef) -> EngineResult {
        self.announce(&edit.site, Notice::Good { rev: edit.rev, from: self.me.clone() })
    }

    /// Tell peers an edit was reverted.
    pub fn announce_rollback(&self, edit: &EditRef) -> EngineResult {
        self.announce(&edit.site, Notice::Rollback { rev: edit.rev, from: self.me.clone() })
    }

    /// Tell peers an edit looks suspicious.
    pub fn announce_suspicious(&self, edit: &EditRef) -> EngineResult {
        self.announce(&edit.site, Notice::Suspicious { rev: edit.rev, from: self.me.clone() })
    }

    /// Share our score contribution for an edit.
    pub fn announce_rescore(&self, edit: &EditRef, score: i64) -> EngineResult {
        self.announce(
            &edit.site,
            Notice::Rescore { rev: edit.rev, score, from: self.me.clone() },
        )
    }

    /// Tell peers a wiki user on `site` received a warning.
    pub fn announce_warning(&self, site: &str, user: &str, level: u8) -> EngineResult {
        self.announce(site, Notice::Warning { user: user.to_string(), level })
    }

    /// Send ordinary chat to a site's channel, same joined gating as
    /// announcements.
    pub fn send_chat(&self, site: &str, text: &str) -> EngineResult {
        let channel = self.channel_for(site)?;
        if !self.session.is_joined(channel) {
            debug!(site, "chat dropped, channel not joined");
            return Ok(());
        }
        self.transport.send(channel, text)?;
        Ok(())
    }

    /// A revision just became locally parsed: drain its deferred
    /// judgements in arrival order.
    pub fn edit_resolved(&mut self, rev: RevId) {
        let applied = self.cache.drain_for(rev, &*self.store);
        if applied > 0 {
            debug!(rev, applied, "drained deferred judgements");
        }
    }

    /// The rejoin timer armed via [`Directive::ArmRejoin`] fired.
    pub fn rejoin_timer_fired(&mut self) {
        let channels: Vec<String> = self.sites.channels().map(str::to_string).collect();
        let actions = self
            .session
            .rejoin_due(channels.iter().map(String::as_str));
        if !actions.is_empty() {
            info!("primary channel still unconfirmed, re-requesting joins");
        }
        self.perform(actions);
    }

    /// Process one transport callback. Returns directives for the driver.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<Directive> {
        match event {
            TransportEvent::Connected => {
                self.session.on_connected();
                self.show(MessageType::Info, "connected, waiting for login");
                Vec::new()
            }
            TransportEvent::ConnectFailed { reason } => {
                warn!(%reason, "connect failed");
                self.session.on_connect_failed();
                self.show(MessageType::Info, format!("connect failed: {reason}"));
                Vec::new()
            }
            TransportEvent::LoggedIn => {
                let channels: Vec<String> =
                    self.sites.channels().map(str::to_string).collect();
                let actions = self
                    .session
                    .on_logged_in(channels.iter().map(String::as_str));
                self.show(
                    MessageType::Info,
                    format!("logged in, joining {} channels", channels.len()),
                );
                self.perform(actions)
            }
            TransportEvent::SelfJoined { channel } => {
                self.session.on_self_joined(&channel);
                self.show(MessageType::Info, format!("joined {channel}"));
                Vec::new()
            }
            TransportEvent::SelfParted { channel } => {
                self.session.on_self_parted(&channel);
                self.show(MessageType::Info, format!("left {channel}"));
                Vec::new()
            }
            TransportEvent::UserJoined { channel, nick } => {
                self.show(MessageType::Info, format!("{nick} joined {channel}"));
                Vec::new()
            }
            TransportEvent::UserParted { channel, nick } => {
                self.show(MessageType::Info, format!("{nick} left {channel}"));
                Vec::new()
            }
            TransportEvent::ChannelMessage { channel, nick, ident, host, text } => {
                self.on_channel_message(&channel, &nick, &ident, &host, &text);
                Vec::new()
            }
            TransportEvent::NetworkFailure { reason, code } => {
                warn!(%reason, code, "network failure");
                self.session.on_disconnected();
                self.show(MessageType::Info, format!("network failure: {reason}"));
                Vec::new()
            }
            TransportEvent::Disconnected => {
                self.session.on_disconnected();
                self.show(MessageType::Info, "disconnected");
                Vec::new()
            }
        }
    }

    fn on_channel_message(&mut self, channel: &str, nick: &str, _ident: &str, host: &str, text: &str) {
        let Some(site) = self.sites.site_for_channel(channel) else {
            debug!(channel, "message on unregistered channel dropped");
            return;
        };
        let site = site.to_string();
        let from_bot = self.trust.is_bot(nick, host);
        let sender_kind = if from_bot { MessageType::Bot } else { MessageType::User };

        let notice = match decode(&self.prefix, text) {
            Ok(Payload::Chat(chat)) => {
                self.show(sender_kind, format!("{site} <{nick}> {chat}"));
                return;
            }
            Err(e) => {
                debug!(channel, nick, error = %e, "malformed command line dropped");
                return;
            }
            Ok(Payload::Notice(notice)) => notice,
        };

        match notice {
            Notice::Good { rev, from } => {
                let diff = self.diff_suffix(&site, rev);
                self.show(sender_kind, format!("{site}: {} marked {rev} as good{diff}", from.nick));
                self.offer(ItemKind::Good, site, rev, from);
            }
            Notice::Suspicious { rev, from } => {
                let diff = self.diff_suffix(&site, rev);
                self.show(
                    sender_kind,
                    format!("{site}: {} flagged {rev} as suspicious{diff}", from.nick),
                );
                self.offer(ItemKind::Suspicious, site, rev, from);
            }
            Notice::Rescore { rev, score, from } => {
                self.show(sender_kind, format!("{site}: {} rescored {rev} by {score}", from.nick));
                self.cache.offer_score(
                    PeerScore { item: PeerItem { site, rev, from }, score },
                    &*self.store,
                );
            }
            // Acting on a rollback or a warning needs an elevated-trust
            // sender; from ordinary peers these are display-only.
            Notice::Rollback { rev, from } => {
                let diff = self.diff_suffix(&site, rev);
                self.show(sender_kind, format!("{site}: {} rolled back {rev}{diff}", from.nick));
                if from_bot {
                    self.offer(ItemKind::Rollback, site, rev, from);
                } else {
                    debug!(nick, rev, "rollback from untrusted sender not applied");
                }
            }
            Notice::Warning { user, level } => {
                self.show(
                    MessageType::UserTalk,
                    format!("{site}: {user} was warned (level {level})"),
                );
                if from_bot {
                    self.store.record_warning(&user, level);
                } else {
                    debug!(nick, %user, "warning from untrusted sender not applied");
                }
            }
        }
    }

    fn offer(&mut self, kind: ItemKind, site: String, rev: RevId, from: Identity) {
        let applied = self
            .cache
            .offer(kind, PeerItem { site, rev, from }, &*self.store);
        if !applied {
            debug!(rev, "judgement deferred until edit is parsed");
        }
    }

    fn announce(&self, site: &str, notice: Notice) -> EngineResult {
        let channel = self.channel_for(site)?;
        if !self.session.is_joined(channel) {
            debug!(site, verb = notice.verb(), "announcement dropped, channel not joined");
            return Ok(());
        }
        self.transport.send(channel, &encode(&self.prefix, &notice))?;
        Ok(())
    }

    fn channel_for(&self, site: &str) -> Result<&str, EngineError> {
        self.sites
            .channel_for_site(site)
            .ok_or_else(|| EngineError::UnknownSite(site.to_string()))
    }

    fn perform(&self, actions: Vec<SessionAction>) -> Vec<Directive> {
        let mut directives = Vec::new();
        for action in actions {
            match action {
                SessionAction::Join(channel) => {
                    if let Err(e) = self.transport.join(&channel) {
                        warn!(%channel, error = %e, "join request failed");
                    }
                }
                SessionAction::ArmRejoin(delay) => directives.push(Directive::ArmRejoin(delay)),
            }
        }
        directives
    }

    fn diff_suffix(&self, site: &str, rev: RevId) -> String {
        self.diff_urls
            .get(site)
            .map(|url| format!(" ({})", crate::display::diff_href(url, rev)))
            .unwrap_or_default()
    }

    fn show(&self, kind: MessageType, text: impl Into<String>) {
        // Receiver gone just means nothing is rendering the log.
        let _ = self.display.send(DisplayLine::new(kind, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display;
    use crate::edits::{EditStatus, MemoryEditStore};
    use crate::transport::TransportError;
    use parking_lot::Mutex;

    /// Transport fake recording every enqueued operation.
    #[derive(Default)]
    struct FakeTransport {
        ops: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().clone()
        }
        fn record(&self, op: String) -> Result<(), TransportError> {
            self.ops.lock().push(op);
            Ok(())
        }
    }

    impl Transport for FakeTransport {
        fn connect(&self) -> Result<(), TransportError> {
            self.record("connect".into())
        }
        fn disconnect(&self) -> Result<(), TransportError> {
            self.record("disconnect".into())
        }
        fn join(&self, channel: &str) -> Result<(), TransportError> {
            self.record(format!("join {channel}"))
        }
        fn part(&self, channel: &str) -> Result<(), TransportError> {
            self.record(format!("part {channel}"))
        }
        fn send(&self, channel: &str, line: &str) -> Result<(), TransportError> {
            self.record(format!("send {channel} {line}"))
        }
    }

    struct Fixture {
        engine: Engine,
        transport: Arc<FakeTransport>,
        store: Arc<MemoryEditStore>,
        display: display::DisplayReceiver,
    }

    fn fixture() -> Fixture {
        let config: Config = toml::from_str(
            r##"
            [network]
            server = "chat.example.net:6667"
            nick = "huntress"

            [[sites]]
            name = "enwiki"
            channel = "#vn-enwiki"
            url = "https://en.wikipedia.org/w/"

            [[sites]]
            name = "dewiki"
            channel = "#vn-dewiki"

            [trust]
            bot_hosts = ["*.wmflabs.org"]
            "##,
        )
        .unwrap();
        let transport = Arc::new(FakeTransport::default());
        let store = MemoryEditStore::new();
        let (tx, rx) = display::channel();
        let engine = Engine::new(&config, store.clone(), transport.clone(), tx);
        Fixture { engine, transport, store, display: rx }
    }

    fn bring_up(f: &mut Fixture) {
        f.engine.connect().unwrap();
        f.engine.handle(TransportEvent::Connected);
        f.engine.handle(TransportEvent::LoggedIn);
        f.engine
            .handle(TransportEvent::SelfJoined { channel: "#vn-enwiki".into() });
        f.engine
            .handle(TransportEvent::SelfJoined { channel: "#vn-dewiki".into() });
    }

    fn peer_message(text: &str) -> TransportEvent {
        TransportEvent::ChannelMessage {
            channel: "#vn-enwiki".into(),
            nick: "Alice".into(),
            ident: "alice".into(),
            host: "host.example".into(),
            text: text.into(),
        }
    }

    fn bot_message(text: &str) -> TransportEvent {
        TransportEvent::ChannelMessage {
            channel: "#vn-enwiki".into(),
            nick: "CVNBot1".into(),
            ident: "bot".into(),
            host: "tools.wmflabs.org".into(),
            text: text.into(),
        }
    }

    #[test]
    fn test_announce_dropped_until_joined() {
        let mut f = fixture();
        let edit = EditRef::new("enwiki", 42);
        f.engine.announce_good(&edit).unwrap();
        assert_eq!(f.transport.ops(), Vec::<String>::new());

        bring_up(&mut f);
        f.engine.announce_good(&edit).unwrap();
        let ops = f.transport.ops();
        assert_eq!(
            ops.last().unwrap(),
            "send #vn-enwiki !good 42 huntress vandalnet client.vandalnet"
        );
    }

    #[test]
    fn test_announce_unknown_site_errors() {
        let f = fixture();
        let err = f
            .engine
            .announce_rollback(&EditRef::new("frwiki", 1))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownSite(s) if s == "frwiki"));
    }

    #[test]
    fn test_login_joins_all_channels_and_arms_rejoin() {
        let mut f = fixture();
        f.engine.connect().unwrap();
        f.engine.handle(TransportEvent::Connected);
        let directives = f.engine.handle(TransportEvent::LoggedIn);
        assert_eq!(directives, vec![Directive::ArmRejoin(Duration::from_secs(20))]);
        let ops = f.transport.ops();
        assert!(ops.contains(&"join #vn-enwiki".to_string()));
        assert!(ops.contains(&"join #vn-dewiki".to_string()));
    }

    #[test]
    fn test_rejoin_timer_rerequests_once() {
        let mut f = fixture();
        f.engine.connect().unwrap();
        f.engine.handle(TransportEvent::Connected);
        f.engine.handle(TransportEvent::LoggedIn);

        let before = f.transport.ops().len();
        f.engine.rejoin_timer_fired();
        let after_first = f.transport.ops().len();
        assert_eq!(after_first - before, 2);

        f.engine.rejoin_timer_fired();
        assert_eq!(f.transport.ops().len(), after_first);
    }

    #[test]
    fn test_inbound_good_defers_then_drains() {
        let mut f = fixture();
        bring_up(&mut f);
        f.engine
            .handle(peer_message("!good 12345 Alice alice host.example"));
        assert_eq!(f.engine.pending(), 1);
        assert_eq!(f.store.status(12345), None);

        f.store.insert(12345);
        f.engine.edit_resolved(12345);
        assert_eq!(f.engine.pending(), 0);
        assert_eq!(f.store.status(12345), Some(EditStatus::Good));
        assert_eq!(f.store.reviewed_by(12345), Some("Alice".into()));
    }

    #[test]
    fn test_inbound_good_applies_immediately_when_parsed() {
        let mut f = fixture();
        bring_up(&mut f);
        f.store.insert(7);
        f.engine.handle(peer_message("!good 7 Alice alice host.example"));
        assert_eq!(f.engine.pending(), 0);
        assert_eq!(f.store.status(7), Some(EditStatus::Good));
    }

    #[test]
    fn test_rollback_gated_on_trust() {
        let mut f = fixture();
        bring_up(&mut f);
        f.store.insert(9);

        f.engine
            .handle(peer_message("!rollback 9 Alice alice host.example"));
        assert_eq!(f.store.status(9), Some(EditStatus::None));

        f.engine.handle(bot_message("!rollback 9 Mallory m h.example"));
        assert_eq!(f.store.status(9), Some(EditStatus::Reverted));
    }

    #[test]
    fn test_warning_gated_on_trust_and_applied_immediately() {
        let mut f = fixture();
        bring_up(&mut f);

        f.engine.handle(peer_message("!warning Vandal 3"));
        assert!(f.store.warnings().is_empty());

        f.engine.handle(bot_message("!warning Vandal 3"));
        assert_eq!(f.store.warnings(), vec![("Vandal".into(), 3)]);
        assert_eq!(f.engine.pending(), 0);
    }

    #[test]
    fn test_rescore_accumulates_after_resolve() {
        let mut f = fixture();
        bring_up(&mut f);
        f.engine
            .handle(peer_message("!rescore 5 -120 Alice alice host.example"));
        assert_eq!(f.engine.pending(), 1);

        f.store.insert(5);
        f.engine.edit_resolved(5);
        assert_eq!(f.store.score(5), Some(-120));
    }

    #[test]
    fn test_malformed_line_mutates_nothing() {
        let mut f = fixture();
        bring_up(&mut f);
        f.engine.handle(peer_message("!rescore abc"));
        f.engine.handle(peer_message("!good notanumber A a h"));
        assert_eq!(f.engine.pending(), 0);
    }

    #[test]
    fn test_plain_chat_reaches_display_classified() {
        let mut f = fixture();
        bring_up(&mut f);
        while f.display.try_recv().is_ok() {}

        f.engine.handle(peer_message("hello all"));
        let line = f.display.try_recv().unwrap();
        assert_eq!(line.kind, MessageType::User);
        assert!(line.text.contains("hello all"));
        assert!(line.text.contains("enwiki"));

        f.engine.handle(bot_message("status ok"));
        let line = f.display.try_recv().unwrap();
        assert_eq!(line.kind, MessageType::Bot);
    }

    #[test]
    fn test_notice_display_carries_diff_link() {
        let mut f = fixture();
        bring_up(&mut f);
        while f.display.try_recv().is_ok() {}

        f.engine.handle(peer_message("!good 12345 Alice alice host.example"));
        let line = f.display.try_recv().unwrap();
        assert!(line
            .text
            .contains("https://en.wikipedia.org/w/index.php?diff=12345"));
    }

    #[test]
    fn test_unregistered_channel_dropped() {
        let mut f = fixture();
        bring_up(&mut f);
        f.store.insert(3);
        f.engine.handle(TransportEvent::ChannelMessage {
            channel: "#unrelated".into(),
            nick: "Alice".into(),
            ident: "alice".into(),
            host: "host.example".into(),
            text: "!good 3 Alice alice host.example".into(),
        });
        assert_eq!(f.store.status(3), Some(EditStatus::None));
    }

    #[test]
    fn test_disconnect_keeps_cache() {
        let mut f = fixture();
        bring_up(&mut f);
        f.engine
            .handle(peer_message("!good 12345 Alice alice host.example"));
        assert_eq!(f.engine.pending(), 1);

        f.engine.handle(TransportEvent::Disconnected);
        assert_eq!(f.engine.state(), SessionState::Disconnected);
        assert_eq!(f.engine.pending(), 1);

        // Announcements are dropped again until the next join.
        f.engine.announce_good(&EditRef::new("enwiki", 50)).unwrap();
        assert!(!f.transport.ops().iter().any(|op| op.contains("!good 50")));
    }

    #[test]
    fn test_send_chat_uses_plain_text() {
        let mut f = fixture();
        bring_up(&mut f);
        f.engine.send_chat("dewiki", "guten Tag").unwrap();
        assert_eq!(
            f.transport.ops().last().unwrap(),
            "send #vn-dewiki guten Tag"
        );
    }
}
