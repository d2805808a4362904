//! Stock IRC transport adapter.
//!
//! A single tokio task owns the socket: it connects on demand, performs
//! NICK/USER registration, answers PING, and translates the few message
//! shapes the engine cares about into [`TransportEvent`]s. The rest of the
//! IRC surface is ignored here on purpose; protocol semantics live in the
//! engine, not the transport.

use std::ops::ControlFlow;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use super::{EventSender, Transport, TransportError, TransportEvent};

/// Longest line we accept from the server before treating the stream as
/// hostile.
const MAX_LINE_LEN: usize = 512;

/// Connection settings for the IRC adapter.
#[derive(Debug, Clone)]
pub struct IrcConfig {
    /// `host:port` of the server.
    pub server: String,
    pub nick: String,
    pub ident: String,
    pub realname: String,
}

enum Outbound {
    Connect,
    Disconnect,
    Join(String),
    Part(String),
    Send { channel: String, line: String },
}

/// Handle implementing [`Transport`] by enqueueing onto the I/O task.
#[derive(Clone)]
pub struct IrcTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl IrcTransport {
    /// Spawn the I/O task and return the engine-facing handle.
    pub fn spawn(config: IrcConfig, events: EventSender) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(config, rx, events));
        Self { tx }
    }

    fn enqueue(&self, cmd: Outbound) -> Result<(), TransportError> {
        self.tx.send(cmd).map_err(|_| TransportError::Closed)
    }
}

impl Transport for IrcTransport {
    fn connect(&self) -> Result<(), TransportError> {
        self.enqueue(Outbound::Connect)
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.enqueue(Outbound::Disconnect)
    }

    fn join(&self, channel: &str) -> Result<(), TransportError> {
        self.enqueue(Outbound::Join(channel.to_string()))
    }

    fn part(&self, channel: &str) -> Result<(), TransportError> {
        self.enqueue(Outbound::Part(channel.to_string()))
    }

    fn send(&self, channel: &str, line: &str) -> Result<(), TransportError> {
        self.enqueue(Outbound::Send {
            channel: channel.to_string(),
            line: line.to_string(),
        })
    }
}

async fn run(
    config: IrcConfig,
    mut cmds: mpsc::UnboundedReceiver<Outbound>,
    events: EventSender,
) {
    loop {
        // Idle until a connect is requested; other commands are stale.
        let cmd = match cmds.recv().await {
            Some(cmd) => cmd,
            None => return,
        };
        if !matches!(cmd, Outbound::Connect) {
            continue;
        }

        let stream = match TcpStream::connect(&config.server).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(server = %config.server, error = %e, "connect failed");
                let _ = events.send(TransportEvent::ConnectFailed { reason: e.to_string() });
                continue;
            }
        };
        info!(server = %config.server, "connected");
        let _ = events.send(TransportEvent::Connected);

        let flow = session(stream, &config, &mut cmds, &events).await;
        let _ = events.send(TransportEvent::Disconnected);
        if flow.is_break() {
            return;
        }
    }
}

/// Drive one established connection until it ends. Break means the command
/// channel is gone and the task should exit for good.
async fn session(
    stream: TcpStream,
    config: &IrcConfig,
    cmds: &mut mpsc::UnboundedReceiver<Outbound>,
    events: &EventSender,
) -> ControlFlow<()> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    if framed.send(format!("NICK {}", config.nick)).await.is_err()
        || framed
            .send(format!("USER {} 0 * :{}", config.ident, config.realname))
            .await
            .is_err()
    {
        let _ = events.send(TransportEvent::NetworkFailure {
            reason: "registration write failed".into(),
            code: 0,
        });
        return ControlFlow::Continue(());
    }

    loop {
        tokio::select! {
            cmd = cmds.recv() => match cmd {
                None => return ControlFlow::Break(()),
                Some(Outbound::Connect) => {}
                Some(Outbound::Disconnect) => {
                    let _ = framed.send("QUIT :leaving".to_string()).await;
                    return ControlFlow::Continue(());
                }
                Some(Outbound::Join(channel)) => {
                    if framed.send(format!("JOIN {channel}")).await.is_err() {
                        return write_failed(events);
                    }
                }
                Some(Outbound::Part(channel)) => {
                    if framed.send(format!("PART {channel}")).await.is_err() {
                        return write_failed(events);
                    }
                }
                Some(Outbound::Send { channel, line }) => {
                    if framed.send(format!("PRIVMSG {channel} :{line}")).await.is_err() {
                        return write_failed(events);
                    }
                }
            },
            line = framed.next() => match line {
                None => {
                    let _ = events.send(TransportEvent::NetworkFailure {
                        reason: "connection closed by server".into(),
                        code: 0,
                    });
                    return ControlFlow::Continue(());
                }
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::NetworkFailure {
                        reason: e.to_string(),
                        code: 0,
                    });
                    return ControlFlow::Continue(());
                }
                Some(Ok(line)) => match interpret(&line, &config.nick) {
                    Inbound::Pong(token) => {
                        if framed.send(format!("PONG :{token}")).await.is_err() {
                            return write_failed(events);
                        }
                    }
                    Inbound::Event(event) => {
                        let _ = events.send(event);
                    }
                    Inbound::Nothing => debug!(line = %line, "ignored server line"),
                },
            },
        }
    }
}

fn write_failed(events: &EventSender) -> ControlFlow<()> {
    let _ = events.send(TransportEvent::NetworkFailure {
        reason: "write failed".into(),
        code: 0,
    });
    ControlFlow::Continue(())
}

enum Inbound {
    Event(TransportEvent),
    Pong(String),
    Nothing,
}

/// Split `[:prefix] cmd args [:trailing]` into prefix and argument list
/// (command first, trailing folded in as the last argument).
fn split_line(line: &str) -> (Option<&str>, Vec<&str>) {
    let mut rest = line;
    let mut prefix = None;
    if let Some(after) = rest.strip_prefix(':') {
        match after.split_once(' ') {
            Some((p, tail)) => {
                prefix = Some(p);
                rest = tail;
            }
            None => return (Some(after), Vec::new()),
        }
    }
    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing)),
        None => (rest, None),
    };
    let mut args: Vec<&str> = head.split_whitespace().collect();
    if let Some(trailing) = trailing {
        args.push(trailing);
    }
    (prefix, args)
}

/// Split `nick!ident@host`; missing parts come back empty.
fn split_sender(prefix: &str) -> (&str, &str, &str) {
    match prefix.split_once('!') {
        Some((nick, rest)) => match rest.split_once('@') {
            Some((ident, host)) => (nick, ident, host),
            None => (nick, rest, ""),
        },
        None => (prefix, "", ""),
    }
}

fn interpret(line: &str, our_nick: &str) -> Inbound {
    let (prefix, args) = split_line(line);
    let Some(&cmd) = args.first() else {
        return Inbound::Nothing;
    };

    match cmd {
        "PING" => Inbound::Pong(args.get(1).unwrap_or(&"").to_string()),
        // RPL_WELCOME ends registration.
        "001" => Inbound::Event(TransportEvent::LoggedIn),
        "JOIN" | "PART" => {
            let Some((sender, channel)) = prefix.zip(args.get(1)) else {
                return Inbound::Nothing;
            };
            let (nick, _, _) = split_sender(sender);
            let channel = channel.to_string();
            let event = match (cmd, nick.eq_ignore_ascii_case(our_nick)) {
                ("JOIN", true) => TransportEvent::SelfJoined { channel },
                ("JOIN", false) => TransportEvent::UserJoined { channel, nick: nick.into() },
                (_, true) => TransportEvent::SelfParted { channel },
                (_, false) => TransportEvent::UserParted { channel, nick: nick.into() },
            };
            Inbound::Event(event)
        }
        "PRIVMSG" => {
            let (Some(sender), Some(channel), Some(text)) = (prefix, args.get(1), args.get(2))
            else {
                return Inbound::Nothing;
            };
            let (nick, ident, host) = split_sender(sender);
            Inbound::Event(TransportEvent::ChannelMessage {
                channel: channel.to_string(),
                nick: nick.to_string(),
                ident: ident.to_string(),
                host: host.to_string(),
                text: text.to_string(),
            })
        }
        "ERROR" => Inbound::Event(TransportEvent::NetworkFailure {
            reason: args.get(1).unwrap_or(&"").to_string(),
            code: 0,
        }),
        _ => Inbound::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_line_full() {
        let (prefix, args) = split_line(":nick!id@host PRIVMSG #chan :hello world");
        assert_eq!(prefix, Some("nick!id@host"));
        assert_eq!(args, ["PRIVMSG", "#chan", "hello world"]);
    }

    #[test]
    fn test_split_line_no_prefix_no_trailing() {
        let (prefix, args) = split_line("PING token");
        assert_eq!(prefix, None);
        assert_eq!(args, ["PING", "token"]);
    }

    #[test]
    fn test_split_sender() {
        assert_eq!(split_sender("Alice!alice@host.example"), ("Alice", "alice", "host.example"));
        assert_eq!(split_sender("services."), ("services.", "", ""));
    }

    #[test]
    fn test_interpret_welcome() {
        let inbound = interpret(":srv 001 me :Welcome", "me");
        assert!(matches!(inbound, Inbound::Event(TransportEvent::LoggedIn)));
    }

    #[test]
    fn test_interpret_ping() {
        match interpret("PING :12345", "me") {
            Inbound::Pong(token) => assert_eq!(token, "12345"),
            _ => panic!("expected pong"),
        }
    }

    #[test]
    fn test_interpret_self_vs_user_join() {
        let own = interpret(":ME!me@h JOIN :#vn-enwiki", "me");
        assert!(matches!(
            own,
            Inbound::Event(TransportEvent::SelfJoined { channel }) if channel == "#vn-enwiki"
        ));
        let other = interpret(":Alice!a@h JOIN :#vn-enwiki", "me");
        assert!(matches!(
            other,
            Inbound::Event(TransportEvent::UserJoined { nick, .. }) if nick == "Alice"
        ));
    }

    #[test]
    fn test_interpret_privmsg() {
        match interpret(":Alice!alice@host.example PRIVMSG #vn-enwiki :!good 1 A a h", "me") {
            Inbound::Event(TransportEvent::ChannelMessage { channel, nick, ident, host, text }) => {
                assert_eq!(channel, "#vn-enwiki");
                assert_eq!(nick, "Alice");
                assert_eq!(ident, "alice");
                assert_eq!(host, "host.example");
                assert_eq!(text, "!good 1 A a h");
            }
            _ => panic!("expected channel message"),
        }
    }

    #[test]
    fn test_interpret_ignores_noise() {
        assert!(matches!(interpret(":srv 372 me :motd line", "me"), Inbound::Nothing));
        assert!(matches!(interpret("", "me"), Inbound::Nothing));
        assert!(matches!(interpret(":lonely", "me"), Inbound::Nothing));
    }
}
