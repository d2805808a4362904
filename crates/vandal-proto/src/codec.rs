//! Line-level encoding and decoding of protocol commands.

use std::fmt;

use crate::error::DecodeError;
use crate::event::{Identity, Notice, RevId};

/// Result of decoding one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    /// The line matched the command grammar.
    Notice(Notice),
    /// Ordinary chat: no prefix, or a prefixed line with an unknown verb.
    Chat(&'a str),
}

/// Decode one line of channel traffic.
///
/// Total over all inputs: lines that do not start with `prefix`, and
/// prefixed lines whose verb is not part of the protocol, come back as
/// [`Payload::Chat`]. A recognized verb with malformed arguments is a
/// [`DecodeError`] and should be dropped by the caller.
///
/// # Examples
///
/// ```
/// use vandal_proto::{decode, Payload};
///
/// assert!(matches!(decode("!", "hello there"), Ok(Payload::Chat(_))));
/// assert!(matches!(
///     decode("!", "!good 12345 Alice alice host.example"),
///     Ok(Payload::Notice(_))
/// ));
/// assert!(decode("!", "!rescore abc").is_err());
/// ```
pub fn decode<'a>(prefix: &str, line: &'a str) -> Result<Payload<'a>, DecodeError> {
    let Some(rest) = line.strip_prefix(prefix) else {
        return Ok(Payload::Chat(line));
    };
    // An empty prefix would make every chat line a command candidate;
    // unknown verbs still fall through to chat below.
    let mut words = rest.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Payload::Chat(line));
    };
    let args: Vec<&str> = words.collect();

    let notice = match verb {
        "good" => attributed("good", &args, |rev, from| Notice::Good { rev, from })?,
        "rollback" => attributed("rollback", &args, |rev, from| Notice::Rollback { rev, from })?,
        "suspicious" => attributed("suspicious", &args, |rev, from| Notice::Suspicious { rev, from })?,
        "rescore" => {
            expect_args("rescore", &args, 5)?;
            Notice::Rescore {
                rev: parse_rev(args[0])?,
                score: args[1]
                    .parse::<i64>()
                    .map_err(|_| DecodeError::InvalidScore(args[1].to_string()))?,
                from: Identity::new(args[2], args[3], args[4]),
            }
        }
        "warning" => {
            expect_args("warning", &args, 2)?;
            Notice::Warning {
                user: args[0].to_string(),
                level: args[1]
                    .parse::<u8>()
                    .map_err(|_| DecodeError::InvalidLevel(args[1].to_string()))?,
            }
        }
        _ => return Ok(Payload::Chat(line)),
    };
    Ok(Payload::Notice(notice))
}

/// Serialize a notice into its wire line, including the prefix.
#[must_use]
pub fn encode(prefix: &str, notice: &Notice) -> String {
    format!("{prefix}{notice}")
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Good { rev, from } => write_attributed(f, "good", *rev, from),
            Notice::Rollback { rev, from } => write_attributed(f, "rollback", *rev, from),
            Notice::Suspicious { rev, from } => write_attributed(f, "suspicious", *rev, from),
            Notice::Rescore { rev, score, from } => write!(
                f,
                "rescore {rev} {score} {} {} {}",
                from.nick, from.ident, from.host
            ),
            Notice::Warning { user, level } => write!(f, "warning {user} {level}"),
        }
    }
}

fn write_attributed(
    f: &mut fmt::Formatter<'_>,
    verb: &str,
    rev: RevId,
    from: &Identity,
) -> fmt::Result {
    write!(f, "{verb} {rev} {} {} {}", from.nick, from.ident, from.host)
}

/// Shared decoder for the three verbs carrying `<rev> <nick> <ident> <host>`.
fn attributed(
    verb: &'static str,
    args: &[&str],
    build: impl FnOnce(RevId, Identity) -> Notice,
) -> Result<Notice, DecodeError> {
    expect_args(verb, args, 4)?;
    let rev = parse_rev(args[0])?;
    Ok(build(rev, Identity::new(args[1], args[2], args[3])))
}

fn expect_args(verb: &'static str, args: &[&str], expected: usize) -> Result<(), DecodeError> {
    if args.len() != expected {
        return Err(DecodeError::ArgumentCount {
            verb,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn parse_rev(token: &str) -> Result<RevId, DecodeError> {
    token
        .parse::<RevId>()
        .map_err(|_| DecodeError::InvalidRevision(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("Alice", "alice", "host.example")
    }

    #[test]
    fn test_plain_chat_passes_through() {
        assert_eq!(
            decode("!", "hello there").unwrap(),
            Payload::Chat("hello there")
        );
        assert_eq!(decode("!", "").unwrap(), Payload::Chat(""));
    }

    #[test]
    fn test_unknown_verb_is_chat() {
        assert_eq!(
            decode("!", "!version 3.4").unwrap(),
            Payload::Chat("!version 3.4")
        );
        // Bare prefix is chat too.
        assert_eq!(decode("!", "!").unwrap(), Payload::Chat("!"));
    }

    #[test]
    fn test_decode_good() {
        let got = decode("!", "!good 12345 Alice alice host.example").unwrap();
        assert_eq!(
            got,
            Payload::Notice(Notice::Good { rev: 12345, from: alice() })
        );
    }

    #[test]
    fn test_decode_rescore() {
        let got = decode("!", "!rescore 42 -150 Alice alice host.example").unwrap();
        assert_eq!(
            got,
            Payload::Notice(Notice::Rescore {
                rev: 42,
                score: -150,
                from: alice()
            })
        );
    }

    #[test]
    fn test_decode_warning() {
        let got = decode("!", "!warning BadUser 3").unwrap();
        assert_eq!(
            got,
            Payload::Notice(Notice::Warning { user: "BadUser".into(), level: 3 })
        );
    }

    #[test]
    fn test_non_numeric_revision_rejected() {
        assert_eq!(
            decode("!", "!rescore abc"),
            Err(DecodeError::ArgumentCount { verb: "rescore", expected: 5, got: 1 })
        );
        assert_eq!(
            decode("!", "!good abc Alice alice host.example"),
            Err(DecodeError::InvalidRevision("abc".into()))
        );
    }

    #[test]
    fn test_out_of_range_level_rejected() {
        // 300 does not fit a warning level; rejected, never truncated.
        assert_eq!(
            decode("!", "!warning BadUser 300"),
            Err(DecodeError::InvalidLevel("300".into()))
        );
        assert_eq!(
            decode("!", "!warning BadUser -1"),
            Err(DecodeError::InvalidLevel("-1".into()))
        );
    }

    #[test]
    fn test_wrong_arg_counts_rejected() {
        assert!(decode("!", "!good 12345").is_err());
        assert!(decode("!", "!good 12345 Alice alice host.example extra").is_err());
        assert!(decode("!", "!warning OnlyUser").is_err());
    }

    #[test]
    fn test_alternate_prefix() {
        let got = decode("+%", "+%good 7 A a h").unwrap();
        assert!(matches!(got, Payload::Notice(Notice::Good { rev: 7, .. })));
        // The old prefix is just chat on a network using another one.
        assert_eq!(
            decode("+%", "!good 7 A a h").unwrap(),
            Payload::Chat("!good 7 A a h")
        );
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let notices = [
            Notice::Good { rev: 1, from: alice() },
            Notice::Rollback { rev: u64::MAX, from: alice() },
            Notice::Suspicious { rev: 500, from: alice() },
            Notice::Rescore { rev: 9, score: -9999, from: alice() },
            Notice::Warning { user: "Someone".into(), level: 4 },
        ];
        for notice in notices {
            let line = encode("!", &notice);
            match decode("!", &line).unwrap() {
                Payload::Notice(back) => assert_eq!(back, notice, "line {line:?}"),
                Payload::Chat(c) => panic!("round-trip fell to chat: {c:?}"),
            }
        }
    }

    #[test]
    fn test_decode_never_panics_on_junk() {
        for junk in [
            "!good",
            "!good \u{0} \u{7} x y",
            "!rescore 1 2 3 4 5 6 7",
            "!warning  ",
            ":server 001 nick :welcome",
            "!good 18446744073709551616 A a h", // u64::MAX + 1
        ] {
            let _ = decode("!", junk);
        }
    }
}
