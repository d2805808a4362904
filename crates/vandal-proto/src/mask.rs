//! Wildcard mask matching for sender classification.
//!
//! Trusted-bot patterns are ordinary IRC-style masks: `*` matches any run of
//! characters (including none), `?` matches exactly one. Matching is ASCII
//! case-insensitive, since nicknames and hostnames are case-folded by the
//! transport.

/// Match `text` against a wildcard `pattern`.
///
/// # Examples
///
/// ```
/// use vandal_proto::mask::matches;
///
/// assert!(matches("*.wmflabs.org", "cvn-bot.WMFLABS.ORG"));
/// assert!(matches("CVNBot?", "cvnbot7"));
/// assert!(!matches("CVNBot?", "cvnbot"));
/// assert!(matches("*", ""));
/// ```
#[must_use]
pub fn matches(pattern: &str, text: &str) -> bool {
    let pat = pattern.as_bytes();
    let txt = text.as_bytes();

    let mut p = 0;
    let mut t = 0;
    // Backtrack point: position after the most recent '*', and the text
    // offset that star has consumed up to.
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == b'?' || eq_fold(pat[p], txt[t])) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some((p + 1, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            star = Some((sp, st + 1));
            p = sp;
            t = st + 1;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}

#[inline]
fn eq_fold(a: u8, b: u8) -> bool {
    a.eq_ignore_ascii_case(&b)
}
