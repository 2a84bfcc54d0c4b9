use std::net::Ipv6Addr;
use std::ops::Range;
use std::sync::OnceLock;

use regex_automata::meta::Regex;
use regex_automata::MatchKind;
use regex_syntax::hir::Hir;

use crate::error::Result;

/// One IPv4 octet, 0-255. Leading zeros are accepted textually.
///
/// - 25[0-5]               matches 250-255
/// - (2[0-4]|1?[0-9])?[0-9] matches 0-249
const IPV4_SEG: &str = r"(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])";

/// One IPv6 group of one to four hex digits.
const IPV6_SEG: &str = r"(?:[0-9a-fA-F]{1,4})";

const IPV4_PATTERN_ID: usize = 0;

static SHARED: OnceLock<Matcher> = OnceLock::new();

fn ipv4_pattern() -> String {
    format!(r"(?:{IPV4_SEG}\.){{3}}{IPV4_SEG}")
}

/// The IPv6 grammar, ordered so that the longest alternatives come first.
///
/// Leftmost-first semantics pick the first alternative that matches, so a
/// full 8-group address would otherwise be reported as a shorter compressed
/// prefix. Covers:
/// - IPv4-embedded: 64:ff9b::192.0.2.33, 64:ff9b::1:192.0.2.33,
///   64:ff9b:0:0:0:0:192.0.2.33
/// - IPv4-mapped: ::ffff:192.0.2.1, ::192.0.2.1
/// - link-local with zone index: fe80::1%eth0
/// - every `::` compression position, and the full 8-group form
fn ipv6_pattern() -> String {
    let v4 = ipv4_pattern();
    let s = IPV6_SEG;
    // The dotted quad stands in for two groups, so at most six come before
    // it and `::` has to cover at least one.
    let mut alternatives = vec![format!(r"(?:{s}:){{6}}{v4}")];
    alternatives.extend((1..=5).rev().map(|head| {
        let tail = 5 - head;
        format!(r"(?:{s}:){{{head}}}:(?:{s}:){{0,{tail}}}{v4}")
    }));
    alternatives.extend([
        format!(r"::(?:{s}:){{0,5}}{v4}"),
        format!(r"[fF][eE]80:(?::{s}){{0,4}}%[0-9a-zA-Z]+"),
        format!(r":(?:(?::{s}){{1,7}}|:)"),
        format!(r"{s}:(?::{s}){{1,6}}"),
        format!(r"(?:{s}:){{1,2}}(?::{s}){{1,5}}"),
        format!(r"(?:{s}:){{1,3}}(?::{s}){{1,4}}"),
        format!(r"(?:{s}:){{1,4}}(?::{s}){{1,3}}"),
        format!(r"(?:{s}:){{1,5}}(?::{s}){{1,2}}"),
        format!(r"(?:{s}:){{1,6}}:{s}"),
        format!(r"(?:{s}:){{1,7}}:"),
        format!(r"(?:{s}:){{7}}{s}"),
    ]);
    alternatives
        .iter()
        .map(|alt| format!("(?:{alt})"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Remove an IPv6 zone index (`%eth0`) from an address.
///
/// The zone index names a local interface and is not part of the routable
/// address, so everything from the first `%` onward is dropped.
///
/// ```
/// use ip_extract::strip_zone_index;
///
/// assert_eq!(strip_zone_index("fe80::1%eth0"), "fe80::1");
/// assert_eq!(strip_zone_index("8.8.8.8"), "8.8.8.8");
/// ```
#[inline]
pub fn strip_zone_index(address: &str) -> &str {
    match address.find('%') {
        Some(idx) => &address[..idx],
        None => address,
    }
}

/// Recognizes IPv4 dotted-quad and IPv6 colon-hex literals in free text.
///
/// A `Matcher` holds nothing but its compiled patterns, so it can be shared
/// freely and reused over independent inputs. Matches are reported verbatim:
/// case, leading zeros and zone indexes are left as they appear.
#[derive(Clone, Debug)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Compile the IPv4 and IPv6 patterns.
    pub fn new() -> Result<Matcher> {
        let v4: Hir = regex_syntax::Parser::new()
            .parse(&ipv4_pattern())
            .map_err(Box::new)?;
        let v6: Hir = regex_syntax::Parser::new()
            .parse(&ipv6_pattern())
            .map_err(Box::new)?;

        let regex = Regex::builder()
            .configure(
                Regex::config()
                    .auto_prefilter(true)
                    .match_kind(MatchKind::LeftmostFirst),
            )
            .build_many_from_hir(&[v4, v6])?;

        Ok(Matcher { regex })
    }

    /// A process-wide matcher, compiled on first use.
    pub fn shared() -> &'static Matcher {
        SHARED.get_or_init(|| Matcher::new().expect("built-in address patterns compile"))
    }

    /// Find every address in a byte slice.
    ///
    /// Returns byte ranges `[start, end)` into `haystack`, in text order.
    /// Candidates fused to surrounding digits or hex characters are
    /// skipped, as are IPv6 candidates that do not parse once the zone index
    /// is removed. An IPv4 literal embedded in an IPv6 literal is reported
    /// only as part of the IPv6 match. A bare `::` standing alone between
    /// whitespace is read as punctuation (`key :: value`), not an address.
    ///
    /// ```
    /// use ip_extract::Matcher;
    ///
    /// let data = b"from 10.0.0.1 to 2001:db8::1";
    /// let found: Vec<&[u8]> = Matcher::shared()
    ///     .find_iter(data)
    ///     .map(|r| &data[r])
    ///     .collect();
    /// assert_eq!(found, vec![&b"10.0.0.1"[..], &b"2001:db8::1"[..]]);
    /// ```
    #[inline]
    pub fn find_iter<'a>(&'a self, haystack: &'a [u8]) -> impl Iterator<Item = Range<usize>> + 'a {
        self.regex.find_iter(haystack).filter_map(move |m| {
            let range = m.range();
            let accepted = if m.pattern().as_usize() == IPV4_PATTERN_ID {
                ipv4_boundaries(haystack, &range)
            } else {
                ipv6_boundaries(haystack, &range)
                    && !is_separator(haystack, &range)
                    && parses_as_ipv6(&haystack[range.clone()])
            };
            accepted.then_some(range)
        })
    }

    /// Find every address in a string, yielding the matched substrings.
    #[inline]
    pub fn addresses<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        // Matches are pure ASCII, so every range falls on a char boundary.
        self.find_iter(text.as_bytes()).map(move |r| &text[r])
    }
}

/// A byte that continues a "1.2.3.4" style token when it follows a match.
#[inline(always)]
fn continues_number(haystack: &[u8], end: usize) -> bool {
    match haystack.get(end) {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'.') => haystack.get(end + 1).is_some_and(u8::is_ascii_digit),
        _ => false,
    }
}

#[inline(always)]
fn ipv4_boundaries(haystack: &[u8], range: &Range<usize>) -> bool {
    if range.start > 0 && matches!(haystack[range.start - 1], b'0'..=b'9' | b'.') {
        return false;
    }
    !continues_number(haystack, range.end)
}

#[inline(always)]
fn ipv6_boundaries(haystack: &[u8], range: &Range<usize>) -> bool {
    if range.start > 0 {
        let prev = haystack[range.start - 1];
        if prev.is_ascii_alphanumeric() || prev == b':' || prev == b'.' {
            return false;
        }
    }
    match haystack.get(range.end) {
        Some(b) if b.is_ascii_alphanumeric() || *b == b':' => false,
        _ => !continues_number(haystack, range.end),
    }
}

/// A bare `::` with whitespace or the edge of input on both sides.
#[inline(always)]
fn is_separator(haystack: &[u8], range: &Range<usize>) -> bool {
    if &haystack[range.clone()] != b"::" {
        return false;
    }
    let before = range.start == 0 || haystack[range.start - 1].is_ascii_whitespace();
    let after = haystack.get(range.end).map_or(true, u8::is_ascii_whitespace);
    before && after
}

#[inline]
fn parses_as_ipv6(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|s| strip_zone_index(s).parse::<Ipv6Addr>().is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(text: &str) -> Vec<&str> {
        Matcher::shared().addresses(text).collect()
    }

    #[test]
    fn patterns_compile() {
        assert!(Matcher::new().is_ok());
    }

    #[test]
    fn full_form_is_not_split() {
        assert_eq!(
            matches("a 2001:0db8:85a3:0000:0000:8a2e:0370:7334 b"),
            vec!["2001:0db8:85a3:0000:0000:8a2e:0370:7334"]
        );
    }

    #[test]
    fn embedded_ipv4_reported_once() {
        assert_eq!(matches("x ::ffff:192.0.2.1 y"), vec!["::ffff:192.0.2.1"]);
        assert_eq!(matches("64:ff9b::192.0.2.33"), vec!["64:ff9b::192.0.2.33"]);
    }

    #[test]
    fn embedded_ipv4_after_any_compression() {
        assert_eq!(matches("x 1:2:3:4:5::1.2.3.4 y"), vec!["1:2:3:4:5::1.2.3.4"]);
        assert_eq!(matches("nat64 64:ff9b::1:1.2.3.4"), vec!["64:ff9b::1:1.2.3.4"]);
        assert_eq!(matches("[2001:db8::ffff:1.2.3.4]"), vec!["2001:db8::ffff:1.2.3.4"]);
        assert_eq!(matches("::1:2:3:4:5:1.2.3.4"), vec!["::1:2:3:4:5:1.2.3.4"]);
    }

    #[test]
    fn separator_colons_are_not_an_address() {
        assert!(matches("key :: value").is_empty());
        assert!(matches("::").is_empty());
        assert_eq!(matches("listen [::]:80"), vec!["::"]);
        assert_eq!(matches("any \"::\""), vec!["::"]);
    }

    #[test]
    fn zone_index_kept_in_match() {
        assert_eq!(matches("if fe80::1%eth0 up"), vec!["fe80::1%eth0"]);
    }

    #[test]
    fn scope_resolution_operator_is_not_an_address() {
        assert!(matches("std::vector<int>").is_empty());
    }

    #[test]
    fn fused_octets_rejected() {
        assert!(matches("1.2.3.4.5").is_empty());
        assert!(matches("11.2.3.456").is_empty());
        assert!(matches("256.1.1.1").is_empty());
    }

    #[test]
    fn trailing_period_allowed() {
        assert_eq!(matches("host was 8.8.8.8."), vec!["8.8.8.8"]);
    }

    #[test]
    fn strip_zone() {
        assert_eq!(strip_zone_index("fe80::1%25"), "fe80::1");
        assert_eq!(strip_zone_index("::1"), "::1");
    }
}
