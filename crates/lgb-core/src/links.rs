//! Link detection.
//!
//! Several independent patterns are run over the text and their matches are
//! merged: overlapping spans collapse to the earliest (then longest) match, so
//! `https://example.com` is reported once even though the bare-domain pattern
//! also matches `example.com` inside it.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;

/// URL shorteners. Always treated as links, and flagged as suspicious.
const SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "ow.ly",
    "t.co",
    "is.gd",
    "cutt.ly",
    "bit.do",
    "rb.gy",
    "shorturl.at",
];

/// Free/throwaway TLDs that show up a lot in spam.
const SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf", ".gq"];

/// TLDs recognized for bare (scheme-less, `www`-less) domains.
const BARE_TLDS: &str = "com|org|net|edu|gov|io|co|me|tv|xyz|info|biz|app|dev|ru|uk|de|us|ly|gg|ai|to|cc|link|site|online|top|club|shop|store|tk|ml|ga|cf|gq";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PatternKind {
    Scheme,
    Www,
    Telegram,
    Shortener,
    BareDomain,
}

struct Pattern {
    kind: PatternKind,
    re: Regex,
}

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let shorteners = SHORTENERS
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");

        let sources = [
            (PatternKind::Scheme, r#"(?i)\bhttps?://[^\s<>"'`]+"#.to_string()),
            (
                PatternKind::Www,
                r#"(?i)\bwww\.[a-z0-9-]+(?:\.[a-z0-9-]+)+(?::\d{1,5})?(?:/[^\s<>"'`]*)?"#
                    .to_string(),
            ),
            (
                PatternKind::Telegram,
                r#"(?i)(?:\b(?:t|telegram)\.me|\btelegram\.dog)/[a-z0-9_+/?=&-]+|\btg://[^\s<>"'`]+"#
                    .to_string(),
            ),
            (
                PatternKind::Shortener,
                format!(r"(?i)\b(?:{shorteners})/[a-z0-9_-]+"),
            ),
            (
                PatternKind::BareDomain,
                format!(
                    r#"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{{0,61}}[a-z0-9])?\.)+(?:{BARE_TLDS})\b(?::\d{{1,5}})?(?:/[^\s<>"'`]*)?"#
                ),
            ),
        ];

        sources
            .into_iter()
            .map(|(kind, src)| Pattern {
                kind,
                re: Regex::new(&src).expect("valid link regex"),
            })
            .collect()
    })
}

/// Extract every link in `text`, in order of appearance, without duplicates.
pub fn extract_links(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut spans: Vec<(usize, usize)> = Vec::new();
    for pattern in patterns() {
        for m in pattern.re.find_iter(text) {
            for (offset, piece) in split_joined_urls(m.as_str()) {
                let trimmed = trim_trailing_punctuation(piece);
                if trimmed.is_empty() {
                    continue;
                }
                let start = m.start() + offset;
                let end = start + trimmed.len();
                // Either half of `alice.me@example.com` is part of an address.
                if pattern.kind == PatternKind::BareDomain
                    && (text[..start].ends_with('@') || text[end..].starts_with('@'))
                {
                    continue;
                }
                spans.push((start, end));
            }
        }
    }

    // Earliest first; on equal start the longest wins.
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut covered_until = 0usize;
    for (start, end) in spans {
        if start < covered_until {
            continue;
        }
        covered_until = end;
        let link = &text[start..end];
        if seen.insert(link.to_lowercase()) {
            out.push(link.to_string());
        }
    }

    if !out.is_empty() {
        tracing::debug!(count = out.len(), links = ?out, "links detected");
    }
    out
}

pub fn contains_links(text: &str) -> bool {
    !extract_links(text).is_empty()
}

/// Cheap heuristic: shorteners and throwaway TLDs.
pub fn is_suspicious_link(url: &str) -> bool {
    let lower = url.to_lowercase();
    let rest = lower
        .split_once("://")
        .map(|(_, r)| r)
        .unwrap_or(lower.as_str());
    let host = rest
        .split(|c| matches!(c, '/' | ':' | '?' | '#'))
        .next()
        .unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);

    SHORTENERS.contains(&host) || SUSPICIOUS_TLDS.iter().any(|tld| host.ends_with(tld))
}

/// Split `https://a.com,https://b.com` at each `,` that starts another URL.
/// Yields `(byte offset, piece)`; a piece may keep its trailing comma.
fn split_joined_urls(s: &str) -> Vec<(usize, &str)> {
    let lower = s.to_ascii_lowercase();
    let mut starts = vec![0];
    for (i, _) in lower.match_indices(',') {
        let next = &lower[i + 1..];
        if next.starts_with("http://") || next.starts_with("https://") {
            starts.push(i + 1);
        }
    }
    starts
        .iter()
        .enumerate()
        .map(|(n, &from)| {
            let to = starts.get(n + 1).copied().unwrap_or(s.len());
            (from, &s[from..to])
        })
        .collect()
}

fn trim_trailing_punctuation(s: &str) -> &str {
    let mut cur = s;
    while let Some(c) = cur.chars().last() {
        let strip = match c {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '»' => true,
            // Keep balanced brackets: `.../Rust_(language)` stays intact.
            ')' => cur.matches(')').count() > cur.matches('(').count(),
            ']' => cur.matches(']').count() > cur.matches('[').count(),
            '}' => cur.matches('}').count() > cur.matches('{').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        cur = &cur[..cur.len() - c.len_utf8()];
    }
    cur
}
