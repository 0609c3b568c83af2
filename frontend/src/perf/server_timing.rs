use serde::Serialize;

/// One metric from a `Server-Timing` response header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerTimingEntry {
    pub name: String,
    pub duration: Option<f64>,
    pub description: Option<String>,
}

/// Parses a `Server-Timing` header value, e.g.
/// `db;dur=53, app;dur=47.2;desc="App \"core\"", cache;desc=hit`.
///
/// Entries whose name is not a token are skipped, unknown parameters are
/// ignored and for repeated parameters the first one wins.
pub fn parse_server_timing(header: &str) -> Vec<ServerTimingEntry> {
    split_unquoted(header, ',')
        .into_iter()
        .filter_map(|entry| parse_entry(&entry))
        .collect()
}

pub fn total_duration(entries: &[ServerTimingEntry]) -> f64 {
    entries.iter().filter_map(|entry| entry.duration).sum()
}

fn parse_entry(raw: &str) -> Option<ServerTimingEntry> {
    let mut parts = split_unquoted(raw, ';').into_iter();
    let name = parts.next()?.trim().to_string();
    if !is_token(&name) {
        return None;
    }

    let mut entry = ServerTimingEntry {
        name,
        duration: None,
        description: None,
    };
    for param in parts {
        let (key, value) = match param.split_once('=') {
            Some((key, value)) => (key.trim(), Some(unquote(value.trim()))),
            None => (param.trim(), None),
        };
        match key.to_ascii_lowercase().as_str() {
            "dur" if entry.duration.is_none() => {
                entry.duration = Some(value.and_then(|v| v.parse().ok()).unwrap_or(0.0));
            }
            "desc" if entry.description.is_none() => {
                entry.description = Some(value.unwrap_or_default());
            }
            _ => {}
        }
    }
    Some(entry)
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
        })
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => break,
            _ => out.push(c),
        }
    }
    out
}

/// Splits on `sep` except inside double-quoted strings.
fn split_unquoted(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
        } else if in_quotes && c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
    }
    parts.push(current);
    parts
}
