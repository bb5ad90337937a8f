//! One-line derivations a renderer shows for blocks.

use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;

const ELLIPSIS: &str = "...";
const CAT_N_ARROW: char = '→';
const CAT_N_PREFIX_MAX: usize = 12;
const FALLBACK_KEYS: [&str; 7] = [
    "command",
    "file_path",
    "path",
    "pattern",
    "query",
    "url",
    "prompt",
];

/// Cuts `s` to at most `max` grapheme clusters, ending in `...` when cut.
/// A `max` of zero leaves the text alone.
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    if max == 0 {
        return s.to_string();
    }
    let boundaries: Vec<usize> = s.grapheme_indices(true).map(|(idx, _)| idx).collect();
    if boundaries.len() <= max {
        return s.to_string();
    }
    if max <= ELLIPSIS.len() {
        return s[..boundaries[max]].to_string();
    }
    format!("{}{ELLIPSIS}", &s[..boundaries[max - ELLIPSIS.len()]])
}

/// First line of `s`, trimmed and cut to `max` graphemes.
pub fn first_line(s: &str, max: usize) -> String {
    let line = s.trim().lines().next().unwrap_or_default().trim();
    truncate_graphemes(line, max)
}

fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// Picks the most telling field of a tool's input for a one-line header.
pub fn tool_input_summary(tool: &str, input: &str, max: usize) -> String {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(input) else {
        return first_line(input, max);
    };

    let summary = match tool {
        "Bash" => string_field(&fields, "command").map(str::to_string),
        "Read" | "Write" | "Edit" => string_field(&fields, "file_path").map(str::to_string),
        "Glob" => string_field(&fields, "pattern").map(|pattern| {
            match string_field(&fields, "path") {
                Some(path) => format!("{path}/{pattern}"),
                None => pattern.to_string(),
            }
        }),
        "Grep" => string_field(&fields, "pattern").map(str::to_string),
        "WebFetch" => string_field(&fields, "url").map(str::to_string),
        _ => FALLBACK_KEYS
            .iter()
            .find_map(|key| string_field(&fields, key).filter(|v| !v.is_empty()))
            .map(str::to_string),
    };

    match summary {
        Some(summary) if !summary.is_empty() => first_line(&summary, max),
        _ => first_line(input, max),
    }
}

/// Strips tool-output decoration: `<tool_use_error>` tags and a leading
/// `cat -n` line number.
pub fn clean_tool_output(s: &str) -> String {
    let mut out = s.trim();
    if let Some(rest) = out.strip_prefix("<tool_use_error>") {
        out = rest.strip_suffix("</tool_use_error>").unwrap_or(rest).trim();
    }
    if let Some(idx) = out.find(CAT_N_ARROW)
        && idx < CAT_N_PREFIX_MAX
        && out[..idx].trim().parse::<i64>().is_ok()
    {
        out = out[idx + CAT_N_ARROW.len_utf8()..].trim();
    }
    out.to_string()
}

/// Compact token count: `999`, `1.5k`, `2.3M`.
pub fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Wraps each paragraph of `text` at spaces so no line exceeds `width`
/// graphemes. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut remaining = paragraph;
        while remaining.graphemes(true).count() > width {
            let limit = remaining
                .grapheme_indices(true)
                .nth(width)
                .map_or(remaining.len(), |(idx, _)| idx);
            let break_at = match remaining[..limit].rfind(' ') {
                Some(idx) if idx > 0 => idx,
                _ => limit,
            };
            lines.push(remaining[..break_at].to_string());
            remaining = remaining[break_at..].trim_start_matches(' ');
        }
        if !remaining.is_empty() || paragraph.is_empty() {
            lines.push(remaining.to_string());
        }
    }
    lines
}
