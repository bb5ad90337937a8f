//! Plain-text transcript rendering.

use skein_core::session::SessionStats;
use skein_core::summary::{clean_tool_output, first_line, format_tokens, tool_input_summary};
use skein_core::transcript::{Block, Role, SubBlock, ToolInvocation, ToolResult, Turn};

const SUMMARY_WIDTH: usize = 80;
const NESTED: &str = "   | ";

pub fn turn_lines(turn: &Turn) -> Vec<String> {
    match turn.role() {
        Role::User => return vec![format!("you: {}", first_line(turn.text(), SUMMARY_WIDTH))],
        Role::Error => return vec![format!("error: {}", turn.text())],
        Role::Assistant => {}
    }

    let mut lines = Vec::new();
    for block in turn.blocks() {
        match block {
            Block::Text(text) => lines.extend(text.text.trim().lines().map(str::to_string)),
            Block::Reasoning(text) => {
                lines.extend(text.text.trim().lines().map(|line| format!("> {line}")));
            }
            Block::ToolInvocation(invocation) => invocation_lines(invocation, &mut lines),
            Block::ToolResult(result) => lines.push(result_line(result, "")),
        }
    }
    lines
}

fn header(name: &str, summary: &str) -> String {
    if summary.is_empty() {
        format!("-> {name}")
    } else {
        format!("-> {name}: {summary}")
    }
}

fn invocation_lines(invocation: &ToolInvocation, lines: &mut Vec<String>) {
    let Some(delegation) = &invocation.delegation else {
        let summary = tool_input_summary(&invocation.name, &invocation.input, SUMMARY_WIDTH);
        lines.push(header(&invocation.name, &summary));
        return;
    };

    let label = if delegation.subagent_type.is_empty() {
        invocation.name.clone()
    } else {
        format!("{} [{}]", invocation.name, delegation.subagent_type)
    };
    lines.push(header(&label, &first_line(&delegation.description, SUMMARY_WIDTH)));

    for sub in &delegation.sub_blocks {
        match sub {
            SubBlock::ToolInvocation { name, input, .. } => {
                let summary = tool_input_summary(name, input, SUMMARY_WIDTH);
                lines.push(format!("{NESTED}{}", header(name, &summary)));
            }
            SubBlock::ToolResult(result) => lines.push(result_line(result, NESTED)),
        }
    }

    if let Some(meta) = &delegation.meta {
        lines.push(format!(
            "{NESTED}{} tools, {} tokens, {:.1}s",
            meta.total_tool_use_count,
            format_tokens(meta.total_tokens),
            meta.total_duration_ms as f64 / 1000.0
        ));
    }
}

fn result_line(result: &ToolResult, indent: &str) -> String {
    let output = first_line(&clean_tool_output(&result.output), SUMMARY_WIDTH);
    if result.is_error {
        format!("{indent}<- error: {output}")
    } else {
        format!("{indent}<- {output}")
    }
}

/// Usage footer for the last request, if any request completed.
pub fn stats_line(stats: &SessionStats) -> Option<String> {
    if stats.total_requests == 0 {
        return None;
    }
    let mut parts = Vec::new();
    if let Some(model) = &stats.last_model {
        parts.push(model.clone());
    }
    parts.push(format!("${:.4}", stats.last_cost_usd));
    parts.push(format!(
        "{} in / {} out",
        format_tokens(stats.last_input_tokens),
        format_tokens(stats.last_output_tokens)
    ));
    if let Some(percent) = stats.cache_hit_percent() {
        parts.push(format!("{percent:.0}% cached"));
    }
    parts.push(format!("{:.1}s", stats.last_duration_ms as f64 / 1000.0));
    Some(format!("-- {}", parts.join(" · ")))
}
