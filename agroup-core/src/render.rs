use std::path::Path;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AgroupError, Result};
use crate::index::ResultIndex;
use crate::model::{
    ChatEvent, EventKind, GroupedEvents, MessageGroup, SessionGroups, SubagentEntry,
};

const PREVIEW_MAX_CHARS: usize = 120;
const STATUS_PENDING: &str = "pending";
const STATUS_UNKNOWN: &str = "unknown";

pub fn render_markdown(
    source_path: &Path,
    event_count: usize,
    grouped: &GroupedEvents<'_>,
) -> String {
    let summary = grouped.summary();

    let mut output = String::new();
    output.push_str("# Agent Activity\n\n");
    output.push_str(&format!("- Source: `{}`\n", source_path.display()));
    output.push_str(&format!("- Events: `{event_count}`\n"));
    output.push_str(&format!(
        "- Groups: `{}` (messages: {}, subagents: {}, parallel groups: {})\n",
        grouped.groups.len(),
        summary.messages,
        summary.subagents,
        summary.parallel_groups
    ));
    if summary.subagents + summary.parallel_subagents > 0 {
        output.push_str(&format!(
            "- Subagents: `{}` (nested events: {}, polls: {})\n",
            summary.subagents + summary.parallel_subagents,
            summary.nested_events,
            summary.polling_calls
        ));
    }
    output.push('\n');

    if grouped.groups.is_empty() {
        output.push_str("_No agent activity found._\n");
        return output;
    }

    for (idx, group) in grouped.groups.iter().enumerate() {
        let number = idx + 1;
        match group {
            MessageGroup::Message { event, result } => {
                output.push_str(&format!("## {number}. {}\n\n", event_title(event)));
                push_event_line(&mut output, event);
                if let Some(result) = result {
                    output.push_str(&format!(
                        "- Result: `{}`\n",
                        result_status(result).unwrap_or("done")
                    ));
                }
                push_preview(&mut output, event);
            }
            MessageGroup::Subagent(entry) => {
                output.push_str(&format!("## {number}. Subagent `{}`\n\n", spawn_label(entry)));
                push_subagent_body(&mut output, entry, &grouped.results, "###");
            }
            MessageGroup::ParallelSubagents { entries } => {
                output.push_str(&format!(
                    "## {number}. Parallel Subagents ({})\n\n",
                    entries.len()
                ));
                for (entry_idx, entry) in entries.iter().enumerate() {
                    output.push_str(&format!(
                        "### {number}.{}. Subagent `{}`\n\n",
                        entry_idx + 1,
                        spawn_label(entry)
                    ));
                    push_subagent_body(&mut output, entry, &grouped.results, "####");
                }
            }
        }
    }

    output
}

pub fn render_raw_json(grouped: &GroupedEvents<'_>) -> Result<String> {
    to_pretty_json(grouped)
}

/// One JSON array with a `{path, groups, results}` object per session.
pub fn render_sessions_raw_json(sessions: &[SessionGroups<'_>]) -> Result<String> {
    to_pretty_json(sessions)
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut raw = serde_json::to_string_pretty(value)
        .map_err(|err| AgroupError::Serialization(err.to_string()))?;
    raw.push('\n');
    Ok(raw)
}

fn push_subagent_body(
    output: &mut String,
    entry: &SubagentEntry<'_>,
    results: &ResultIndex<'_>,
    heading: &str,
) {
    push_event_line(output, entry.spawn);
    if entry.spawn.metadata.runs_in_background() {
        output.push_str("- Background: `true`\n");
    }
    output.push_str(&format!(
        "- Result: `{}`\n",
        entry
            .result
            .map_or(STATUS_PENDING, |result| result_status(result).unwrap_or("done"))
    ));
    if let Some(status) = entry.last_poll_status {
        output.push_str(&format!("- Last Poll Status: `{status}`\n"));
    }
    push_preview(output, entry.spawn);

    if !entry.nested.is_empty() {
        output.push_str(&format!("{heading} Nested Events\n\n"));
        for event in &entry.nested {
            let paired = results.paired_result(event);
            let suffix = paired.map_or_else(String::new, |result| {
                format!(" -> `{}`", result_status(result).unwrap_or("done"))
            });
            output.push_str(&format!(
                "- `{}` {}{}{}\n",
                format_timestamp(event),
                event_title(event),
                suffix,
                inline_preview(event)
            ));
        }
        output.push('\n');
    }

    if !entry.polls.is_empty() {
        output.push_str(&format!("{heading} Polls\n\n"));
        for poll in &entry.polls {
            let status = results
                .paired_result(poll)
                .map_or(STATUS_PENDING, |result| {
                    result_status(result).unwrap_or(STATUS_UNKNOWN)
                });
            output.push_str(&format!("- `{}` `{status}`\n", format_timestamp(poll)));
        }
        output.push('\n');
    }
}

fn push_event_line(output: &mut String, event: &ChatEvent) {
    output.push_str(&format!(
        "- Time: `{}` (`{}`)\n",
        format_timestamp(event),
        event.kind
    ));
    if let Some(tool_id) = event.metadata.tool_id() {
        output.push_str(&format!("- Tool Id: `{tool_id}`\n"));
    }
}

fn push_preview(output: &mut String, event: &ChatEvent) {
    let preview = render_preview_text(&event.content, PREVIEW_MAX_CHARS);
    if preview.is_empty() {
        output.push('\n');
        return;
    }
    output.push('\n');
    output.push_str(&preview);
    output.push_str("\n\n");
}

fn inline_preview(event: &ChatEvent) -> String {
    let preview = render_preview_text(&event.content, PREVIEW_MAX_CHARS);
    if preview.is_empty() {
        String::new()
    } else {
        format!(": {preview}")
    }
}

fn event_title(event: &ChatEvent) -> String {
    match (event.kind, event.metadata.tool_name()) {
        (EventKind::ToolCall, Some(tool_name)) => format!("Tool Call `{tool_name}`"),
        (EventKind::ToolCall, None) => "Tool Call".to_string(),
        (EventKind::ToolResult, _) => "Tool Result".to_string(),
        (EventKind::Message, _) => "Message".to_string(),
    }
}

fn spawn_label<'a>(entry: &SubagentEntry<'a>) -> &'a str {
    entry.spawn.metadata.tool_id().unwrap_or(STATUS_UNKNOWN)
}

fn result_status(result: &ChatEvent) -> Option<&str> {
    result
        .metadata
        .status
        .as_deref()
        .filter(|status| !status.is_empty())
}

fn format_timestamp(event: &ChatEvent) -> String {
    event
        .timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn render_preview_text(content: &Value, max_chars: usize) -> String {
    let text = match content {
        Value::Null => return String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    truncate_preview(&text, max_chars)
}

fn truncate_preview(input: &str, max_chars: usize) -> String {
    let normalized = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_chars {
        return normalized;
    }

    let mut out = normalized
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}
