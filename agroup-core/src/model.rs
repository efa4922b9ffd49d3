use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::index::ResultIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    ToolCall,
    ToolResult,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::ToolResult => write!(f, "tool_result"),
        }
    }
}

/// Optional fields attached to an event. Unknown keys, and known keys whose
/// value has the wrong JSON type, are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_in_background: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventMetadata {
    pub fn tool_id(&self) -> Option<&str> {
        non_empty(self.tool_id.as_deref())
    }

    pub fn tool_name(&self) -> Option<&str> {
        non_empty(self.tool_name.as_deref())
    }

    pub fn parent_tool_use_id(&self) -> Option<&str> {
        non_empty(self.parent_tool_use_id.as_deref())
    }

    pub fn task_id(&self) -> Option<&str> {
        non_empty(self.task_id.as_deref())
    }

    pub fn runs_in_background(&self) -> bool {
        self.run_in_background.unwrap_or(false)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

impl From<Map<String, Value>> for EventMetadata {
    fn from(mut extra: Map<String, Value>) -> Self {
        Self {
            tool_id: take_string(&mut extra, "toolId"),
            tool_name: take_string(&mut extra, "toolName"),
            parent_tool_use_id: take_string(&mut extra, "parentToolUseId"),
            task_id: take_string(&mut extra, "taskId"),
            run_in_background: take_bool(&mut extra, "runInBackground"),
            status: take_string(&mut extra, "status"),
            extra,
        }
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !map.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match map.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

fn take_bool(map: &mut Map<String, Value>, key: &str) -> Option<bool> {
    let value = map.get(key).and_then(Value::as_bool)?;
    map.remove(key);
    Some(value)
}

/// One logged occurrence in an agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: EventKind,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl ChatEvent {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            kind,
            timestamp,
            content: Value::Null,
            metadata: EventMetadata::default(),
        }
    }

    pub fn is_tool_call_named(&self, tool_name: &str) -> bool {
        self.kind == EventKind::ToolCall && self.metadata.tool_name() == Some(tool_name)
    }
}

/// Timestamps are written as RFC 3339 and read from either RFC 3339 strings
/// or integer epoch milliseconds.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(millis) => DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {millis}"))),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|value| value.with_timezone(&Utc))
                .map_err(|err| D::Error::custom(format!("invalid timestamp {text:?}: {err}"))),
        }
    }
}

/// A sub-agent spawn together with everything the engine attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentEntry<'a> {
    pub spawn: &'a ChatEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ChatEvent>,
    pub nested: Vec<&'a ChatEvent>,
    pub polls: Vec<&'a ChatEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_poll_status: Option<&'a str>,
}

impl<'a> SubagentEntry<'a> {
    fn referenced_events(&self, out: &mut Vec<&'a ChatEvent>) {
        out.push(self.spawn);
        out.extend(self.result);
        out.extend(self.nested.iter().copied());
        out.extend(self.polls.iter().copied());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageGroup<'a> {
    Message {
        event: &'a ChatEvent,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<&'a ChatEvent>,
    },
    Subagent(SubagentEntry<'a>),
    ParallelSubagents {
        entries: Vec<SubagentEntry<'a>>,
    },
}

impl<'a> MessageGroup<'a> {
    /// The event that fixes this group's position in the thread.
    pub fn anchor(&self) -> Option<&'a ChatEvent> {
        match self {
            Self::Message { event, .. } => Some(*event),
            Self::Subagent(entry) => Some(entry.spawn),
            Self::ParallelSubagents { entries } => entries.first().map(|entry| entry.spawn),
        }
    }

    /// Every input event this group carries: anchors, paired results,
    /// nested events and polling calls. Results of nested or polling calls
    /// are not included; those resolve through the [`ResultIndex`].
    pub fn referenced_events(&self) -> Vec<&'a ChatEvent> {
        let mut out = Vec::new();
        match self {
            Self::Message { event, result } => {
                out.push(*event);
                out.extend(*result);
            }
            Self::Subagent(entry) => entry.referenced_events(&mut out),
            Self::ParallelSubagents { entries } => {
                for entry in entries {
                    entry.referenced_events(&mut out);
                }
            }
        }
        out
    }
}

/// Output of one grouping pass: the ordered groups and the index the
/// rendering layer uses to resolve results for nested tool calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEvents<'a> {
    pub groups: Vec<MessageGroup<'a>>,
    pub results: ResultIndex<'a>,
}

/// Grouped output of one session file, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionGroups<'a> {
    pub path: &'a Path,
    #[serde(flatten)]
    pub grouped: GroupedEvents<'a>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub messages: usize,
    pub subagents: usize,
    pub parallel_groups: usize,
    pub parallel_subagents: usize,
    pub nested_events: usize,
    pub polling_calls: usize,
}

impl GroupedEvents<'_> {
    pub fn summary(&self) -> GroupSummary {
        fn count_entry(summary: &mut GroupSummary, entry: &SubagentEntry<'_>) {
            summary.nested_events += entry.nested.len();
            summary.polling_calls += entry.polls.len();
        }

        let mut summary = GroupSummary::default();

        for group in &self.groups {
            match group {
                MessageGroup::Message { .. } => summary.messages += 1,
                MessageGroup::Subagent(entry) => {
                    summary.subagents += 1;
                    count_entry(&mut summary, entry);
                }
                MessageGroup::ParallelSubagents { entries } => {
                    summary.parallel_groups += 1;
                    summary.parallel_subagents += entries.len();
                    for entry in entries {
                        count_entry(&mut summary, entry);
                    }
                }
            }
        }

        summary
    }
}
