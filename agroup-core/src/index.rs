use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ChatEvent, EventKind};

/// Maps a tool invocation id to the authoritative `tool_result` for it.
///
/// When a stream carries several results for the same id, the one that
/// appears last wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultIndex<'a> {
    results: BTreeMap<&'a str, &'a ChatEvent>,
}

impl<'a> ResultIndex<'a> {
    pub fn build(events: &'a [ChatEvent]) -> Self {
        let mut results = BTreeMap::new();
        for event in events {
            if event.kind != EventKind::ToolResult {
                continue;
            }
            if let Some(tool_id) = event.metadata.tool_id() {
                results.insert(tool_id, event);
            }
        }

        Self { results }
    }

    pub fn get(&self, tool_id: &str) -> Option<&'a ChatEvent> {
        self.results.get(tool_id).copied()
    }

    /// The result paired with `event`, if it is a tool call with an indexed id.
    pub fn paired_result(&self, event: &ChatEvent) -> Option<&'a ChatEvent> {
        if event.kind != EventKind::ToolCall {
            return None;
        }
        event.metadata.tool_id().and_then(|tool_id| self.get(tool_id))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a ChatEvent)> + '_ {
        self.results.iter().map(|(tool_id, event)| (*tool_id, *event))
    }
}

pub fn build_result_index(events: &[ChatEvent]) -> ResultIndex<'_> {
    ResultIndex::build(events)
}
