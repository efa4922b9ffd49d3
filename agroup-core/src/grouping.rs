//! Turns a flat, single-session event stream into render-ready groups.
//!
//! The pass runs in four steps over the input: the result index, spawn
//! discovery and clustering, nesting and background polling, and a final
//! assembly walk in stream order. Every step is total over its input; sparse
//! or malformed metadata degrades to plain messages.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::config::GroupingOptions;
use crate::index::ResultIndex;
use crate::model::{ChatEvent, EventKind, GroupedEvents, MessageGroup, SubagentEntry};

#[derive(Debug, Clone, Copy)]
struct Spawn<'a> {
    position: usize,
    event: &'a ChatEvent,
    tool_id: &'a str,
}

/// Groups `events` using the default sentinel names and clustering window.
pub fn group_events(events: &[ChatEvent]) -> GroupedEvents<'_> {
    group_events_with(events, &GroupingOptions::default())
}

pub fn group_events_with<'a>(
    events: &'a [ChatEvent],
    options: &GroupingOptions,
) -> GroupedEvents<'a> {
    let results = ResultIndex::build(events);
    let groups = assemble_groups(events, &results, options);
    GroupedEvents { groups, results }
}

/// Builds the ordered groups for `events` against an already built index.
pub fn assemble_groups<'a>(
    events: &'a [ChatEvent],
    results: &ResultIndex<'a>,
    options: &GroupingOptions,
) -> Vec<MessageGroup<'a>> {
    let (spawns, is_duplicate) = discover_spawns(events, &options.spawn_tool_name);
    let clusters = cluster_spawns(&spawns, options.parallel_threshold_ms);

    let mut spawn_at = vec![None::<usize>; events.len()];
    let mut cluster_of = vec![0_usize; spawns.len()];
    for (spawn_idx, spawn) in spawns.iter().enumerate() {
        spawn_at[spawn.position] = Some(spawn_idx);
    }
    for (cluster_idx, members) in clusters.iter().enumerate() {
        for &member in members {
            cluster_of[member] = cluster_idx;
        }
    }

    let (nested, is_nested) = collect_nested(events, &spawns);
    let (polls, is_poll) = collect_polls(events, &spawns, &is_nested, &options.poll_tool_name);

    let mut entries = spawns
        .iter()
        .zip(nested)
        .zip(polls)
        .map(|((spawn, nested), polls)| {
            let last_poll_status = polls
                .last()
                .and_then(|poll| results.paired_result(poll))
                .and_then(|result| result.metadata.status.as_deref());
            Some(SubagentEntry {
                spawn: spawn.event,
                result: results.paired_result(spawn.event),
                nested,
                polls,
                last_poll_status,
            })
        })
        .collect::<Vec<_>>();

    let mut cluster_rendered = vec![false; clusters.len()];
    let mut groups = Vec::new();

    for (position, event) in events.iter().enumerate() {
        if event.kind == EventKind::ToolResult || is_nested[position] || is_poll[position] {
            continue;
        }

        if let Some(spawn_idx) = spawn_at[position] {
            let cluster_idx = cluster_of[spawn_idx];
            let members = &clusters[cluster_idx];

            if members.len() == 1 {
                if let Some(entry) = entries[spawn_idx].take() {
                    groups.push(MessageGroup::Subagent(entry));
                }
            } else if !cluster_rendered[cluster_idx] {
                cluster_rendered[cluster_idx] = true;
                let cluster_entries = members
                    .iter()
                    .filter_map(|&member| entries[member].take())
                    .collect();
                groups.push(MessageGroup::ParallelSubagents {
                    entries: cluster_entries,
                });
            }
            continue;
        }

        // A duplicate spawn's id resolves to the first spawn's result.
        let result = if is_duplicate[position] {
            None
        } else {
            results.paired_result(event)
        };
        groups.push(MessageGroup::Message { event, result });
    }

    debug!(
        events = events.len(),
        results = results.len(),
        spawns = spawns.len(),
        clusters = clusters.len(),
        groups = groups.len(),
        "grouped agent activity"
    );

    groups
}

/// Spawn calls in stream order, plus a per-position flag for spawn calls
/// dropped because their tool id was already taken.
///
/// A spawn needs a tool id to be addressable. Spawns issued from inside
/// another spawn stay nested content of their parent, and a repeated tool id
/// keeps its first occurrence only.
fn discover_spawns<'a>(
    events: &'a [ChatEvent],
    spawn_tool_name: &str,
) -> (Vec<Spawn<'a>>, Vec<bool>) {
    let mut candidates = Vec::new();
    let mut seen = HashMap::<&str, usize>::new();
    let mut is_duplicate = vec![false; events.len()];

    for (position, event) in events.iter().enumerate() {
        if !event.is_tool_call_named(spawn_tool_name) {
            continue;
        }
        let Some(tool_id) = event.metadata.tool_id() else {
            continue;
        };
        if let Some(first) = seen.get(tool_id) {
            warn!(
                tool_id,
                first_position = first,
                position,
                "duplicate spawn tool id; keeping the first spawn"
            );
            is_duplicate[position] = true;
            continue;
        }

        seen.insert(tool_id, position);
        candidates.push(Spawn {
            position,
            event,
            tool_id,
        });
    }

    let spawns = candidates
        .into_iter()
        .filter(|spawn| {
            spawn
                .event
                .metadata
                .parent_tool_use_id()
                .is_none_or(|parent| parent == spawn.tool_id || !seen.contains_key(parent))
        })
        .collect::<Vec<_>>();

    (spawns, is_duplicate)
}

/// Anchor-relative clustering of spawns.
///
/// Each unassigned spawn opens a cluster and pulls in every later unassigned
/// spawn whose start is within `threshold_ms` of the anchor itself. Membership
/// does not chain through other members.
fn cluster_spawns(spawns: &[Spawn<'_>], threshold_ms: u64) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; spawns.len()];
    let mut clusters = Vec::new();

    for anchor in 0..spawns.len() {
        if assigned[anchor] {
            continue;
        }
        assigned[anchor] = true;

        let anchor_time = spawns[anchor].event.timestamp;
        let mut members = vec![anchor];
        for candidate in anchor + 1..spawns.len() {
            if assigned[candidate] {
                continue;
            }
            let delta = spawns[candidate]
                .event
                .timestamp
                .signed_duration_since(anchor_time)
                .num_milliseconds()
                .unsigned_abs();
            if delta <= threshold_ms {
                assigned[candidate] = true;
                members.push(candidate);
            }
        }

        trace!(
            anchor = spawns[anchor].tool_id,
            members = members.len(),
            "spawn cluster"
        );
        clusters.push(members);
    }

    clusters
}

/// Per-spawn nested events (results excluded) plus a per-position flag for
/// every event that sits under a spawn, results included.
fn collect_nested<'a>(
    events: &'a [ChatEvent],
    spawns: &[Spawn<'a>],
) -> (Vec<Vec<&'a ChatEvent>>, Vec<bool>) {
    let by_tool_id = spawns
        .iter()
        .enumerate()
        .map(|(spawn_idx, spawn)| (spawn.tool_id, spawn_idx))
        .collect::<HashMap<_, _>>();

    let mut nested = vec![Vec::new(); spawns.len()];
    let mut is_nested = vec![false; events.len()];

    for (position, event) in events.iter().enumerate() {
        let Some(&spawn_idx) = event
            .metadata
            .parent_tool_use_id()
            .and_then(|parent| by_tool_id.get(parent))
        else {
            continue;
        };
        if spawns[spawn_idx].position == position {
            continue;
        }

        is_nested[position] = true;
        if event.kind != EventKind::ToolResult {
            nested[spawn_idx].push(event);
        }
    }

    (nested, is_nested)
}

/// Polling calls that target background spawns, in stream order.
fn collect_polls<'a>(
    events: &'a [ChatEvent],
    spawns: &[Spawn<'a>],
    is_nested: &[bool],
    poll_tool_name: &str,
) -> (Vec<Vec<&'a ChatEvent>>, Vec<bool>) {
    let background = spawns
        .iter()
        .enumerate()
        .filter(|(_, spawn)| spawn.event.metadata.runs_in_background())
        .map(|(spawn_idx, spawn)| (spawn.tool_id, spawn_idx))
        .collect::<HashMap<_, _>>();

    let mut polls = vec![Vec::new(); spawns.len()];
    let mut is_poll = vec![false; events.len()];
    if background.is_empty() {
        return (polls, is_poll);
    }

    for (position, event) in events.iter().enumerate() {
        if is_nested[position] || !event.is_tool_call_named(poll_tool_name) {
            continue;
        }
        let Some(&spawn_idx) = event
            .metadata
            .task_id()
            .and_then(|task_id| background.get(task_id))
        else {
            continue;
        };

        is_poll[position] = true;
        polls[spawn_idx].push(event);
    }

    (polls, is_poll)
}
