use crate::config::GroupingOptions;
use crate::error::Result;
use crate::grouping::group_events_with;
use crate::model::{GroupedEvents, SessionGroups};
use crate::render;
use crate::source::EventSession;

pub fn group_session<'a>(
    session: &'a EventSession,
    options: &GroupingOptions,
) -> GroupedEvents<'a> {
    group_events_with(&session.events, options)
}

pub fn render_session_markdown(session: &EventSession, options: &GroupingOptions) -> String {
    let grouped = group_session(session, options);
    render::render_markdown(&session.path, session.events.len(), &grouped)
}

pub fn session_to_raw_json(session: &EventSession, options: &GroupingOptions) -> Result<String> {
    let grouped = group_session(session, options);
    render::render_raw_json(&grouped)
}

/// Groups every session and serializes them as one JSON array.
pub fn sessions_to_raw_json(
    sessions: &[EventSession],
    options: &GroupingOptions,
) -> Result<String> {
    let grouped = sessions
        .iter()
        .map(|session| SessionGroups {
            path: &session.path,
            grouped: group_session(session, options),
        })
        .collect::<Vec<_>>();
    render::render_sessions_raw_json(&grouped)
}
