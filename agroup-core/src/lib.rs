pub mod config;
pub mod error;
pub mod grouping;
pub mod index;
pub mod model;
pub mod render;
pub mod service;
pub mod source;

pub use config::{GroupingOptions, GroupingOverrides};
pub use error::{AgroupError, Result};
pub use grouping::{assemble_groups, group_events, group_events_with};
pub use index::{ResultIndex, build_result_index};
pub use model::{
    ChatEvent, EventKind, EventMetadata, GroupSummary, GroupedEvents, MessageGroup, SessionGroups,
    SubagentEntry,
};
pub use service::{
    group_session, render_session_markdown, session_to_raw_json, sessions_to_raw_json,
};
pub use source::{EventSession, load_sessions, parse_events_jsonl, read_session};
