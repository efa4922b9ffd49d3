use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AgroupError, Result};
use crate::model::ChatEvent;

const SESSION_EXTENSION: &str = "jsonl";

/// One session file and the events it holds, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSession {
    pub path: PathBuf,
    pub events: Vec<ChatEvent>,
}

/// Loads a single session file, or every `*.jsonl` file below a directory.
pub fn load_sessions(path: &Path) -> Result<Vec<EventSession>> {
    let metadata = fs::metadata(path).map_err(|source| AgroupError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return Ok(vec![read_session(path)?]);
    }

    let files = discover_session_files(path);
    if files.is_empty() {
        return Err(AgroupError::NoEventFiles {
            path: path.to_path_buf(),
        });
    }

    files.iter().map(|file| read_session(file)).collect()
}

pub fn discover_session_files(root: &Path) -> Vec<PathBuf> {
    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == SESSION_EXTENSION)
        })
        .collect::<Vec<_>>();

    debug!(root = %root.display(), files = files.len(), "discovered session files");
    files
}

pub fn read_session(path: &Path) -> Result<EventSession> {
    let raw = read_session_raw(path)?;
    let events = parse_events_jsonl(path, &raw)?;
    debug!(path = %path.display(), events = events.len(), "loaded session");

    Ok(EventSession {
        path: path.to_path_buf(),
        events,
    })
}

fn read_session_raw(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| AgroupError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(AgroupError::EmptyEventFile {
            path: path.to_path_buf(),
        });
    }

    String::from_utf8(bytes).map_err(|_| AgroupError::NonUtf8EventFile {
        path: path.to_path_buf(),
    })
}

/// Parses one `ChatEvent` per non-blank line. `path` is only used for errors.
pub fn parse_events_jsonl(path: &Path, raw_jsonl: &str) -> Result<Vec<ChatEvent>> {
    let mut events = Vec::new();

    for (line_idx, line) in raw_jsonl.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event = serde_json::from_str::<ChatEvent>(trimmed).map_err(|source| {
            AgroupError::InvalidJsonLine {
                path: path.to_path_buf(),
                line: line_idx + 1,
                source,
            }
        })?;
        events.push(event);
    }

    Ok(events)
}
