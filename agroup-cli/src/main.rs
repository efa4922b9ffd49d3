use std::path::PathBuf;
use std::process::ExitCode;

use agroup_core::{
    GroupingOptions, GroupingOverrides, load_sessions, render_session_markdown,
    session_to_raw_json, sessions_to_raw_json,
};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "AGROUP_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "agroup",
    version,
    about = "Group agent session events into subagent and parallel threads"
)]
struct Cli {
    /// Session file (JSON Lines, one event per line) or a directory of *.jsonl session files
    path: PathBuf,

    /// Output grouped JSON instead of markdown
    #[arg(long)]
    raw: bool,

    /// Tool name that spawns a subagent (overrides AGROUP_SPAWN_TOOL)
    #[arg(long)]
    spawn_tool: Option<String>,

    /// Tool name that polls a background subagent (overrides AGROUP_POLL_TOOL)
    #[arg(long)]
    poll_tool: Option<String>,

    /// Window in milliseconds for clustering parallel spawns (overrides AGROUP_PARALLEL_THRESHOLD_MS)
    #[arg(long)]
    threshold_ms: Option<u64>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> agroup_core::Result<()> {
    let options = resolve_options(&cli)?;
    debug!(?options, path = %cli.path.display(), "resolved grouping options");

    let sessions = load_sessions(&cli.path)?;
    if cli.raw {
        // Directories print an array even when they hold one session.
        let raw_json = match sessions.as_slice() {
            [session] if !cli.path.is_dir() => session_to_raw_json(session, &options)?,
            _ => sessions_to_raw_json(&sessions, &options)?,
        };
        print!("{raw_json}");
        return Ok(());
    }

    for (idx, session) in sessions.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        let markdown = render_session_markdown(session, &options);
        print!("{markdown}");
    }

    Ok(())
}

fn resolve_options(cli: &Cli) -> agroup_core::Result<GroupingOptions> {
    GroupingOptions::resolve(GroupingOverrides {
        spawn_tool_name: cli.spawn_tool.clone(),
        poll_tool_name: cli.poll_tool.clone(),
        parallel_threshold_ms: cli.threshold_ms,
    })
}
