//! Run progress reporting.
//!
//! Reports what `rix run` is doing per repository: discovering, deleting
//! artifacts of vanished files, and indexing changed ones. Progress goes to
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunProgressEvent {
    /// Walking and hashing a repository. Total unknown.
    Discovering { repo: String },
    /// Deleting artifacts of missing files: n done out of total.
    Deleting { repo: String, n: u64, total: u64 },
    /// Indexing selected files: n done out of total.
    Indexing { repo: String, n: u64, total: u64 },
}

impl RunProgressEvent {
    fn phase(&self) -> &'static str {
        match self {
            RunProgressEvent::Discovering { .. } => "discovering",
            RunProgressEvent::Deleting { .. } => "deleting",
            RunProgressEvent::Indexing { .. } => "indexing",
        }
    }
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait RunProgressReporter: Send + Sync {
    fn report(&self, event: RunProgressEvent);
}

/// Human-friendly progress on stderr: "index co.core  indexing  12 / 1,034 files".
pub struct StderrProgress;

impl RunProgressReporter for StderrProgress {
    fn report(&self, event: RunProgressEvent) {
        let line = match &event {
            RunProgressEvent::Discovering { repo } => {
                format!("index {}  discovering...\n", repo)
            }
            RunProgressEvent::Deleting { repo, n, total }
            | RunProgressEvent::Indexing { repo, n, total } => format!(
                "index {}  {}  {} / {} files\n",
                repo,
                event.phase(),
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &RunProgressEvent) -> serde_json::Value {
        match event {
            RunProgressEvent::Discovering { repo } => serde_json::json!({
                "event": "progress",
                "repo": repo,
                "phase": event.phase()
            }),
            RunProgressEvent::Deleting { repo, n, total }
            | RunProgressEvent::Indexing { repo, n, total } => serde_json::json!({
                "event": "progress",
                "repo": repo,
                "phase": event.phase(),
                "n": n,
                "total": total
            }),
        }
    }
}

impl RunProgressReporter for JsonProgress {
    fn report(&self, event: RunProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RunProgressReporter for NoProgress {
    fn report(&self, _event: RunProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn RunProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "Unknown progress mode: '{}'. Must be off, human, or json.",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn json_events_carry_phase_and_counts() {
        let v = JsonProgress::to_json(&RunProgressEvent::Indexing {
            repo: "co.core".into(),
            n: 3,
            total: 10,
        });
        assert_eq!(v["phase"], "indexing");
        assert_eq!(v["repo"], "co.core");
        assert_eq!(v["n"], 3);
        assert_eq!(v["total"], 10);

        let d = JsonProgress::to_json(&RunProgressEvent::Discovering { repo: "r".into() });
        assert_eq!(d["phase"], "discovering");
        assert!(d.get("n").is_none());
    }

    #[test]
    fn progress_mode_parses() {
        assert_eq!("json".parse::<ProgressMode>(), Ok(ProgressMode::Json));
        assert!("loud".parse::<ProgressMode>().is_err());
    }
}
