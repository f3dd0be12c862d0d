//! Sync command handlers

use anyhow::{bail, Result};

use lore_core::{DeferCause, SyncEngine, SyncMode, SyncOutcome};

use crate::output::{Output, OutputFormat};

/// Run the requested halves of the sync cycle and report the outcome
pub fn run(
    engine: &SyncEngine,
    mode: SyncMode,
    message: Option<String>,
    output: &Output,
) -> Result<()> {
    if !engine.is_configured() {
        bail!(
            "Store is not configured. Set a remote and initialize it with:\n  \
             lore init --remote <url>"
        );
    }

    let outcome = match (mode, message) {
        (SyncMode::Push, Some(message)) => engine.push(&message)?,
        (mode, _) => engine.sync(mode)?,
    };

    report(&outcome, output)
}

/// Print the outcome; conflicts surface as a hard error
fn report(outcome: &SyncOutcome, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome_json(outcome))?);
        }
        OutputFormat::Quiet => {}
        OutputFormat::Human => match outcome {
            SyncOutcome::Synced(report) => {
                output.success("Sync complete");
                if report.pulled {
                    println!("  Applied remote changes");
                }
                if let Some(ref subject) = report.committed {
                    println!("  Committed: {}", subject);
                }
                if report.pushed {
                    println!("  Published to remote");
                }
            }
            SyncOutcome::UpToDate => {
                output.success("Already up to date");
            }
            SyncOutcome::Deferred(cause) => {
                println!("Sync deferred: {}", describe_cause(cause));
                println!("Nothing was lost; run `lore sync` again later.");
            }
            SyncOutcome::ConflictsDetected { reset } => {
                println!("Conflict markers detected. Reset to last committed state:");
                for path in reset {
                    println!("  {}", path);
                }
            }
        },
    }

    if let SyncOutcome::ConflictsDetected { reset } = outcome {
        bail!(
            "conflict markers detected; {} file(s) reset to their last committed state",
            reset.len()
        );
    }

    Ok(())
}

/// One-line human description of an outcome, for auto-sync warnings
pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Synced(_) => "synced".to_string(),
        SyncOutcome::UpToDate => "already up to date".to_string(),
        SyncOutcome::Deferred(cause) => describe_cause(cause),
        SyncOutcome::ConflictsDetected { reset } => format!(
            "conflict markers detected; {} file(s) reset to their last committed state",
            reset.len()
        ),
    }
}

fn describe_cause(cause: &DeferCause) -> String {
    match cause {
        DeferCause::LockBusy { holder: Some(pid) } => {
            format!("store lock is held by process {}", pid)
        }
        DeferCause::LockBusy { holder: None } => "store lock is busy".to_string(),
        DeferCause::PullFailed { detail } => format!("pull failed: {}", first_line(detail)),
        DeferCause::PushRejected { detail } => format!("push rejected: {}", first_line(detail)),
    }
}

fn outcome_json(outcome: &SyncOutcome) -> serde_json::Value {
    match outcome {
        SyncOutcome::Synced(report) => serde_json::json!({
            "outcome": "synced",
            "pulled": report.pulled,
            "committed": report.committed,
            "pushed": report.pushed
        }),
        SyncOutcome::UpToDate => serde_json::json!({
            "outcome": "up_to_date"
        }),
        SyncOutcome::Deferred(cause) => {
            let (kind, detail) = match cause {
                DeferCause::LockBusy { holder } => {
                    ("lock_busy", holder.map(|pid| pid.to_string()))
                }
                DeferCause::PullFailed { detail } => ("pull_failed", Some(detail.clone())),
                DeferCause::PushRejected { detail } => ("push_rejected", Some(detail.clone())),
            };
            serde_json::json!({
                "outcome": "deferred",
                "cause": kind,
                "detail": detail
            })
        }
        SyncOutcome::ConflictsDetected { reset } => serde_json::json!({
            "outcome": "conflicts_detected",
            "reset": reset
        }),
    }
}

/// Git stderr can run to many lines; the first carries the story
fn first_line(detail: &str) -> &str {
    detail.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::SyncReport;

    #[test]
    fn test_describe_cause() {
        assert_eq!(
            describe_cause(&DeferCause::LockBusy { holder: Some(42) }),
            "store lock is held by process 42"
        );
        assert_eq!(
            describe_cause(&DeferCause::PullFailed {
                detail: "fatal: unable to access remote\nextra context".to_string()
            }),
            "pull failed: fatal: unable to access remote"
        );
    }

    #[test]
    fn test_outcome_json_shapes() {
        let synced = outcome_json(&SyncOutcome::Synced(SyncReport {
            pulled: true,
            committed: Some("lore: +1".to_string()),
            pushed: true,
        }));
        assert_eq!(synced["outcome"], "synced");
        assert_eq!(synced["pulled"], true);
        assert_eq!(synced["committed"], "lore: +1");

        let conflicts = outcome_json(&SyncOutcome::ConflictsDetected {
            reset: vec!["projects/a/skills/x.md".to_string()],
        });
        assert_eq!(conflicts["outcome"], "conflicts_detected");
        assert_eq!(conflicts["reset"][0], "projects/a/skills/x.md");
    }
}
