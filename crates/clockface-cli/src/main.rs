use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use clockface_core::{scoring, screen, CaptureMode, Descriptor, Detection, EnrolledFace};
use clockface_session::{
    spawn_session, ReplayProbe, RosterStore, SessionConfig, SessionEnd, SessionHandle,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clockface", about = "Clockface face-matching diagnostics and roster tool")]
struct Cli {
    /// TOML session config (CLOCKFACE_* variables still override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print geometry, scores and gate verdict for one detection
    Score {
        /// JSON file holding a single detection
        detection: PathBuf,
    },
    /// Run a verify session over recorded frames
    Replay {
        #[command(flatten)]
        session: SessionArgs,
        /// JSON roster file: [{"employeeId": ..., "descriptor": {"0": ..., ...}}]
        #[arg(long, conflicts_with = "db")]
        roster: Option<PathBuf>,
        /// Roster database (defaults to the configured path)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Run an enrollment session and store the captured descriptor
    Enroll {
        /// Employee to enroll
        #[arg(short, long)]
        employee: String,
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List enrolled employees
    Roster {
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Remove an employee's enrollment
    Remove {
        #[arg(short, long)]
        employee: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// JSON array of recorded detections (null = no face)
    #[arg(short, long)]
    frames: PathBuf,
    /// Override the poll interval
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Override the consecutive matches required to confirm
    #[arg(long)]
    required: Option<u32>,
}

/// Roster file record; descriptors use the index-keyed storage encoding.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterRecord {
    employee_id: String,
    #[serde(with = "clockface_core::descriptor::storage")]
    descriptor: Descriptor,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::from_env().context("reading CLOCKFACE_* configuration")?,
    };

    match cli.command {
        Commands::Score { detection } => score(&detection, &config)?,
        Commands::Replay { session, roster, db } => {
            let roster = match roster {
                Some(path) => load_roster_file(&path)?,
                None => open_store(db.as_deref(), &config).await?.roster().await?,
            };
            let config = session.apply(config);
            let probe = load_frames(&session.frames)?;
            let handle = spawn_session(probe, Arc::from(roster), CaptureMode::Verify, &config);
            match print_outcomes(handle).await? {
                SessionEnd::Confirmed(_) => {}
                SessionEnd::Exhausted => bail!("frames exhausted before an identity was confirmed"),
                SessionEnd::Stopped => bail!("session stopped before an identity was confirmed"),
            }
        }
        Commands::Enroll {
            employee,
            session,
            db,
        } => {
            let store = open_store(db.as_deref(), &config).await?;
            let roster = store.roster().await?;
            let config = session.apply(config);
            let probe = load_frames(&session.frames)?;
            let mode = CaptureMode::Enroll {
                employee_id: employee.clone(),
            };
            let handle = spawn_session(probe, Arc::from(roster), mode, &config);

            let SessionEnd::Confirmed(outcome) = print_outcomes(handle).await? else {
                bail!("no face captured for {employee}");
            };
            let descriptor = outcome
                .descriptor
                .context("enrollment confirmed without a descriptor")?;
            let id = store.enroll(&employee, &descriptor).await?;
            eprintln!("Enrolled {employee} ({id})");
        }
        Commands::Roster { db } => {
            let store = open_store(db.as_deref(), &config).await?;
            let list = store.list().await?;
            if list.is_empty() {
                eprintln!("No employees enrolled");
            }
            for info in list {
                println!("{}\t{}\t{}", info.employee_id, info.created_at, info.id);
            }
        }
        Commands::Remove { employee, db } => {
            let store = open_store(db.as_deref(), &config).await?;
            if !store.remove(&employee).await? {
                bail!("{employee} is not enrolled");
            }
            eprintln!("Removed {employee}");
        }
    }

    Ok(())
}

impl SessionArgs {
    fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(ms) = self.interval_ms {
            config.poll_interval_ms = ms.max(1);
        }
        if let Some(n) = self.required {
            config.required_matches = n.max(1);
        }
        config
    }
}

fn score(path: &Path, config: &SessionConfig) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let detection: Detection = serde_json::from_str(&text)
        .with_context(|| format!("parsing detection {}", path.display()))?;

    let assessment = scoring::assess(&detection, &config.thresholds);
    let verdict = match screen(Some(&detection), &config.thresholds) {
        Ok(_) => serde_json::json!({ "pass": true }),
        Err(rejection) => serde_json::json!({
            "pass": false,
            "rejection": rejection,
            "message": rejection.message(),
        }),
    };
    let report = serde_json::json!({
        "area": detection.bbox.area(),
        "assessment": assessment,
        "verdict": verdict,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn open_store(db: Option<&Path>, config: &SessionConfig) -> Result<RosterStore> {
    let path = db.unwrap_or(config.db_path.as_path());
    tracing::debug!(path = %path.display(), "opening roster database");
    RosterStore::open(path)
        .await
        .with_context(|| format!("opening roster database {}", path.display()))
}

fn load_frames(path: &Path) -> Result<ReplayProbe> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    ReplayProbe::from_json(&text).with_context(|| format!("parsing frames {}", path.display()))
}

fn load_roster_file(path: &Path) -> Result<Vec<EnrolledFace>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_roster(&text).with_context(|| format!("parsing roster {}", path.display()))
}

fn parse_roster(json: &str) -> Result<Vec<EnrolledFace>> {
    let records: Vec<RosterRecord> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .map(|r| EnrolledFace {
            employee_id: r.employee_id,
            descriptor: r.descriptor,
        })
        .collect())
}

/// Print each outcome as one JSON line until the session ends.
async fn print_outcomes(mut handle: SessionHandle) -> Result<SessionEnd> {
    while let Some(outcome) = handle.next_outcome().await {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(handle.wait().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clockface_core::DESCRIPTOR_DIM;

    fn storage_map(first: f32) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = (0..DESCRIPTOR_DIM)
            .map(|i| (i.to_string(), serde_json::json!(if i == 0 { first } else { 0.0 })))
            .collect();
        serde_json::Value::Object(map)
    }

    #[test]
    fn test_parse_roster_file() {
        let json = serde_json::json!([
            { "employeeId": "E1", "descriptor": storage_map(0.25) },
            { "employeeId": "E2", "descriptor": storage_map(0.5) },
        ])
        .to_string();
        let roster = parse_roster(&json).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].employee_id, "E2");
        assert_eq!(roster[0].descriptor.values()[0], 0.25);
    }

    #[test]
    fn test_parse_roster_rejects_short_descriptor() {
        let json = r#"[{ "employeeId": "E1", "descriptor": { "0": 0.1, "1": 0.2 } }]"#;
        assert!(parse_roster(json).is_err());
    }

    #[test]
    fn test_session_args_override_config() {
        let args = SessionArgs {
            frames: PathBuf::from("frames.json"),
            interval_ms: Some(0),
            required: Some(3),
        };
        let config = args.apply(SessionConfig::default());
        assert_eq!(config.poll_interval_ms, 1);
        assert_eq!(config.required_matches, 3);
    }

    #[test]
    fn test_cli_parses_replay() {
        let cli = Cli::try_parse_from([
            "clockface", "replay", "--frames", "f.json", "--roster", "r.json", "--required", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay { session, roster, db } => {
                assert_eq!(session.required, Some(2));
                assert_eq!(roster, Some(PathBuf::from("r.json")));
                assert!(db.is_none());
            }
            _ => panic!("expected replay"),
        }
    }
}
