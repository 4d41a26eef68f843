//! Roundkeep - round lifecycle and scoring CLI
//!
//! The `roundkeep` command manages the rounds of multi-round events stored
//! in a local JSON state file.
//!
//! ## Commands
//!
//! - `event`: Register an event
//! - `show`: List an event's rounds with their lifecycle state
//! - `create` / `edit` / `delete` / `move`: Manage rounds
//! - `criteria`: Replace a round's scoring rubric
//! - `score`: Record a team's per-criterion points
//! - `freeze` / `evaluate` / `shortlist`: Advance a round's lifecycle
//! - `weight`: Set a round's share of the event standings
//! - `leaderboard` / `stats`: Read a round's results
//! - `standings`: Weighted leaderboard across an event's evaluated rounds

mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, Level};

use roundkeep_core::lifecycle;
use roundkeep_core::{
    Criterion, Direction, Event, EventId, OptionalField, Role, RoundCreateFields,
    RoundEditableFields, RoundError, RoundId, RoundMode, RoundService, RoundStatus, RoundType,
    ScoreSubmission, ShortlistRule,
};

#[derive(Parser)]
#[command(name = "roundkeep")]
#[command(author = "Roundkeep Maintainers")]
#[command(version = roundkeep_core::VERSION)]
#[command(about = "Round lifecycle and scoring for multi-round events", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Role of the acting user
    #[arg(long, global = true, env = "ROUNDKEEP_ROLE", default_value = "participant")]
    role: Role,

    /// State file holding all events, rounds and scores
    #[arg(
        long,
        global = true,
        env = "ROUNDKEEP_STATE",
        default_value = ".roundkeep/state.json"
    )]
    state: PathBuf,

    /// Engine config (TOML)
    #[arg(long, global = true, env = "ROUNDKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new event
    Event {
        /// Event id
        #[arg(long)]
        id: String,

        /// Short public code
        #[arg(long)]
        code: String,

        /// Display name
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List an event's rounds in order
    Show {
        #[arg(long)]
        event: String,
    },

    /// Append a round to an event
    Create {
        #[arg(long)]
        event: String,

        #[arg(long)]
        name: String,

        /// title or rolling
        #[arg(long = "type", value_parser = parse_keyword::<RoundType>, default_value = "title")]
        round_type: RoundType,

        /// online or offline
        #[arg(long, value_parser = parse_keyword::<RoundMode>, default_value = "offline")]
        mode: RoundMode,

        #[arg(long)]
        club: Option<String>,

        /// Rubric as "Name:max,Name:max"
        #[arg(long)]
        criteria: Option<String>,
    },

    /// Edit a round's descriptive fields
    Edit {
        #[arg(long)]
        event: String,

        /// Round number within the event
        #[arg(long)]
        number: u32,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type", value_parser = parse_keyword::<RoundType>)]
        round_type: Option<RoundType>,

        #[arg(long, value_parser = parse_keyword::<RoundMode>)]
        mode: Option<RoundMode>,

        #[arg(long)]
        club: Option<String>,

        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        venue: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        extended_description: Option<String>,

        #[arg(long)]
        form_link: Option<String>,

        #[arg(long)]
        contact: Option<String>,

        /// upcoming, in_progress or completed
        #[arg(long, value_parser = parse_keyword::<RoundStatus>)]
        status: Option<RoundStatus>,

        /// Reset an optional field (club, date, venue, description,
        /// extended_description, form_link, contact); repeatable
        #[arg(long, value_parser = parse_keyword::<OptionalField>)]
        clear: Vec<OptionalField>,
    },

    /// Delete a round and all of its scores
    Delete {
        #[arg(long)]
        event: String,

        #[arg(long)]
        number: u32,
    },

    /// Swap a round with its neighbour
    Move {
        #[arg(long)]
        event: String,

        #[arg(long)]
        round: String,

        /// up or down
        #[arg(long)]
        direction: Direction,
    },

    /// Replace a round's rubric
    Criteria {
        #[arg(long)]
        round: String,

        /// Rubric as "Name:max,Name:max"
        #[arg(long)]
        set: String,
    },

    /// Record one team's points for a round
    Score {
        #[arg(long)]
        round: String,

        #[arg(long)]
        team: String,

        /// Points as "Name:points,Name:points"
        #[arg(long)]
        points: String,

        /// Attendance flag, shown instead of the normalized flag
        #[arg(long)]
        present: Option<bool>,
    },

    /// Lock a round against edits and capture its stats
    Freeze {
        #[arg(long)]
        round: String,
    },

    /// Finalize a frozen round without shortlisting
    Evaluate {
        #[arg(long)]
        round: String,
    },

    /// Select advancing teams of a frozen round and finalize it
    Shortlist {
        #[arg(long)]
        round: String,

        /// Keep the k best teams
        #[arg(long, conflicts_with = "threshold", required_unless_present = "threshold")]
        top: Option<usize>,

        /// Keep teams scoring at least this much
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Set a round's weight in the event standings, in percent (25-200)
    Weight {
        #[arg(long)]
        round: String,

        #[arg(long)]
        percent: f64,
    },

    /// Rank a round's teams
    Leaderboard {
        #[arg(long)]
        round: String,
    },

    /// Show a round's score statistics
    Stats {
        #[arg(long)]
        round: String,
    },

    /// Weighted standings over an event's evaluated rounds
    Standings {
        #[arg(long)]
        event: String,
    },
}

impl Commands {
    fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Commands::Show { .. }
                | Commands::Leaderboard { .. }
                | Commands::Stats { .. }
                | Commands::Standings { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    roundkeep_core::telemetry::init_tracing(cli.json, level);

    let config = state::load_config(cli.config.as_deref())?;
    let store = Arc::new(state::load_store(&cli.state).await?);
    let service = RoundService::new(store.clone(), config).context("Invalid engine config")?;

    let mutation = cli.command.is_mutation();
    let result = run(&service, &cli.role, cli.format, cli.command).await;
    if let Err(err) = &result {
        if cli.format == OutputFormat::Json {
            print_error_json(err)?;
        }
    }
    result?;

    if mutation {
        state::save_store(&cli.state, &store).await?;
        info!("state written to {:?}", cli.state);
    }
    roundkeep_core::metrics::METRICS.flush();
    Ok(())
}

async fn run(
    service: &RoundService,
    role: &Role,
    format: OutputFormat,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Event {
            id,
            code,
            name,
            description,
        } => {
            let mut event = Event::new(id, code, name);
            if let Some(description) = description {
                event = event.with_description(description);
            }
            let event = service.create_event(role, event).await?;
            emit(format, &event, || format!("Created event {}", event.event_id))
        }

        Commands::Show { event } => cmd_show(service, &EventId::from(event), format).await,

        Commands::Create {
            event,
            name,
            round_type,
            mode,
            club,
            criteria,
        } => {
            let mut fields = RoundCreateFields::new(name, round_type, mode);
            if let Some(club) = club {
                fields = fields.with_club(club);
            }
            if let Some(spec) = criteria {
                fields = fields.with_criteria(parse_criteria(&spec)?);
            }
            let round = service
                .create_round(role, &EventId::from(event), fields)
                .await?;
            emit(format, &round, || {
                format!("Created round #{} {} ({})", round.round_number(), round.name, round.id)
            })
        }

        Commands::Edit {
            event,
            number,
            name,
            round_type,
            mode,
            club,
            date,
            venue,
            description,
            extended_description,
            form_link,
            contact,
            status,
            clear,
        } => {
            let fields = RoundEditableFields {
                name,
                round_type,
                mode,
                club,
                date,
                venue,
                description,
                extended_description,
                form_link,
                contact,
                status,
                clear,
            };
            let round = service
                .update_round(role, &EventId::from(event), number, fields)
                .await?;
            emit(format, &round, || format!("Updated round #{}", round.round_number()))
        }

        Commands::Delete { event, number } => {
            let removed = service
                .delete_round(role, &EventId::from(event), number)
                .await?;
            emit(
                format,
                &serde_json::json!({ "round_number": number, "scores_removed": removed }),
                || format!("Deleted round #{number} and {removed} score(s)"),
            )
        }

        Commands::Move {
            event,
            round,
            direction,
        } => {
            let event = service
                .move_round(role, &EventId::from(event), &RoundId::from(round), direction)
                .await?;
            emit(format, &event, || render_rounds(&event))
        }

        Commands::Criteria { round, set } => {
            let round = service
                .update_criteria(role, &RoundId::from(round), parse_criteria(&set)?)
                .await?;
            emit(format, &round, || {
                format!("Round {} now has {} criteria", round.id, round.criteria().len())
            })
        }

        Commands::Score {
            round,
            team,
            points,
            present,
        } => {
            let mut submission = ScoreSubmission::new(team);
            for (name, value) in parse_pairs(&points)? {
                submission = submission.with_points(name, value);
            }
            if let Some(present) = present {
                submission = submission.with_presence(present);
            }
            let receipt = service
                .record_score(role, &RoundId::from(round), submission)
                .await?;
            emit(format, &receipt, || {
                let mut out = format!(
                    "Recorded {} for team {} (raw {})",
                    receipt.score.score, receipt.score.team_id, receipt.score.raw_total_score
                );
                for warning in &receipt.warnings {
                    out.push_str(&format!("\n  warning: {warning}"));
                }
                out
            })
        }

        Commands::Freeze { round } => {
            let round = service.freeze_round(role, &RoundId::from(round)).await?;
            emit(format, &round, || format!("Round {} is now Frozen", round.id))
        }

        Commands::Evaluate { round } => {
            let round = service.evaluate_round(role, &RoundId::from(round)).await?;
            emit(format, &round, || format!("Round {} is now Evaluated", round.id))
        }

        Commands::Shortlist {
            round,
            top,
            threshold,
        } => {
            let rule = match (top, threshold) {
                (Some(k), _) => ShortlistRule::TopK(k),
                (None, Some(t)) => ShortlistRule::Threshold(t),
                (None, None) => bail!("either --top or --threshold is required"),
            };
            let outcome = service.shortlist(role, &RoundId::from(round), rule).await?;
            emit(format, &outcome, || {
                let names: Vec<&str> = outcome.shortlisted.iter().map(|t| t.as_str()).collect();
                format!(
                    "Shortlisted {} team(s): {}\nEliminated {}",
                    outcome.shortlisted.len(),
                    names.join(", "),
                    outcome.eliminated.len()
                )
            })
        }

        Commands::Weight { round, percent } => {
            let round = service
                .set_round_weight(role, &RoundId::from(round), percent)
                .await?;
            emit(format, &round, || {
                format!("Round {} now weighs {}%", round.id, round.weight_percentage())
            })
        }

        Commands::Leaderboard { round } => {
            let views = service.score_views(&RoundId::from(round)).await?;
            emit(format, &views, || {
                if views.is_empty() {
                    return "No scores recorded".to_string();
                }
                views
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        format!(
                            "{:>3}. {:<20} {:>7.2}  raw {:>6.2}/{:<6.2} {}: {}",
                            i + 1,
                            v.score.team_id.as_str(),
                            v.score.score,
                            v.score.raw_total_score,
                            v.max_possible,
                            v.label.label.to_string(),
                            v.label.value
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }

        Commands::Stats { round } => {
            let stats = service.round_stats(&RoundId::from(round)).await?;
            emit(format, &stats, || {
                format!(
                    "participated {}  max {:.2}  min {:.2}  avg {:.2}",
                    stats.participated_count, stats.max_score, stats.min_score, stats.avg_score
                )
            })
        }

        Commands::Standings { event } => {
            let rows = service.event_leaderboard(&EventId::from(event)).await?;
            emit(format, &rows, || {
                if rows.is_empty() {
                    return "No evaluated rounds".to_string();
                }
                rows.iter()
                    .map(|r| {
                        format!(
                            "{:>3}. {:<20} {:>7.2}  avg {:>7.2}  rounds {}",
                            r.rank,
                            r.team_id.as_str(),
                            r.final_score,
                            r.weighted_average,
                            r.rounds_scored
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

async fn cmd_show(service: &RoundService, event_id: &EventId, format: OutputFormat) -> Result<()> {
    let event = service
        .event(event_id)
        .await
        .with_context(|| format!("Failed to load event '{}'", event_id))?;
    emit(format, &event, || render_rounds(&event))
}

fn render_rounds(event: &Event) -> String {
    if event.is_empty() {
        return format!("{} has no rounds", event.name);
    }
    let mut out = format!("{} ({})", event.name, event.event_code);
    for round in event.rounds() {
        out.push_str(&format!(
            "\n  #{} {:<24} {:<9} {}",
            round.round_number(),
            round.name,
            lifecycle::status_label(round).to_string(),
            round.id
        ));
    }
    out
}

/// Print `value` as JSON or as the rendered text.
fn emit<T, F>(format: OutputFormat, value: &T, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn print_error_json(err: &anyhow::Error) -> Result<()> {
    let body = match err.downcast_ref::<RoundError>() {
        Some(round_err) => serde_json::json!({
            "error": round_err.kind(),
            "message": round_err.to_string(),
            "retryable": round_err.is_retryable(),
        }),
        None => serde_json::json!({
            "error": "cli",
            "message": format!("{err:#}"),
            "retryable": false,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Parse a snake_case keyword into one of the core's serde enums.
/// Dashes are accepted in place of underscores.
fn parse_keyword<T: DeserializeOwned>(s: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(
        s.to_ascii_lowercase().replace('-', "_"),
    ))
        .map_err(|_| format!("unknown value '{s}'"))
}

/// Parse `"Name:value,Name:value"`. Values must be finite numbers.
fn parse_pairs(spec: &str) -> Result<Vec<(String, f64)>> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, value) = part
                .rsplit_once(':')
                .with_context(|| format!("expected Name:value, got '{part}'"))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid number in '{part}'"))?;
            if !value.is_finite() {
                bail!("non-finite number in '{part}'");
            }
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

fn parse_criteria(spec: &str) -> Result<Vec<Criterion>> {
    Ok(parse_pairs(spec)?
        .into_iter()
        .map(|(name, max)| Criterion::new(name, max))
        .collect())
}
