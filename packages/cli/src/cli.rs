//! Command-line interface.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use console::style;
use vigenza_engine::classifier::classify_or_unknown;
use vigenza_engine::config::parse_date;
use vigenza_engine::{
    parse_destination, Batch, Confidence, EngineConfig, NormId, NormStatus, VigenzaService,
};

use crate::error::Result;

/// Vigenza - point-in-time status of amended Italian legal norms.
#[derive(Parser)]
#[command(name = "vigenza")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the status of a norm at a date.
    Status {
        /// Batch file with acts and amendment clauses (YAML, or JSON by extension)
        batch: PathBuf,

        /// Norm identifier (e.g., legge:1991;14~art2bis-com2)
        norm: String,

        /// Query date in YYYY-MM-DD format (default: today)
        #[arg(short, long)]
        date: Option<String>,

        /// Print the report as JSON
        #[arg(long, conflicts_with = "explain")]
        json: bool,

        /// Print the derivation tree
        #[arg(long)]
        explain: bool,
    },

    /// List the anomalies of a batch.
    Anomalies {
        /// Batch file with acts and amendment clauses
        batch: PathBuf,

        /// Sweep statuses at this date instead of the latest known date
        #[arg(short, long)]
        date: Option<String>,

        /// Print the anomalies as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and classify a single amendment clause.
    Parse {
        /// Clause text, e.g. "il comma 2 dell'articolo 2-bis è abrogato"
        text: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status {
            batch,
            norm,
            date,
            json,
            explain,
        } => status_command(&batch, &norm, date.as_deref(), json, explain),
        Commands::Anomalies { batch, date, json } => {
            anomalies_command(&batch, date.as_deref(), json)
        }
        Commands::Parse { text, json } => parse_command(&text, json),
    }
}

/// Load a batch file into a fresh in-memory service.
fn load_service(path: &Path, quiet: bool) -> Result<VigenzaService> {
    let batch = Batch::from_file(path)?;
    let service = VigenzaService::with_config(EngineConfig::from_env());
    let report = service.ingest_batch(&batch);

    if !quiet {
        eprintln!(
            "{} {} acts, {} norms, {} clauses -> {} edges",
            style("Loaded").dim(),
            report.acts,
            report.norms,
            report.clauses,
            report.edges
        );
        if report.rejected > 0 {
            eprintln!(
                "{} {} entries rejected (see `vigenza anomalies`)",
                style("Warning:").yellow().bold(),
                report.rejected
            );
        }
    }
    Ok(service)
}

fn query_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(text) => Ok(parse_date(text)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn styled_status(status: NormStatus) -> String {
    let text = status.as_str();
    match status {
        NormStatus::InForce => style(text).green().bold().to_string(),
        NormStatus::Repealed => style(text).red().bold().to_string(),
        NormStatus::Superseded => style(text).yellow().bold().to_string(),
        NormStatus::NotYetInForce | NormStatus::Unknown => style(text).dim().to_string(),
    }
}

/// Execute the status command.
fn status_command(
    batch: &Path,
    norm: &str,
    date: Option<&str>,
    json: bool,
    explain: bool,
) -> Result<()> {
    // Validate inputs before loading the batch
    let as_of = query_date(date)?;
    let norm_id: NormId = norm.parse()?;

    let service = load_service(batch, json)?;
    let report = service.get_status(&norm_id, as_of)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if explain {
        println!("{}", report.explain());
        return Ok(());
    }

    println!(
        "{} on {}: {}",
        style(&report.norm_id).cyan(),
        style(as_of).green(),
        styled_status(report.status)
    );
    if report.confidence == Confidence::Degraded {
        println!(
            "  {} derived from unclassified amendments",
            style("Degraded:").yellow().bold()
        );
    }
    if let Some(active) = &report.active_text {
        println!("  Active text: {active}");
    }
    println!("  Amendments: {}", report.contributing.len());
    for anomaly in &report.anomalies {
        println!("  {} {anomaly}", style("Anomaly").yellow());
    }
    Ok(())
}

/// Execute the anomalies command.
fn anomalies_command(batch: &Path, date: Option<&str>, json: bool) -> Result<()> {
    let as_of = date.map(parse_date).transpose()?;
    let service = load_service(batch, json)?;

    let anomalies = match as_of {
        Some(as_of) => service.list_anomalies_at(as_of),
        None => service.list_anomalies(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&anomalies)?);
        return Ok(());
    }

    if anomalies.is_empty() {
        println!("{}", style("No anomalies").green());
        return Ok(());
    }
    println!("{} {}", style("Anomalies:").bold(), anomalies.len());
    for anomaly in &anomalies {
        println!("  {anomaly}");
    }
    Ok(())
}

/// Execute the parse command.
fn parse_command(text: &str, json: bool) -> Result<()> {
    let destination = parse_destination(text)?;
    let kind = classify_or_unknown(text);

    if json {
        let value = serde_json::json!({
            "kind": kind,
            "granularity": destination.granularity(),
            "destination": destination,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", style("Destination:").bold(), style(&destination).cyan());
    if let Some(act) = &destination.act {
        println!("  Act: {act}");
    }
    println!("  Granularity: {}", destination.granularity().as_str());
    println!("  Kind: {}", kind.as_str());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["vigenza", "status", "batch.yaml", "legge:1991;14~art2"]);

        let Commands::Status {
            batch,
            norm,
            date,
            json,
            explain,
        } = cli.command
        else {
            unreachable!("expected status command");
        };
        assert_eq!(batch, PathBuf::from("batch.yaml"));
        assert_eq!(norm, "legge:1991;14~art2");
        assert!(date.is_none());
        assert!(!json);
        assert!(!explain);
    }

    #[test]
    fn test_cli_parse_status_with_date_and_explain() {
        let cli = Cli::parse_from([
            "vigenza",
            "status",
            "batch.yaml",
            "legge:1991;14~art2",
            "--date",
            "2021-06-01",
            "--explain",
        ]);

        let Commands::Status { date, explain, .. } = cli.command else {
            unreachable!("expected status command");
        };
        assert_eq!(date, Some("2021-06-01".to_string()));
        assert!(explain);
    }

    #[test]
    fn test_cli_json_conflicts_with_explain() {
        let result = Cli::try_parse_from([
            "vigenza",
            "status",
            "batch.yaml",
            "legge:1991;14~art2",
            "--json",
            "--explain",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_anomalies() {
        let cli = Cli::parse_from(["vigenza", "anomalies", "batch.json", "--json"]);

        let Commands::Anomalies { batch, date, json } = cli.command else {
            unreachable!("expected anomalies command");
        };
        assert_eq!(batch, PathBuf::from("batch.json"));
        assert!(date.is_none());
        assert!(json);
    }

    #[test]
    fn test_query_date() {
        assert_eq!(
            query_date(Some("2021-06-01")).unwrap(),
            NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
        );
        assert!(query_date(Some("01/06/2021")).is_err());
        assert!(query_date(None).is_ok());
    }
}
