use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use calple::clock::{FixedClock, SystemClock};
use calple::config::CalpleConfig;
use calple::models::{parse_date_key, DataOwner, DayDetails, DayEntry};
use calple::storage::Vault;
use calple::tracker::Tracker;

#[derive(Debug, Parser)]
#[command(name = "calple", version, about = "Private cycle tracking for couples")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the vault (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Compute as if today were this date (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date_key)]
    pub today: Option<NaiveDate>,

    /// Vault passphrase
    #[arg(long, global = true, env = "CALPLE_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new, empty vault
    Init,
    /// Log a day, replacing anything logged for it before
    Log(LogArgs),
    /// Update symptoms, mood and notes of a day, keeping its period flag
    Note(NoteArgs),
    /// Mark a day as a period day, or unmark it
    Toggle { date: String },
    /// Delete everything logged for a day
    Remove { date: String },
    /// List logged days
    Days,
    /// Show cycle settings, or change them
    Settings {
        #[arg(long)]
        cycle_length: Option<u32>,
        #[arg(long)]
        period_length: Option<u32>,
    },
    /// Predictions and insights for today
    Status {
        /// Use the imported partner data
        #[arg(long)]
        partner: bool,
    },
    /// Write own data for the partner to import
    Share {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import data shared by the partner
    ImportPartner { file: PathBuf },
    /// Dump the decrypted vault as JSON
    Export,
    /// Permanently delete the vault
    Wipe {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct DetailArgs {
    #[arg(long = "symptom")]
    symptoms: Vec<String>,
    #[arg(long)]
    mood: Vec<String>,
    #[arg(long = "activity")]
    activities: Vec<String>,
    #[arg(long)]
    sex_activity: Vec<String>,
    /// Cramp intensity, 0-10
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=10))]
    cramps: u8,
    #[arg(long, default_value = "")]
    notes: String,
}

impl From<DetailArgs> for DayDetails {
    fn from(args: DetailArgs) -> Self {
        DayDetails {
            symptoms: args.symptoms.into_iter().collect(),
            cramp_intensity: args.cramps,
            mood: args.mood.into_iter().collect(),
            activities: args.activities.into_iter().collect(),
            sex_activity: args.sex_activity.into_iter().collect(),
            notes: args.notes,
        }
    }
}

#[derive(Debug, Args)]
pub struct LogArgs {
    date: String,
    /// Log the day without marking it as a period day
    #[arg(long)]
    no_period: bool,
    #[command(flatten)]
    details: DetailArgs,
}

#[derive(Debug, Args)]
pub struct NoteArgs {
    date: String,
    #[command(flatten)]
    details: DetailArgs,
}

pub fn run(cli: Cli, config: &CalpleConfig) -> anyhow::Result<()> {
    let Cli {
        command,
        data_dir,
        today,
        passphrase,
        ..
    } = cli;

    let data_dir = match data_dir {
        Some(dir) => dir,
        None => config.data_dir()?,
    };
    let vault = Vault::in_dir(&data_dir);
    let tracker = match today {
        Some(date) => Tracker::new(vault, FixedClock(date)),
        None => Tracker::new(vault, SystemClock),
    };

    match command {
        Command::Init => {
            tracker.setup(require_passphrase(passphrase.as_deref())?)?;
            print_json(&serde_json::json!({ "dataDir": data_dir }))
        }
        Command::Wipe { yes } => {
            if !yes {
                bail!("refusing to wipe the vault without --yes");
            }
            tracker.wipe_all_data()?;
            print_json(&serde_json::json!({ "wiped": true }))
        }
        command => {
            if !tracker.unlock(require_passphrase(passphrase.as_deref())?)? {
                bail!("wrong passphrase");
            }
            let result = dispatch(command, &tracker);
            tracker.lock();
            result
        }
    }
}

fn dispatch(command: Command, tracker: &Tracker) -> anyhow::Result<()> {
    match command {
        Command::Log(args) => {
            let entry = DayEntry {
                is_period: !args.no_period,
                details: args.details.into(),
            };
            print_json(&tracker.log_day(&args.date, entry)?)
        }
        Command::Note(args) => print_json(&tracker.update_details(&args.date, args.details.into())?),
        Command::Toggle { date } => {
            let toggled = tracker.toggle_period_day(&date)?;
            print_json(&serde_json::json!({ "date": date, "result": format!("{toggled:?}") }))
        }
        Command::Remove { date } => print_json(&tracker.remove_day(&date)?),
        Command::Days => print_json(&tracker.list_days()?),
        Command::Settings {
            cycle_length,
            period_length,
        } => {
            let current = tracker.settings()?;
            if cycle_length.is_none() && period_length.is_none() {
                return print_json(&current);
            }
            print_json(&tracker.update_settings(
                cycle_length.unwrap_or(current.cycle_length),
                period_length.unwrap_or(current.period_length),
            )?)
        }
        Command::Status { partner } => {
            let owner = if partner {
                DataOwner::Partner
            } else {
                DataOwner::Own
            };
            print_json(&tracker.report(owner)?)
        }
        Command::Share { output } => {
            let json = serde_json::to_string_pretty(&tracker.share()?)?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display())),
                None => {
                    println!("{json}");
                    Ok(())
                }
            }
        }
        Command::ImportPartner { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            tracker.import_partner(&json)?;
            print_json(&tracker.snapshot(DataOwner::Partner)?)
        }
        Command::Export => {
            println!("{}", tracker.export_data()?);
            Ok(())
        }
        Command::Init | Command::Wipe { .. } => bail!("init and wipe run without unlocking"),
    }
}

fn require_passphrase(passphrase: Option<&str>) -> anyhow::Result<&str> {
    passphrase
        .filter(|p| !p.is_empty())
        .context("no passphrase given, pass --passphrase or set CALPLE_PASSPHRASE")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn log_collects_repeated_tags() {
        let cli = Cli::parse_from([
            "calple",
            "log",
            "2024-01-01",
            "--symptom",
            "cramps",
            "--symptom",
            "fatigue",
            "--cramps",
            "6",
            "--today",
            "2024-01-02",
        ]);
        assert_eq!(cli.today, Some(parse_date_key("2024-01-02").unwrap()));
        let Command::Log(args) = cli.command else {
            panic!("expected log command");
        };
        assert!(!args.no_period);
        let details = DayDetails::from(args.details);
        assert_eq!(details.symptoms.len(), 2);
        assert_eq!(details.cramp_intensity, 6);
    }

    #[test]
    fn cramps_above_ten_are_rejected() {
        assert!(Cli::try_parse_from(["calple", "log", "2024-01-01", "--cramps", "11"]).is_err());
    }

    #[test]
    fn bad_today_is_rejected() {
        assert!(Cli::try_parse_from(["calple", "days", "--today", "tomorrow"]).is_err());
    }
}
