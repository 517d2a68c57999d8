//! # Tessera CLI Module
//!
//! This module implements the CLI interface for Tessera.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Count registered objects per type
//! - `object` - Show, tag, date, correlate or delete one entity
//! - `timeline` - Append to or read an attribute timeline
//! - `basket` - Manage an actor's export basket
//! - `export` - Preview or submit an event built from explicit objects
//! - `investigation` - Create, fill and export investigations
//! - `misp` - Check the configured MISP instance

mod commands;

use crate::config::{Settings, StoreBackend};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tessera_core::{EventRequest, RawCode, TesseraError};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tessera - threat-intel object, timeline and correlation engine
///
/// Tracks observables (accounts, usernames, chat channels, domains, CVEs),
/// their history and their correlations, and exports them as MISP events.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the settings file
    #[arg(short, long, global = true, default_value = "tessera.toml")]
    pub config: PathBuf,

    /// Override the store path from the settings file
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Override the store backend: "redb" or "memory"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Count registered objects per type
    Status,

    /// Operate on one entity
    #[command(subcommand)]
    Object(ObjectCommand),

    /// Append to or read an attribute timeline
    #[command(subcommand)]
    Timeline(TimelineCommand),

    /// Manage an actor's export basket
    #[command(subcommand)]
    Basket(BasketCommand),

    /// Build an event from explicit objects
    Export {
        /// Global ids (`type:subtype:id`)
        #[arg(required = true)]
        gids: Vec<String>,

        /// Submit to the configured MISP instance instead of previewing
        #[arg(long)]
        submit: bool,

        #[command(flatten)]
        event: EventArgs,
    },

    /// Manage investigations
    #[command(subcommand)]
    Investigation(InvestigationCommand),

    /// Check the configured MISP instance
    #[command(subcommand)]
    Misp(MispCommand),
}

#[derive(Subcommand, Debug)]
pub enum ObjectCommand {
    /// Print the meta summary of an entity
    Show {
        gid: String,

        /// Comma-separated meta options (tags,link,username,...)
        #[arg(short, long)]
        options: Option<String>,
    },

    /// Add a tag
    Tag { gid: String, tag: String },

    /// Remove a tag
    Untag { gid: String, tag: String },

    /// Widen the first/last seen range with an epoch timestamp
    Seen { gid: String, timestamp: i64 },

    /// Correlate two entities
    Correlate { gid: String, other: String },

    /// List correlations grouped by type
    Correlations { gid: String },

    /// Delete an entity (neighbors keep their edges)
    Delete { gid: String },
}

#[derive(Subcommand, Debug)]
pub enum TimelineCommand {
    /// Record `value` for `attribute` at `timestamp`
    Add {
        gid: String,
        attribute: String,
        timestamp: i64,
        value: String,
    },

    /// Print the full history, oldest first
    Show { gid: String, attribute: String },
}

#[derive(Subcommand, Debug)]
pub enum BasketCommand {
    /// List staged entities
    List { actor: String },

    /// Stage an entity
    Add {
        actor: String,
        #[arg(value_name = "TYPE")]
        obj_type: String,
        id: String,

        #[arg(short, long)]
        subtype: Option<String>,

        /// Correlation depth (0-3)
        #[arg(short, long)]
        lvl: Option<String>,
    },

    /// Unstage an entity
    Remove {
        actor: String,
        #[arg(value_name = "TYPE")]
        obj_type: String,
        id: String,

        #[arg(short, long)]
        subtype: Option<String>,
    },

    /// Empty the basket
    Clear { actor: String },

    /// Build an event from the basket
    Export {
        actor: String,

        /// Submit to the configured MISP instance instead of previewing
        #[arg(long)]
        submit: bool,

        #[command(flatten)]
        event: EventArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum InvestigationCommand {
    /// Open a new investigation
    Create {
        #[arg(short, long)]
        info: String,

        /// Event date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        threat_level: Option<i64>,

        #[arg(long)]
        analysis: Option<i64>,

        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Declare an object part of an investigation
    AddObject { uuid: String, gid: String },

    /// Remove a declared object
    RemoveObject { uuid: String, gid: String },

    /// Print an investigation
    Show { uuid: String },

    /// Submit an investigation to the configured MISP instance
    Export { uuid: String },
}

#[derive(Subcommand, Debug)]
pub enum MispCommand {
    /// Print the instance version
    Ping,

    /// Print the instance uuid
    Uuid,
}

/// Event fields shared by the export commands.
///
/// Codes are taken as text; anything that is not an integer in range falls
/// back to the default.
#[derive(Args, Debug, Default)]
pub struct EventArgs {
    /// Event info line
    #[arg(long)]
    pub info: Option<String>,

    /// Event tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Sharing scope (0-3)
    #[arg(long)]
    pub distribution: Option<String>,

    /// Threat level (1-4)
    #[arg(long)]
    pub threat_level: Option<String>,

    /// Analysis state (0-2)
    #[arg(long)]
    pub analysis: Option<String>,

    /// Publish on submission
    #[arg(long)]
    pub publish: bool,

    /// Reuse this event uuid
    #[arg(long)]
    pub event_uuid: Option<String>,

    /// Event date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// A code typed on the command line: integers stay integers.
fn cli_code(raw: Option<String>, default: RawCode) -> RawCode {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_or(RawCode::Text(raw), RawCode::Int),
        None => default,
    }
}

impl EventArgs {
    pub fn into_request(self) -> EventRequest {
        let defaults = EventRequest::default();
        EventRequest {
            event_uuid: self.event_uuid,
            date: self.date,
            publish: self.publish,
            info: self.info,
            tags: self.tags,
            analysis: cli_code(self.analysis, defaults.analysis),
            distribution: cli_code(self.distribution, defaults.distribution),
            threat_level: cli_code(self.threat_level, defaults.threat_level),
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Load settings and apply the command-line store overrides.
fn load_settings(cli: &Cli) -> Result<Settings, TesseraError> {
    let mut settings = Settings::load(Some(cli.config.as_path()))?;
    if let Some(path) = &cli.database {
        settings.store.path = path.clone();
    }
    match cli.backend.as_deref() {
        Some("redb") => settings.store.backend = StoreBackend::Redb,
        Some("memory") => settings.store.backend = StoreBackend::Memory,
        Some(other) => {
            return Err(TesseraError::Config(format!("Unknown backend: {}", other)));
        }
        None => {}
    }
    if cli.verbose {
        tracing::info!(
            store = %settings.store.path.display(),
            backend = ?settings.store.backend,
            misp = settings.misp.is_configured(),
            "settings loaded"
        );
    }
    Ok(settings)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TesseraError> {
    let settings = load_settings(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&settings, &host, port).await,
        Some(Commands::Status) | None => cmd_status(&settings, json_mode),
        Some(Commands::Object(command)) => cmd_object(&settings, command, json_mode),
        Some(Commands::Timeline(command)) => cmd_timeline(&settings, command, json_mode),
        Some(Commands::Basket(BasketCommand::Export {
            actor,
            submit,
            event,
        })) => {
            cmd_export(
                &settings,
                ExportSource::Basket(actor),
                event.into_request(),
                submit,
                json_mode,
            )
            .await
        }
        Some(Commands::Basket(command)) => cmd_basket(&settings, command, json_mode),
        Some(Commands::Export {
            gids,
            submit,
            event,
        }) => {
            cmd_export(
                &settings,
                ExportSource::Objects(gids),
                event.into_request(),
                submit,
                json_mode,
            )
            .await
        }
        Some(Commands::Investigation(command)) => {
            cmd_investigation(&settings, command, json_mode).await
        }
        Some(Commands::Misp(command)) => cmd_misp(&settings, command, json_mode).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_codes_stay_integers() {
        assert_eq!(cli_code(Some("2".to_string()), RawCode::Int(0)), RawCode::Int(2));
        assert_eq!(
            cli_code(Some("high".to_string()), RawCode::Int(0)),
            RawCode::Text("high".to_string())
        );
        assert_eq!(cli_code(None, RawCode::Int(4)), RawCode::Int(4));
    }

    #[test]
    fn export_command_parses() {
        let cli = Cli::try_parse_from([
            "tessera",
            "export",
            "cve::CVE-2015-0410",
            "--tag",
            "tlp:green",
            "--threat-level",
            "2",
        ])
        .expect("parse");
        let Some(Commands::Export { gids, submit, event }) = cli.command else {
            unreachable!("export subcommand expected");
        };
        assert_eq!(gids, vec!["cve::CVE-2015-0410".to_string()]);
        assert!(!submit);
        let request = event.into_request();
        assert_eq!(request.threat_level, RawCode::Int(2));
        assert_eq!(request.tags, vec!["tlp:green".to_string()]);
    }
}
