//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::api::HazardLayer;
use crate::models::RiskLevel;
use crate::support::{RequestStatus, ResourceType, Urgency};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CRAM - Climate Resilience Action Matrix
///
/// Barangay Resilience Readiness Scores, hazard layers, weather and
/// mutual-aid requests for Negros Oriental, from the terminal.
///
/// Examples:
///   cram dashboard
///   cram barangays --risk high --municipality "Dumaguete City"
///   cram barangay 42 --ai
///   cram municipality 3
///   cram air-quality --ai
///   cram glossary storm-surge
///   cram report --barangay 42 -o looc.md
///   cram watch --weather
///   cram support create --barangay 42 --resource water --quantity "200 L" ...
///   cram init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Backend API base URL
    ///
    /// Default: from config or http://127.0.0.1:8000/api
    #[arg(long, global = true, value_name = "URL", env = "CRAM_API_URL")]
    pub api_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cram.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// OpenWeatherMap API key
    #[arg(
        long,
        global = true,
        value_name = "KEY",
        env = "CRAM_WEATHER_API_KEY",
        hide_env_values = true
    )]
    pub weather_api_key: Option<String>,

    /// Support-request storage file
    #[arg(long, global = true, value_name = "FILE", env = "CRAM_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Regional overview: statistics, risk distribution, top risk, air quality
    Dashboard {
        /// Skip the AI air quality narrative
        #[arg(long)]
        no_ai: bool,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// List every barangay with its score and risk level
    Barangays {
        /// Only this risk level
        #[arg(long, value_name = "LEVEL")]
        risk: Option<RiskArg>,

        /// Only this municipality (case-insensitive)
        #[arg(long, value_name = "NAME")]
        municipality: Option<String>,

        /// Only coastal barangays
        #[arg(long)]
        coastal: bool,

        /// Sort by score, highest first, and keep this many
        #[arg(long, value_name = "COUNT")]
        top: Option<usize>,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Detail for one barangay
    Barangay {
        /// Barangay id
        id: i64,

        /// Also fetch the AI resilience analysis
        #[arg(long)]
        ai: bool,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// List municipalities
    Municipalities {
        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Profile and AI strategic report for one municipality
    Municipality {
        /// Municipality id
        id: i64,

        /// Skip the AI report
        #[arg(long)]
        no_ai: bool,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Latest air quality for every municipality
    AirQuality {
        /// Also fetch the AI air quality analysis
        #[arg(long)]
        ai: bool,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Features of one hazard layer
    Hazards {
        layer: HazardArg,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Tropical cyclone tracks that affected the province
    Cyclones {
        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Risk alerts raised from barangay scores
    Alerts {
        /// Alert ids to hide (e.g. critical-12)
        #[arg(long, value_name = "ID", value_delimiter = ',')]
        dismiss: Vec<String>,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Write a barangay or dashboard report to a file
    Report {
        /// Report on this barangay; the regional dashboard otherwise
        #[arg(long, value_name = "ID")]
        barangay: Option<i64>,

        /// Output file path for the report
        #[arg(short, long, default_value = "cram_report.md", value_name = "FILE")]
        output: PathBuf,

        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: ReportFormat,

        /// Skip the AI narrative
        #[arg(long)]
        no_ai: bool,
    },

    /// Current conditions, daily forecast and alerts
    Weather {
        /// Forecast days to show (1-5)
        #[arg(long, default_value = "5", value_name = "DAYS")]
        days: usize,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Keep refreshing statistics (and weather) until Ctrl-C
    Watch {
        /// Also poll the weather service
        #[arg(long)]
        weather: bool,

        /// Statistics refresh interval, overriding the config
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Mutual-aid support requests
    Support {
        #[command(subcommand)]
        action: SupportCommand,
    },

    /// Explain a dashboard term, or list them all
    Glossary {
        /// Term such as brrs or storm-surge
        term: Option<String>,
    },

    /// Generate a default .cram.toml configuration file
    InitConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SupportCommand {
    /// List requests, newest first
    List {
        #[arg(long, value_name = "STATUS")]
        status: Option<RequestStatus>,

        #[arg(long, default_value = "table", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Create a request
    Create {
        /// Requesting barangay id
        #[arg(long, value_name = "ID")]
        barangay: i64,

        #[arg(long, value_name = "TYPE")]
        resource: ResourceType,

        /// Free-form amount (e.g. "50 sacks")
        #[arg(long)]
        quantity: String,

        #[arg(long, default_value = "medium", value_name = "LEVEL")]
        urgency: Urgency,

        #[arg(long)]
        description: String,

        #[arg(long, value_name = "NAME")]
        contact_person: String,

        #[arg(long, value_name = "PHONE")]
        contact_number: String,

        #[arg(long, value_name = "EMAIL")]
        contact_email: Option<String>,
    },

    /// Mark a request resolved
    Resolve { id: i64 },
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Hazard layer names on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HazardArg {
    NoahFlood,
    StormSurge,
    Liquefaction,
    Landslide,
}

impl From<HazardArg> for HazardLayer {
    fn from(arg: HazardArg) -> Self {
        match arg {
            HazardArg::NoahFlood => HazardLayer::NoahFlood,
            HazardArg::StormSurge => HazardLayer::StormSurge,
            HazardArg::Liquefaction => HazardLayer::Liquefaction,
            HazardArg::Landslide => HazardLayer::Landslide,
        }
    }
}

/// Risk level for --risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.command, Command::InitConfig) {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Command::Barangays { top: Some(0), .. } => {
                return Err("--top must be at least 1".to_string());
            }
            Command::Weather { days, .. } if !(1..=5).contains(days) => {
                return Err("Forecast days must be between 1 and 5".to_string());
            }
            Command::Watch {
                interval: Some(0), ..
            } => {
                return Err("Interval must be at least 1 second".to_string());
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            api_url: None,
            config: None,
            timeout: None,
            weather_api_key: None,
            storage: None,
            verbose: false,
            quiet: false,
            command,
        }
    }

    fn alerts() -> Command {
        Command::Alerts {
            dismiss: Vec::new(),
            format: OutputFormat::Table,
        }
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::parse_from(["cram", "barangays", "--risk", "high", "--top", "5"]);
        match args.command {
            Command::Barangays { risk, top, .. } => {
                assert_eq!(risk, Some(RiskArg::High));
                assert_eq!(top, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["cram", "hazards", "storm-surge", "--format", "json"]);
        match args.command {
            Command::Hazards { layer, format } => {
                assert_eq!(HazardLayer::from(layer), HazardLayer::StormSurge);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_detail_views() {
        let args = Args::parse_from(["cram", "municipality", "3", "--no-ai"]);
        match args.command {
            Command::Municipality { id, no_ai, format } => {
                assert_eq!(id, 3);
                assert!(no_ai);
                assert_eq!(format, OutputFormat::Table);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["cram", "air-quality", "--ai", "--format", "json"]);
        match args.command {
            Command::AirQuality { ai, format } => {
                assert!(ai);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["cram", "glossary"]);
        assert!(matches!(args.command, Command::Glossary { term: None }));
    }

    #[test]
    fn test_parse_support_create() {
        let args = Args::parse_from([
            "cram",
            "support",
            "create",
            "--barangay",
            "7",
            "--resource",
            "water",
            "--quantity",
            "200 L",
            "--description",
            "Drinking water",
            "--contact-person",
            "Ana Cruz",
            "--contact-number",
            "09171234567",
        ]);
        match args.command {
            Command::Support {
                action:
                    SupportCommand::Create {
                        barangay,
                        resource,
                        urgency,
                        contact_email,
                        ..
                    },
            } => {
                assert_eq!(barangay, 7);
                assert_eq!(resource, ResourceType::Water);
                assert_eq!(urgency, Urgency::Medium);
                assert!(contact_email.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args(alerts());
        args.api_url = Some("127.0.0.1:8000/api".to_string());
        assert!(args.validate().is_err());

        args.api_url = Some("https://cram.example.org/api".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(alerts());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());

        // init-config skips validation
        args.command = Command::InitConfig;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args(Command::Weather {
            days: 6,
            format: OutputFormat::Table,
        });
        assert!(args.validate().is_err());

        args.command = Command::Watch {
            weather: false,
            interval: Some(0),
        };
        assert!(args.validate().is_err());

        args.command = alerts();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(alerts());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
