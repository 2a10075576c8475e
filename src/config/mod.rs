pub mod engine_config;

pub use engine_config::EngineConfig;

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "retrofit-cascade")]
#[command(about = "PTAC to PTHP retrofit calculations with dependency-aware cascading")]
pub struct CliConfig {
    /// Path to TOML engine configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a calculation record from a building profile JSON file
    Init {
        #[arg(long)]
        id: String,
        #[arg(long)]
        building: String,
    },
    /// Execute every service in dependency order
    RunAll {
        #[arg(long)]
        id: String,
    },
    /// Execute one service and, unless disabled, everything downstream of it
    Run(RunArgs),
    /// Print which services have executed and their versions
    Status {
        #[arg(long)]
        id: String,
    },
    /// Resolve an execution plan without running anything
    Plan {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        service: Option<String>,
        #[arg(long)]
        no_cascade: bool,
        #[arg(long)]
        all: bool,
    },
    /// Print the stored calculation record
    Show {
        #[arg(long)]
        id: String,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub service: String,

    /// Input override, e.g. --set ptacUnits=18 (repeatable)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub overrides: Vec<String>,

    #[arg(long)]
    pub no_cascade: bool,

    /// Recorded in the override audit log
    #[arg(long)]
    pub actor: Option<String>,
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = CliConfig::parse_from([
            "retrofit-cascade",
            "run",
            "--id",
            "calc-1",
            "--service",
            "energy",
            "--set",
            "ptacUnits=18",
            "--set",
            "electricityRate=0.3",
            "--no-cascade",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.id, "calc-1");
        assert_eq!(args.overrides.len(), 2);
        assert!(args.no_cascade);
        assert!(args.actor.is_none());
    }

    #[test]
    fn test_plan_requires_service_or_all() {
        assert!(CliConfig::try_parse_from(["retrofit-cascade", "plan"]).is_err());
        assert!(CliConfig::try_parse_from(["retrofit-cascade", "plan", "--all"]).is_ok());
        assert!(CliConfig::try_parse_from([
            "retrofit-cascade",
            "plan",
            "--all",
            "--service",
            "noi"
        ])
        .is_err());
    }
}
