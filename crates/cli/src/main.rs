//! AdvisorGuard CLI: permission-gated AI financial advice.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{QueryArgs, SubjectArgs};

#[derive(Parser)]
#[command(
    name = "advisorguard",
    version,
    about = "Four-perimeter access control for an AI financial advisor"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.advisorguard
    Onboard,

    /// Ask the advisor a question through all four perimeters
    Ask {
        /// The question
        question: String,

        #[command(flatten)]
        subject: SubjectArgs,

        #[command(flatten)]
        query: QueryArgs,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a single permission check against the PDP
    Check {
        /// Action to check (e.g. "receive", "read")
        #[arg(short, long)]
        action: String,

        /// Resource type (e.g. "financial_advice")
        #[arg(short, long)]
        resource: String,

        /// Resource instance key
        #[arg(long)]
        key: Option<String>,

        /// Resource attribute as name=value (repeatable)
        #[arg(long = "attr", value_name = "NAME=VALUE")]
        attributes: Vec<String>,

        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// Show or validate a policy catalog
    Catalog {
        /// Built-in catalog name or path to a catalog TOML (defaults to config)
        source: Option<String>,

        /// List the built-in catalogs
        #[arg(long)]
        list: bool,
    },

    /// Push a policy catalog to the PDP management API
    Provision {
        /// Built-in catalog name or path to a catalog TOML (defaults to config)
        source: Option<String>,

        /// Validate and summarize without calling the API
        #[arg(long)]
        dry_run: bool,
    },

    /// Check config, PDP and model provider health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Ask {
            question,
            subject,
            query,
            json,
        } => commands::ask::run(question, subject, query, json).await?,
        Commands::Check {
            action,
            resource,
            key,
            attributes,
            subject,
        } => commands::check::run(action, resource, key, attributes, subject).await?,
        Commands::Catalog { source, list } => commands::catalog::run(source, list).await?,
        Commands::Provision { source, dry_run } => commands::provision::run(source, dry_run).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisorguard_core::CertificationLevel;

    #[test]
    fn ask_parses_subject_and_query_flags() {
        let cli = Cli::try_parse_from([
            "advisorguard",
            "ask",
            "Should I rebalance?",
            "--user",
            "premium@example.com",
            "--tier",
            "premium",
            "--opt-in",
            "true",
            "--certification",
            "expert",
            "--portfolio-value",
            "1500000",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask {
                question,
                subject,
                query,
                json,
            } => {
                assert_eq!(question, "Should I rebalance?");
                assert!(json);
                let subject = subject.into_subject();
                assert_eq!(subject.user_id, "premium@example.com");
                assert_eq!(subject.tier.as_deref(), Some("premium"));
                assert_eq!(subject.ai_advice_opted_in, Some(true));
                assert_eq!(subject.certification_level, Some(CertificationLevel::Expert));
                let query = query.into_query(question);
                assert_eq!(query.portfolio_value, Some(1_500_000.0));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn unknown_certification_is_rejected() {
        let result = Cli::try_parse_from([
            "advisorguard",
            "ask",
            "hi",
            "--user",
            "u1",
            "--certification",
            "grandmaster",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn check_collects_repeated_attributes() {
        let cli = Cli::try_parse_from([
            "advisorguard",
            "check",
            "--action",
            "read",
            "--resource",
            "financial_document",
            "--attr",
            "classification=public",
            "--attr",
            "length=120",
            "--user",
            "u1",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Check { attributes, .. } => {
                assert_eq!(attributes, vec!["classification=public", "length=120"]);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn provision_dry_run_flag() {
        let cli = Cli::try_parse_from(["advisorguard", "provision", "tiers", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Provision { source, dry_run } => {
                assert_eq!(source.as_deref(), Some("tiers"));
                assert!(dry_run);
            }
            _ => panic!("expected provision"),
        }
    }
}
