//! `advisorguard ask`: one question through every perimeter.

use super::{QueryArgs, SubjectArgs, load_config};
use advisorguard_agent::{AdvisorAgent, DocumentStore, TurnOutcome};
use advisorguard_config::AppConfig;
use advisorguard_pdp::HttpPdpClient;
use advisorguard_perimeter::PerimeterPipeline;
use advisorguard_providers::AnthropicProvider;
use serde_json::json;
use std::sync::Arc;

pub async fn run(
    question: String,
    subject: SubjectArgs,
    query: QueryArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    if !config.has_provider_key() {
        eprintln!();
        eprintln!("  ERROR: No model API key configured!");
        eprintln!();
        eprintln!("  Set ANTHROPIC_API_KEY or add provider.api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No model API key found. See above for setup instructions.".into());
    }

    let agent = build_agent(&config)?;
    let outcome = agent
        .run_turn(subject.into_subject(), query.into_query(question))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn build_agent(config: &AppConfig) -> Result<AdvisorAgent, Box<dyn std::error::Error>> {
    let pdp = HttpPdpClient::from_config(&config.pdp)?;
    let pipeline = PerimeterPipeline::from_config(Arc::new(pdp), config);
    let provider = AnthropicProvider::from_config(&config.provider)?;
    let documents = DocumentStore::from_config(&config.documents)?;
    Ok(AdvisorAgent::new(pipeline, Arc::new(provider), documents, config))
}

fn print_outcome(outcome: &TurnOutcome) {
    println!();
    for line in outcome.message().lines() {
        println!("  {line}");
    }
    println!();

    match outcome {
        TurnOutcome::Delivered { response, warnings } => {
            for note in &response.compliance_notes {
                println!("  [compliance] {note}");
            }
            for warning in &response.risk_warnings {
                println!("  [risk] {warning}");
            }
            for warning in warnings {
                println!("  [warning] {warning}");
            }
        }
        TurnOutcome::Refused {
            perimeter, warnings, ..
        } => {
            println!("  Refused at the {perimeter} perimeter.");
            for warning in warnings {
                println!("  [warning] {warning}");
            }
        }
        TurnOutcome::Failed { perimeter, error } => {
            eprintln!("  Failed at the {perimeter} perimeter: {error}");
        }
    }
    println!();
}

fn outcome_json(outcome: &TurnOutcome) -> serde_json::Value {
    match outcome {
        TurnOutcome::Delivered { response, warnings } => json!({
            "outcome": "delivered",
            "response": response,
            "warnings": warnings,
        }),
        TurnOutcome::Refused {
            perimeter,
            reason,
            warnings,
        } => json!({
            "outcome": "refused",
            "perimeter": perimeter,
            "reason": reason,
            "message": outcome.message(),
            "warnings": warnings,
        }),
        TurnOutcome::Failed { perimeter, error } => json!({
            "outcome": "failed",
            "perimeter": perimeter,
            "error": error,
            "message": outcome.message(),
        }),
    }
}
