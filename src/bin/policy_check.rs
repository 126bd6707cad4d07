use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use octofhir_validation_policy::terminology::describe_operations;
use octofhir_validation_policy::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "policy-check")]
#[command(about = "Inspect code system filter rules and check terminology resources")]
#[command(version)]
struct Cli {
    /// Policy configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (json, text)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the filter rules for a code system
    Rules {
        /// Code system URL (e.g., http://www.ama-assn.org/go/cpt)
        #[arg(short, long)]
        system: String,
    },
    /// Scan the concepts of CodeSystem files
    CodeSystem {
        /// CodeSystem JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Check the compose filters of ValueSet files
    ValueSet {
        /// ValueSet JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PolicyConfig::from_file(path)?,
        None => PolicyConfig::default(),
    };
    let engine = PolicyEngine::new(config)?;

    let clean = match cli.command {
        Commands::Rules { system } => {
            show_rules(&engine, &system, &cli.format)?;
            true
        }
        Commands::CodeSystem { files } | Commands::ValueSet { files } => {
            check_files(&engine, &files, &cli.format).await?
        }
    };

    if !clean {
        std::process::exit(1);
    }
    Ok(())
}

fn show_rules(
    engine: &PolicyEngine,
    system: &str,
    format: &str,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let provider = engine.registry().resolve(system);
    let rows: Vec<(String, FilterRule)> = provider
        .list_property_names()
        .into_iter()
        .map(|name| {
            let rule = provider.rules_for_filter(&name, OperationSet::all());
            (name, rule)
        })
        .collect();

    if format == "json" {
        let json: Vec<_> = rows
            .iter()
            .map(|(name, rule)| match rule {
                FilterRule::Found(rule) => serde_json::json!({
                    "property": name,
                    "type": rule.value_kind.to_string(),
                    "operations": rule.legal_operations.iter().map(|op| op.code()).collect::<Vec<_>>(),
                    "knownCodeRequired": rule.requires_known_code(),
                }),
                FilterRule::Unsupported => serde_json::json!({
                    "property": name,
                    "supported": false,
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Filter rules for {system}");
    if !engine.registry().has_specific_provider(system) {
        println!("(no specific rules registered, showing base rules)");
    }
    for (name, rule) in rows {
        match rule {
            FilterRule::Found(rule) => println!(
                "  {:<16} {:<8} {}",
                name,
                rule.value_kind,
                describe_operations(&rule.legal_operations)
            ),
            FilterRule::Unsupported => println!("  {name:<16} unsupported"),
        }
    }
    Ok(())
}

async fn check_files(
    engine: &PolicyEngine,
    files: &[PathBuf],
    format: &str,
) -> std::result::Result<bool, Box<dyn std::error::Error>> {
    let mut resources = Vec::with_capacity(files.len());
    for file in files {
        resources.push(read_json(file)?);
    }

    let results = engine.check_terminology_batch(resources).await;
    let mut clean = true;
    for (file, result) in files.iter().zip(results) {
        let result = result?;
        clean &= result.is_valid;
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&result)?);
            continue;
        }

        if result.issues.is_empty() {
            println!("✅ {}: no issues", file.display());
            continue;
        }
        println!(
            "{} {}: {} errors, {} warnings, {} information",
            if result.is_valid { "⚠️" } else { "❌" },
            file.display(),
            result.error_count,
            result.warning_count,
            result.info_count
        );
        for issue in &result.issues {
            println!(
                "  {} [{}]: {}",
                match issue.severity {
                    ValidationSeverity::Error => "ERROR",
                    ValidationSeverity::Warning => "WARN",
                    ValidationSeverity::Information => "INFO",
                },
                issue.code,
                issue.message
            );
            if let Some(path) = &issue.path {
                println!("    at: {path}");
            }
        }
    }
    Ok(clean)
}

fn read_json(path: &Path) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
