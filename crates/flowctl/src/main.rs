//! Flowplane command line tool.
//!
//! Operator utilities that run entirely against the in-memory runtime:
//! validate a definition file, dry-run a rule against sample data, or
//! run a definition on the local backend and watch it finish.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use flowplane_control_plane::config::AppConfig;
use flowplane_control_plane::definition::graph::WorkflowGraph;
use flowplane_control_plane::definition::validator::collect_violations;
use flowplane_control_plane::model::BusinessRule;
use flowplane_control_plane::services::definition::CreateDefinitionRequest;
use flowplane_control_plane::services::rule::validate_rule_shape;
use flowplane_control_plane::state::AppState;

#[derive(Parser)]
#[command(name = "flowctl")]
#[command(version, about = "Flowplane Command Line Tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow definition file
    ///
    /// The file is a JSON document with `name`, optional `version` and a
    /// `graph` of steps, connections and variables. All violations are
    /// reported, not just the first.
    Validate {
        /// Path to the definition JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Dry-run a business rule against sample data
    ///
    /// Evaluates the rule's conditions and, on a match, translates its
    /// actions without touching any execution history or dispatching
    /// real side effects.
    TestRule {
        /// Path to the rule JSON file (entity_type, conditions, actions)
        #[arg(long, value_name = "FILE")]
        rule: PathBuf,

        /// Path to the sample record JSON file
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
    },

    /// Run a definition on the local in-process backend
    Run {
        /// Path to the definition JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Execution variables as a JSON object
        #[arg(long, value_name = "JSON")]
        variables: Option<String>,
    },
}

/// Definition file shape accepted by `validate` and `run`.
#[derive(serde::Deserialize)]
struct DefinitionFile {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default = "default_category")]
    category: String,
    graph: WorkflowGraph,
    #[serde(default)]
    trigger_config: Option<serde_json::Value>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

/// Rule file shape accepted by `test-rule`.
#[derive(serde::Deserialize)]
struct RuleFile {
    #[serde(default = "default_rule_name")]
    name: String,
    #[serde(default = "default_entity_type")]
    entity_type: String,
    #[serde(default = "default_rule_type")]
    rule_type: String,
    #[serde(default)]
    priority: i32,
    conditions: serde_json::Value,
    actions: serde_json::Value,
}

fn default_rule_name() -> String {
    "adhoc_rule".to_string()
}

fn default_entity_type() -> String {
    "record".to_string()
}

fn default_rule_type() -> String {
    "automation".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => validate(&file),
        Commands::TestRule { rule, data } => test_rule(&rule, &data).await,
        Commands::Run { file, variables } => run(&file, variables.as_deref()).await,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn validate(file: &PathBuf) -> Result<()> {
    let definition: DefinitionFile = read_json(file)?;

    let errors = collect_violations(&definition.name, &definition.version, &definition.graph);
    if errors.is_empty() {
        println!(
            "OK: '{}' version {} is valid ({} steps, {} connections)",
            definition.name,
            definition.version,
            definition.graph.steps.len(),
            definition.graph.connections.len()
        );
        return Ok(());
    }

    eprintln!(
        "INVALID: '{}' has {} violation(s):",
        definition.name,
        errors.len()
    );
    for violation in errors.violations() {
        eprintln!("  - {}", violation);
    }
    bail!("validation failed");
}

async fn test_rule(rule_path: &PathBuf, data_path: &PathBuf) -> Result<()> {
    let rule_file: RuleFile = read_json(rule_path)?;
    let sample: serde_json::Value = read_json(data_path)?;

    let errors = validate_rule_shape(&rule_file.name, &rule_file.conditions, &rule_file.actions);
    if !errors.is_empty() {
        eprintln!("INVALID: rule has {} violation(s):", errors.len());
        for violation in errors.violations() {
            eprintln!("  - {}", violation);
        }
        bail!("rule validation failed");
    }

    let state = AppState::local(AppConfig::default());
    let rule = BusinessRule::new(
        uuid::Uuid::new_v4(),
        &rule_file.name,
        &rule_file.entity_type,
        &rule_file.rule_type,
        rule_file.priority,
        rule_file.conditions,
        rule_file.actions,
    );

    let outcome = state.rule_engine.test_rule(&rule, &sample).await?;
    if !outcome.matched {
        println!("NOT MATCHED: conditions did not hold for the sample data");
        return Ok(());
    }

    println!("MATCHED: {} action(s) would be issued:", outcome.results.len());
    println!("{}", serde_json::to_string_pretty(&outcome.results)?);
    Ok(())
}

async fn run(file: &PathBuf, variables: Option<&str>) -> Result<()> {
    let definition_file: DefinitionFile = read_json(file)?;
    let variables: serde_json::Value = match variables {
        Some(raw) => serde_json::from_str(raw).context("parsing --variables")?,
        None => serde_json::json!({}),
    };

    let state = AppState::local(AppConfig::default());
    let tenant_id = uuid::Uuid::new_v4();

    let definition = state
        .definitions
        .create(
            tenant_id,
            CreateDefinitionRequest {
                name: definition_file.name.clone(),
                version: Some(definition_file.version.clone()),
                category: definition_file.category.clone(),
                graph: definition_file.graph,
                trigger_config: definition_file.trigger_config,
            },
        )
        .await?;
    state.definitions.publish(tenant_id, definition.id).await?;
    state.definitions.activate(tenant_id, definition.id).await?;

    let execution = state
        .coordinator
        .start(
            tenant_id,
            definition.id,
            "manual",
            serde_json::json!({"source": "flowctl"}),
            variables,
        )
        .await?;

    println!(
        "Started execution {} (key {})",
        execution.id, execution.execution_key
    );

    // Poll until the local drive finishes.
    let detail = loop {
        let detail = state.executions.get(tenant_id, execution.id).await?;
        if detail.execution.status.is_terminal() {
            break detail;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    println!(
        "Execution finished: {} ({}%)",
        detail.execution.status, detail.execution.progress_percentage
    );
    if let Some(error) = &detail.execution.error_message {
        println!("Error: {}", error);
    }
    for step in &detail.steps {
        println!("  [{}] {} ({})", step.status, step.step_id, step.step_type);
    }

    if detail.execution.status == flowplane_control_plane::model::ExecutionStatus::Failed {
        bail!("execution failed");
    }
    Ok(())
}
