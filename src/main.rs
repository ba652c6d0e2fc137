use bi_cobot::config::BiConfig;
use bi_cobot::db::seed::{SeedMode, DEFAULT_LEADS, DEFAULT_RANDOM_SEED, DEFAULT_TRANSACTIONS};
use bi_cobot::db::{seed_demo, SeedOptions};
use bi_cobot::eval::{evaluate, golden_cases};
use bi_cobot::render::{render_bar_chart, write_csv};
use bi_cobot::templates::TemplateRegistry;
use bi_cobot::BiRunner;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bi-cobot")]
#[command(about = "Template-gated BI questions over customer_features")]
#[command(version)]
struct Args {
    /// Database URL (or set DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model name (or set CLAUDE_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a BI question with an approved template
    Ask {
        /// The BI question in natural language
        question: String,

        /// Print the full result as JSON instead of the report
        #[arg(long)]
        json: bool,

        /// Also write the result rows to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Skip the bar chart
        #[arg(long)]
        no_chart: bool,
    },
    /// List the approved templates
    Templates,
    /// Create and populate the demo tables
    Seed {
        /// Use the fixed five-user classroom dataset
        #[arg(long)]
        demo: bool,

        /// Number of synthetic leads
        #[arg(long, default_value_t = DEFAULT_LEADS)]
        leads: usize,

        /// Number of synthetic transactions
        #[arg(long, default_value_t = DEFAULT_TRANSACTIONS)]
        transactions: usize,

        /// RNG seed for the synthetic dataset
        #[arg(long, default_value_t = DEFAULT_RANDOM_SEED)]
        seed: u64,
    },
    /// Measure template selection accuracy on the golden questions
    Eval {
        /// Also run one full question end to end
        #[arg(long)]
        e2e: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = BiConfig::from_env();
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }
    if let Some(model) = args.model {
        config.model = model;
    }

    match args.command {
        Commands::Ask { question, json, csv, no_chart } => {
            run_ask(&config, &question, json, csv, no_chart).await
        }
        Commands::Templates => list_templates(),
        Commands::Seed { demo, leads, transactions, seed } => {
            run_seed(&config, demo, leads, transactions, seed)
        }
        Commands::Eval { e2e } => run_eval(&config, e2e).await,
    }
}

async fn run_ask(
    config: &BiConfig,
    question: &str,
    json: bool,
    csv: Option<PathBuf>,
    no_chart: bool,
) -> Result<()> {
    let runner = BiRunner::from_config(config)?;
    let result = runner.resolve(question).await?;

    if let Some(path) = csv {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&result.rows, file)?;
        info!("Wrote {} rows to {}", result.rows.len(), path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("\n=== TEMPLATE === {}", result.template);
    if result.selection_fallback {
        println!("(model reply unusable, default template applied)");
    }
    println!("=== PARAMS === {}", serde_json::to_string(&result.params)?);
    println!("=== LATENCY (s) === {:.3}", result.latency_seconds);
    println!("\n=== ROWS (JSON) ===");
    println!("{}", serde_json::to_string_pretty(&result.rows)?);

    if !no_chart {
        if let Some(template) = runner.registry().get(&result.template) {
            println!("\n=== CHART ===");
            print!("{}", render_bar_chart(&template.chart, &result.rows));
        }
    }

    println!("\n=== EXEC SUMMARY ===\n{}", result.explanation);
    Ok(())
}

fn list_templates() -> Result<()> {
    let registry = TemplateRegistry::reference()?;
    println!("\n{}", "=".repeat(80));
    println!(" APPROVED TEMPLATES (default: {})", registry.default_name());
    println!("{}", "=".repeat(80));
    for template in registry.iter() {
        println!("\n {}", template.name);
        println!("   {}", template.description);
        println!("   params: {}", template.accepted_params.join(", "));
    }
    Ok(())
}

fn run_seed(
    config: &BiConfig,
    demo: bool,
    leads: usize,
    transactions: usize,
    seed: u64,
) -> Result<()> {
    let mode = if demo {
        SeedMode::Demo
    } else {
        SeedMode::Random { leads, transactions, seed }
    };
    let options = SeedOptions {
        mode,
        ..SeedOptions::default()
    };

    println!("Database: {}", config.database_url);
    let summary = seed_demo(&config.database_url, &options)?;
    println!(
        "Seeded leads_scored ({}), transactions ({}), customer_features ({})",
        summary.leads, summary.transactions, summary.features
    );
    Ok(())
}

async fn run_eval(config: &BiConfig, e2e: bool) -> Result<()> {
    let runner = BiRunner::from_config(config)?;
    let report = evaluate(runner.selector(), &golden_cases()).await?;

    println!("\nTemplate selection accuracy: {:.2}%", report.accuracy * 100.0);
    println!("Avg selection latency (s): {:.3}", report.mean_latency_seconds);
    println!("\nPer-case results:");
    for case in &report.cases {
        println!("{}", serde_json::to_string(case)?);
    }

    if e2e {
        println!("\n--- E2E Sample ---");
        let sample = runner
            .resolve("What's the average p1 by segment for the last 90 days?")
            .await?;
        let preview: Vec<_> = sample.rows.iter().take(3).collect();
        let summary: String = sample.explanation.chars().take(250).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "template": sample.template,
                "params": sample.params,
                "latency_seconds": sample.latency_seconds,
                "rows_preview": preview,
                "summary": summary,
            }))?
        );
    }
    Ok(())
}
