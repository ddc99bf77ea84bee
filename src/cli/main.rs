use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;
use supernova_weather::config::MlConfig;
use supernova_weather::corpus::{load_corpus, write_corpus, CorpusGenerator};
use supernova_weather::ml::training::train;

#[derive(Parser)]
#[command(name = "supernova-cli")]
#[command(about = "Supernova Weather operations CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a balanced rule-labeled training corpus
    Generate {
        #[arg(short, long, default_value = "data/weather_dataset_with_rules.csv")]
        output: PathBuf,

        /// Accepted rows per category
        #[arg(short = 'n', long, default_value = "1000")]
        per_category: usize,

        #[arg(short, long, default_value = "7")]
        seed: u64,
    },

    /// Train the classifier on a corpus and persist the artifact
    Train {
        #[arg(short, long, default_value = "data/weather_dataset_with_rules.csv")]
        corpus: PathBuf,

        #[arg(short, long, default_value = "data/weather_model.bin")]
        model: PathBuf,
    },

    /// Query a running server for the severity at a CEP
    Consulta {
        #[arg(value_name = "CEP")]
        cep: String,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supernova_weather=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Generate {
            output,
            per_category,
            seed,
        } => {
            let samples = CorpusGenerator::new(seed).generate(per_category);
            write_corpus(&output, &samples).context("failed to write corpus")?;
            println!("Corpus written to {} ({} rows)", output.display(), samples.len());
        }

        Commands::Train { corpus, model } => {
            let samples = load_corpus(&corpus).context("failed to load corpus")?;
            let config = MlConfig {
                model_path: model.clone(),
                corpus_path: corpus,
                ..MlConfig::default()
            };
            let (artifact, report) = train(&samples, &config).context("training failed")?;
            artifact.save(&model).context("failed to save artifact")?;

            println!("Model saved to {}", model.display());
            println!("Rounds used:      {}", report.rounds_used);
            println!("Accuracy:         {:.4}", report.accuracy);
            match report.auc_roc_ovr {
                Some(auc) => println!("AUC-ROC (ovr):    {:.4}", auc),
                None => println!("AUC-ROC (ovr):    unavailable (incomplete class coverage)"),
            }
            let mut classes: Vec<_> = report.per_class.iter().collect();
            classes.sort_by(|a, b| a.0.cmp(b.0));
            for (label, metrics) in classes {
                println!(
                    "  {:<35} precision {:.4}  recall {:.4}  f1 {:.4}  support {}",
                    label, metrics.precision, metrics.recall, metrics.f1_score, metrics.support
                );
            }
        }

        Commands::Consulta { cep } => {
            let response = client
                .post(format!("{}/consulta", cli.endpoint))
                .json(&json!({ "cep": cep }))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
