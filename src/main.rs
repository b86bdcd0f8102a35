use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leafscan::config::{init_config, DEFAULT_CONFIG_FILE};
use leafscan::utils::{format_bytes, format_confidence};
use leafscan::{
    ApiClient, DemoApi, HistoryWorkflow, PlantApi, PlantProfile, ScanRecord, UploadManager,
    WorkflowPhase,
};

#[derive(Parser, Debug)]
#[command(name = "leafscan")]
#[command(about = "Diagnose plant diseases from a photo")]
struct Args {
    /// Path to the config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Use built-in sample data instead of the remote service
    #[arg(long)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a plant photo
    Analyze {
        file: PathBuf,
    },
    /// List previous scans
    History {
        /// Only show scans whose disease name contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a single scan
    Scan {
        id: String,
    },
    /// Look up the treatment for a disease
    Treatment {
        disease: String,
    },
    /// Look up care information for a plant
    Plant {
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = init_config(&args.config)?;

    let api: Arc<dyn PlantApi> = if args.demo {
        Arc::new(DemoApi::new(config.demo_delay()))
    } else {
        let client = ApiClient::from_config(config).context("Failed to create API client")?;
        tracing::info!(base_url = %client.base_url(), environment = ?config.environment, "Using diagnosis service");
        Arc::new(client)
    };

    match args.command {
        Command::Analyze { file } => analyze(api, config.max_image_bytes, file).await,
        Command::History { search } => history(api, search).await,
        Command::Scan { id } => {
            let record = api.fetch_scan(&id).await?;
            print_record(&record);
            Ok(())
        }
        Command::Treatment { disease } => {
            let plan = api.fetch_treatment(&disease).await?;
            println!("{}\n\n{}", plan.disease, plan.treatment);
            for (index, step) in plan.steps.iter().enumerate() {
                println!("  {}. {}", index + 1, step);
            }
            Ok(())
        }
        Command::Plant { name } => {
            let profile = api.fetch_plant_info(&name).await?;
            print_profile(&profile);
            Ok(())
        }
    }
}

async fn analyze(api: Arc<dyn PlantApi>, max_image_bytes: u64, file: PathBuf) -> Result<()> {
    let handle = UploadManager::new(api, max_image_bytes);
    let manager = handle.manager.clone();

    manager
        .select_path(&file)
        .await
        .with_context(|| format!("Can't use {}", file.display()))?;

    let selected = manager.snapshot().await?;
    if let Some(candidate) = &selected.candidate {
        println!(
            "Image ready for analysis: {} ({}, {})",
            candidate.file_name,
            candidate.mime_type,
            format_bytes(candidate.size_bytes)
        );
    }

    manager.analyze().await?;
    println!("Analyzing your plant...");

    let snapshot = manager.wait_for_settled().await?;
    drop(manager);
    handle.shutdown().await?;

    match snapshot.phase {
        WorkflowPhase::Succeeded => {
            if let Some(result) = &snapshot.result {
                println!("\n{}", result.clipboard_text());
                for source in &result.sources {
                    println!("  - {} <{}>", source.title, source.url);
                }
            }
            if let Some(profile) = &snapshot.profile {
                println!();
                print_profile(profile);
            }
            Ok(())
        }
        WorkflowPhase::Failed => match snapshot.failure {
            Some(err) => Err(anyhow::anyhow!("Error analyzing plant: {}", err)),
            None => Err(anyhow::anyhow!("Error analyzing plant")),
        },
        phase => Err(anyhow::anyhow!("Analysis ended unexpectedly in {:?}", phase)),
    }
}

async fn history(api: Arc<dyn PlantApi>, search: Option<String>) -> Result<()> {
    let mut history = HistoryWorkflow::new(api);
    history.load().await.context("Error loading history")?;

    if let Some(term) = search {
        history.set_search_term(term);
    }

    let visible = history.visible();
    if visible.is_empty() {
        if history.search_term().is_empty() {
            println!("No scan history yet");
        } else {
            println!("No results found for {:?}", history.search_term());
        }
        return Ok(());
    }

    for record in visible {
        print_record(record);
    }

    Ok(())
}

fn print_record(record: &ScanRecord) {
    let confidence = record
        .confidence
        .map(|ratio| format!(" ({})", format_confidence(ratio)))
        .unwrap_or_default();

    println!("[{}] {}{}", record.id, record.disease_name, confidence);
    println!("    {}", record.scanned_on_text());
    println!("    {}", record.image_url);
}

fn print_profile(profile: &PlantProfile) {
    println!("{} ({})", profile.common_name, profile.scientific_name);
    for (category, advice) in &profile.care_attributes {
        println!("  {}: {}", category, advice);
    }

    if !profile.prevention_tips.is_empty() {
        println!("Prevention tips:");
        for (index, tip) in profile.prevention_tips.iter().enumerate() {
            println!("  {}. {}", index + 1, tip);
        }
    }
}
