use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crackwise::config::CrackConfig;
use crackwise::context::SessionContext;
use crackwise::learner::PatternLearner;
use crackwise::orchestrator::CrackOrchestrator;
use crackwise::tool::PhaseJobConfig;
use crackwise::ui::RecoveryUi;

#[derive(Parser)]
#[command(name = "crackwise")]
#[command(version, about = "Adaptive password recovery for encrypted archives")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (defaults to crackwise.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a phased recovery session against an extracted hash file
    Crack {
        /// Hash file extracted from the target archive
        hash_file: PathBuf,

        /// Original archive name (drives the plan heuristics); defaults to
        /// the hash file's name
        #[arg(long)]
        file_name: Option<String>,

        /// Original archive size in bytes
        #[arg(long, default_value = "0")]
        file_size: u64,

        /// Wordlist for the dictionary phases
        #[arg(long)]
        dictionary: Option<PathBuf>,

        /// Mangling-rules file for the dictionary phase
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Mask override for the mask phase
        #[arg(long)]
        mask: Option<String>,

        /// Disable the progress bars
        #[arg(long)]
        no_ui: bool,
    },
    /// Show learned password-pattern statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("crackwise.toml"));
    let config = CrackConfig::load_or_default(&config_path);

    match cli.command {
        Commands::Crack {
            hash_file,
            file_name,
            file_size,
            dictionary,
            rules,
            mask,
            no_ui,
        } => {
            let file_name = file_name.unwrap_or_else(|| {
                hash_file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let context = SessionContext::new(hash_file, file_name, file_size);
            let job = PhaseJobConfig {
                dictionary_path: dictionary,
                rules_path: rules,
                mask,
            };
            cmd_crack(config, context, job, no_ui).await
        }
        Commands::Stats => cmd_stats(&config),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "crackwise=debug"
    } else {
        "crackwise=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn cmd_crack(
    config: CrackConfig,
    context: SessionContext,
    job: PhaseJobConfig,
    no_ui: bool,
) -> Result<()> {
    let mut orchestrator = CrackOrchestrator::new(config);

    if !orchestrator.initialize().await {
        eprintln!(
            "{} no usable cracking tool found; phases will be reported as tool_unavailable",
            style("warning:").yellow().bold()
        );
    }

    let plan = orchestrator.start_session(context)?;

    let ui = if no_ui {
        None
    } else {
        let ui = RecoveryUi::new(plan.phases.len() as u64);
        ui.attach(&mut orchestrator);
        Some(ui)
    };

    let mut recovered: Option<String> = None;
    for descriptor in &plan.phases {
        match orchestrator.run_phase(descriptor.phase, job.clone()).await {
            Ok(outcome) if outcome.success => {
                recovered = outcome.password;
                break;
            }
            Ok(outcome) => {
                if let Some(reason) = outcome.reason {
                    tracing::info!(phase = %descriptor.phase, %reason, "phase ended without a result");
                }
            }
            // A spawn failure kills this phase only; later phases may still
            // succeed.
            Err(err) => {
                eprintln!(
                    "{} phase {} failed: {}",
                    style("error:").red().bold(),
                    descriptor.phase,
                    err
                );
            }
        }
    }

    orchestrator.stop_session();

    if let Some(ui) = &ui {
        ui.finish(if recovered.is_some() {
            "recovered"
        } else {
            "exhausted"
        });
    }

    match recovered {
        Some(password) => {
            println!(
                "{} password recovered: {}",
                style("✓").green().bold(),
                style(&password).bold()
            );
        }
        None => {
            // All phases ran dry. Not an error: the caller can retry with a
            // bigger wordlist or a custom mask.
            println!("{} exhausted all phases without a match", style("·").dim());
        }
    }

    Ok(())
}

fn cmd_stats(config: &CrackConfig) -> Result<()> {
    let store_path = match &config.model_path {
        Some(path) => path.clone(),
        None => PatternLearner::default_store_path()?,
    };
    let learner = PatternLearner::open(store_path, config.blend);
    let stats = learner.stats();

    println!();
    println!(
        "Learned password statistics ({} recorded successes):",
        stats.total_success
    );
    println!();

    println!("{:<18} {:<10}", "Charset", "Weight");
    println!("{:<18} {:<10}", "------------------", "----------");
    for (charset, weight) in learner.charset_weights() {
        println!("{:<18} {:<10.1}", charset, weight);
    }
    println!();

    println!(
        "Preferred lengths: {}",
        stats
            .top_lengths
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    if !stats.top_patterns.is_empty() {
        println!("{:<24} {:<8} {:<8}", "Pattern", "Count", "Prob");
        println!("{:<24} {:<8} {:<8}", "------------------------", "--------", "--------");
        for rank in &stats.top_patterns {
            println!(
                "{:<24} {:<8} {:<8.2}",
                rank.pattern, rank.count, rank.probability
            );
        }
        println!();
    }

    println!("Positional features:");
    let mut features: Vec<(&String, &f64)> = stats.position_probs.iter().collect();
    features.sort_by(|a, b| a.0.cmp(b.0));
    for (feature, probability) in features {
        println!("  {:<14} {:.0}%", feature, probability * 100.0);
    }

    Ok(())
}
