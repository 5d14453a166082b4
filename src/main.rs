use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use flow_modeler::flowchart::{FlowChartDesigner, HeuristicChartDesigner};
use flow_modeler::utils::Config;
use flow_modeler::{export, SessionRecorder};

#[derive(Parser)]
#[command(name = "flow-modeler")]
#[command(version)]
#[command(about = "Turn recorded browser interactions into automation flow graphs", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never call the intent inference provider
    #[arg(long, global = true, default_value = "false")]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a flow graph from recorded events
    Export {
        /// Event files or glob patterns
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output JSON path (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Build a flow chart from recorded events
    Chart {
        /// Event files or glob patterns
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output JSON path (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Session id stamped on the chart (random when omitted)
        #[arg(long)]
        session_id: Option<String>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::from_yaml_file(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => Config::from_env(),
    };
    if cli.offline {
        config.annotator.provider = "offline".to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    if !config.annotator.is_offline() {
        log::info!("Using {} intent annotator", config.annotator.provider);
    }

    match cli.command {
        Commands::Export { paths, out } => {
            let events = export::load_events(paths.as_slice())?;
            eprintln!(
                "{} Exporting flow graph from {} event(s)",
                "▶".green().bold(),
                events.len().to_string().cyan()
            );

            let mut recorder = SessionRecorder::from_config(&config);
            let graph = export::export_flow(&events, &mut recorder).await;
            export::write_json(&graph, out.as_deref())?;

            eprintln!(
                "{} {} node(s), entry {}",
                "✓".green(),
                graph.nodes.len(),
                graph.entry.as_deref().unwrap_or("-").cyan()
            );
        }

        Commands::Chart {
            paths,
            out,
            session_id,
        } => {
            let events = export::load_events(paths.as_slice())?;
            eprintln!(
                "{} Building flow chart from {} event(s)",
                "▶".green().bold(),
                events.len().to_string().cyan()
            );

            let mut recorder = SessionRecorder::from_config(&config);
            export::export_flow(&events, &mut recorder).await;

            let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let chart = HeuristicChartDesigner::default()
                .generate(&session_id, recorder.graph())
                .await;
            export::write_json(&chart, out.as_deref())?;

            eprintln!(
                "{} {} step(s) for session {}",
                "✓".green(),
                chart.steps.len(),
                session_id.cyan()
            );
        }
    }

    Ok(())
}
