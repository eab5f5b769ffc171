use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use marklens::export;
use marklens::{AnalyzerConfig, BridgeConfig, MarkdownAnalyzer};

#[derive(Parser)]
#[command(name = "marklens", version, about = "Markdown analysis backed by a marksman language server")]
struct Cli {
    /// Workspace root handed to the language server
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Path to the marksman executable
    #[arg(long, default_value = "marksman")]
    server: String,

    /// Skip the language server and run regex-only analysis
    #[arg(long)]
    no_lsp: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single markdown file
    Analyze {
        file: PathBuf,
        /// Write the JSON report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Analyze every markdown file under the workspace
    Batch {
        /// Directory for per-file JSON reports
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

/// Tracing setup with MARKLENS_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("MARKLENS_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("marklens={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AnalyzerConfig::new(cli.workspace.clone())
        .with_bridge(BridgeConfig::new(cli.workspace).with_server_path(cli.server));
    if cli.no_lsp {
        config = config.without_lsp();
    }

    let analyzer = MarkdownAnalyzer::connect(config).await;
    let result = run(&cli.command, &analyzer).await;
    analyzer.shutdown().await;
    result
}

async fn run(command: &Command, analyzer: &MarkdownAnalyzer) -> anyhow::Result<()> {
    match command {
        Command::Analyze { file, output } => {
            let report = analyzer
                .analyze_file(file)
                .await
                .with_context(|| format!("analyzing {}", file.display()))?;

            match output {
                Some(path) => export::write_json(&report, path)?,
                None => println!("{}", export::to_json_string(&report)?),
            }
        }
        Command::Batch { output_dir } => {
            let results = analyzer.analyze_workspace().await;

            if let Some(dir) = output_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
                for report in results.values() {
                    let stem = report
                        .file_path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("report");
                    export::write_json(report, &dir.join(format!("{stem}.json")))?;
                }
            }

            for (path, report) in &results {
                println!(
                    "{}: {} words, {} headers, {} symbols",
                    path.display(),
                    report.metadata.word_count,
                    report.metadata.header_count,
                    report.symbols.len(),
                );
            }
            println!("analyzed {} files", results.len());
        }
    }

    Ok(())
}
