//! kgrec - knowledge graph question recommendation runner

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use kgrec_algo::LearnerId;
use kgrec_cli::commands::{self, CommandError, RecommendInputs, RecommendOutcome};
use kgrec_cli::config::Config;
use kgrec_cli::logging;

#[derive(Parser)]
#[command(name = "kgrec")]
#[command(author, version, about = "Knowledge graph mastery and IRT question recommendation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Directory relative paths are resolved against (overrides KGREC_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Leave rows with unknown outcome codes out of the tally instead of counting them as incorrect
    #[arg(long, global = true)]
    strict_outcomes: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a learner's per-knowledge-point mastery table
    Mastery {
        /// Learner id
        #[arg(short, long)]
        student: String,
        /// Response rows (JSON array)
        #[arg(short, long)]
        responses: PathBuf,
        /// Output file (default: student_<id>_knowledge_mastery.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Annotate a knowledge graph with a mastery table
    Enrich {
        /// Knowledge graph with nodes and edges
        #[arg(short, long)]
        graph: PathBuf,
        /// Mastery table written by `mastery`
        #[arg(short, long)]
        mastery: PathBuf,
        /// Output file (default: enhanced_knowledge_graph.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the weakest attempted knowledge points of an enriched graph
    Weakest {
        /// Enriched knowledge graph
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Rank items by probability of a correct response
    Rank {
        /// Learner id
        #[arg(short, long)]
        student: String,
        /// IRT item parameters (JSON array)
        #[arg(short, long)]
        items: PathBuf,
        /// Learner abilities (JSON array)
        #[arg(short, long)]
        abilities: PathBuf,
        /// Restrict ranking to these item ids
        #[arg(long = "item", value_name = "ITEM_ID")]
        item_ids: Vec<String>,
    },

    /// Run the whole pipeline; without --choose only the candidates are listed
    Recommend {
        /// Learner id
        #[arg(short, long)]
        student: String,
        #[arg(long)]
        responses: PathBuf,
        #[arg(long)]
        graph: PathBuf,
        /// Knowledge point to item links (JSON array)
        #[arg(long)]
        links: PathBuf,
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        abilities: PathBuf,
        /// One of the weakest knowledge points
        #[arg(long)]
        choose: Option<String>,
    },
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T) -> String) {
    match format {
        OutputFormat::Text => print!("{}", text(value)),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::error!(error = %err, "failed to serialize output"),
        },
    }
}

fn run(cli: Cli, config: &Config) -> Result<(), CommandError> {
    let format = cli.format;
    match cli.command {
        Commands::Mastery {
            student,
            responses,
            output,
        } => {
            let student = LearnerId::new(&student);
            let table = commands::run_mastery(config, &responses, &student, output.as_deref())?;
            emit(format, &table, commands::render_mastery);
        }
        Commands::Enrich {
            graph,
            mastery,
            output,
        } => {
            let enriched = commands::run_enrich(config, &graph, &mastery, output.as_deref())?;
            emit(format, &enriched, commands::render_histogram);
        }
        Commands::Weakest { graph } => {
            let weakest = commands::run_weakest(config, &graph)?;
            emit(format, &weakest, commands::render_weakest);
        }
        Commands::Rank {
            student,
            items,
            abilities,
            item_ids,
        } => {
            let student = LearnerId::new(&student);
            let ranked = commands::run_rank(config, &items, &abilities, &student, &item_ids)?;
            emit(format, &ranked, commands::render_ranked);
        }
        Commands::Recommend {
            student,
            responses,
            graph,
            links,
            items,
            abilities,
            choose,
        } => {
            let student = LearnerId::new(&student);
            let inputs = RecommendInputs {
                responses,
                graph,
                links,
                items,
                abilities,
            };
            match commands::run_recommend(config, &inputs, &student, choose.as_deref())? {
                RecommendOutcome::Candidates(plan) => {
                    emit(format, &plan.weakest, commands::render_weakest);
                    if matches!(format, OutputFormat::Text) {
                        println!("rerun with --choose <knowledge point> to rank its items");
                    }
                }
                RecommendOutcome::Ranked(rec) => {
                    emit(format, &rec, |rec| {
                        format!(
                            "knowledge point: {}\n{}",
                            rec.knowledge_point,
                            commands::render_ranked(&rec.items)
                        )
                    });
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }
    if cli.strict_outcomes {
        config.strict_outcomes = true;
    }

    let _log_guard = logging::init_tracing(&config);

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
