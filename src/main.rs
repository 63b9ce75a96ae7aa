use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use memoir::autobiography::{AuthorProfile, NarrativeCompiler};
use memoir::catalog::Catalog;
use memoir::config::{AppConfig, FallbackMode};
use memoir::interview::{
    FallbackResponder, FlowController, GenerativeFallback, InterviewService, PhrasePicker,
    RandomPhrasePicker, StaticFallback,
};
use memoir::llm::create_provider;
use memoir::store::LibSqlBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("📖 Memoir v{}", env!("CARGO_PKG_VERSION"));

    // ── Catalog ──────────────────────────────────────────────────────────
    let catalog = Arc::new(match &config.interview.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    });
    if config.topic_index >= catalog.len() {
        eprintln!(
            "Error: MEMOIR_TOPIC={} is out of range (catalog has {} topics)",
            config.topic_index,
            catalog.len()
        );
        std::process::exit(1);
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(LibSqlBackend::new_local(&config.db_path).await.unwrap_or_else(|e| {
        eprintln!(
            "Error: Failed to open database at {}: {}",
            config.db_path.display(),
            e
        );
        std::process::exit(1);
    }));
    eprintln!("   Database: {}", config.db_path.display());

    // ── Interview engine ─────────────────────────────────────────────────
    let llm = create_provider(&config.llm);
    let picker: Arc<dyn PhrasePicker> = Arc::new(RandomPhrasePicker::new());
    let static_fallback = StaticFallback::new(Arc::clone(&picker));
    let fallback: Arc<dyn FallbackResponder> = match (config.interview.fallback, &llm) {
        (FallbackMode::Generative, Some(llm)) => Arc::new(GenerativeFallback::new(
            Arc::clone(llm),
            static_fallback,
            config.interview.history_window,
        )),
        (FallbackMode::Generative, None) => {
            tracing::warn!("Generative fallback requested without a usable key, using static");
            Arc::new(static_fallback)
        }
        (FallbackMode::Static, _) => Arc::new(static_fallback),
    };
    eprintln!("   Fallback: {}", fallback.name());

    let controller = Arc::new(FlowController::new(
        Arc::clone(&catalog),
        db.clone(),
        picker,
        fallback,
    ));
    let compiler = NarrativeCompiler::new(llm, Arc::clone(&catalog));
    let service = InterviewService::new(
        controller,
        db,
        compiler,
        config.interview.history_window,
    );

    let author = AuthorProfile {
        full_name: config.author_name.clone(),
        birth_year: config.author_birth_year,
    };
    let user = config.user_id.as_str();
    let topic = config.topic_index;

    eprintln!("   User: {user}");
    eprintln!("   Topic: {} ({topic})", catalog.topics()[topic].title);
    eprintln!("   Commands: /progress /status /ready /book /quit\n");

    // A fresh topic is opened with a greeting; a resumed one repeats where it left off.
    let prompt = match service.last_exchange(user, topic).await? {
        Some(entry) => entry.system_utterance,
        None => service.handle_turn(user, topic, "").await?.reply.utterance,
    };
    println!("\n{prompt}\n");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    eprint!("> ");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };
        let line = line.trim();

        match line {
            "/quit" | "/exit" => break,
            "/progress" => match service.progress(user, topic).await {
                Ok(p) => eprintln!(
                    "{}: question {}/{} ({:.0}%), {} turns{}",
                    p.topic_title,
                    p.current_question_index,
                    p.total_questions,
                    p.progress_percent,
                    p.conversation_count,
                    if p.is_completed { ", completed" } else { "" }
                ),
                Err(e) => eprintln!("Error: {e}"),
            },
            "/status" => match service.status(user).await {
                Ok(status) => {
                    eprintln!(
                        "{} topics completed, {} turns; can compose: {}",
                        status.completed_topics, status.total_conversations, status.can_generate
                    );
                    for row in status.topics.iter().filter(|t| t.is_started) {
                        eprintln!(
                            "   topic {}: {} ({:.0}%, {} turns{})",
                            row.topic_index,
                            row.title,
                            row.progress_percent,
                            row.conversation_count,
                            if row.is_completed { ", completed" } else { "" }
                        );
                    }
                }
                Err(e) => eprintln!("Error: {e}"),
            },
            "/ready" => match service.readiness(user).await {
                Ok(report) => {
                    eprintln!(
                        "{} topics, {} words, {} sufficient; ready: {}",
                        report.topics_covered,
                        report.total_words,
                        report.sufficient_topics(),
                        report.is_ready
                    );
                    for (index, topic) in &report.per_topic {
                        eprintln!("   topic {index}: {:.0}% ({} turns, {} words)", topic.adequacy, topic.turns, topic.words);
                    }
                }
                Err(e) => eprintln!("Error: {e}"),
            },
            "/book" => match service.compose_autobiography(user, &author).await {
                Ok(book) => {
                    if !book.synthesized {
                        eprintln!("(prose synthesis unavailable, printing transcript draft)");
                    }
                    println!("\n{}\n", book.text);
                }
                Err(e) => eprintln!("Error: {e}"),
            },
            _ => match service.handle_turn(user, topic, line).await {
                Ok(outcome) => println!("\n{}\n", outcome.reply.utterance),
                Err(e) => eprintln!("Error: {e}"),
            },
        }
        eprint!("> ");
    }

    eprintln!("Goodbye.");
    Ok(())
}

/// Console logging filtered by `RUST_LOG`, plus a daily log file when `MEMOIR_LOG_DIR` is set.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "memoir.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}
