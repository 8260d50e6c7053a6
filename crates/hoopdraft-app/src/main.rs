// hoopdraft entry point.
//
//   hoopdraft add-bot <id> <name> <strategy...>
//   hoopdraft bots
//   hoopdraft play <bot1_id> <bot2_id> [seed]
//   hoopdraft leaderboard
//   hoopdraft games
//
// stdout carries command output (the SSE stream for `play`); logs go to
// logs/hoopdraft.log.

use std::path::Path;

use anyhow::{bail, Context};
use tracing::{error, info};

use hoopdraft_app::config::{self, Config};
use hoopdraft_app::db::Database;
use hoopdraft_app::runner::{self, MatchRequest};
use hoopdraft_core::catalog::load_catalog;
use hoopdraft_core::draft::state::BotProfile;
use hoopdraft_llm::LlmAdvisor;

const USAGE: &str = "usage:
  hoopdraft add-bot <id> <name> <strategy...>
  hoopdraft bots
  hoopdraft play <bot1_id> <bot2_id> [seed]
  hoopdraft leaderboard
  hoopdraft games";

/// Games listed by `hoopdraft games`.
const RECENT_GAMES: usize = 20;

enum Command {
    AddBot(BotProfile),
    Bots,
    Play(MatchRequest),
    Leaderboard,
    Games,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [cmd, id, name, strategy @ ..] if cmd == "add-bot" && !strategy.is_empty() => {
            Ok(Command::AddBot(BotProfile {
                id: id.clone(),
                name: name.clone(),
                strategy: strategy.join(" "),
            }))
        }
        [cmd] if cmd == "bots" => Ok(Command::Bots),
        [cmd, bot1, bot2, rest @ ..] if cmd == "play" && rest.len() <= 1 => {
            let seed = match rest.first() {
                Some(s) => Some(s.parse::<u64>().with_context(|| format!("invalid seed `{s}`"))?),
                None => None,
            };
            Ok(Command::Play(MatchRequest {
                bot1_id: bot1.clone(),
                bot2_id: bot2.clone(),
                seed,
            }))
        }
        [cmd] if cmd == "leaderboard" => Ok(Command::Leaderboard),
        [cmd] if cmd == "games" => Ok(Command::Games),
        _ => bail!("{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    init_tracing()?;
    info!("hoopdraft starting up");

    let config = config::load_config().context("failed to load configuration")?;
    let db = open_database(&config)?;

    let result = match command {
        Command::AddBot(bot) => {
            db.add_bot(&bot)?;
            println!("saved bot {} ({})", bot.id, bot.name);
            Ok(())
        }
        Command::Bots => {
            for bot in db.list_bots()? {
                println!("{}\t{}\t{}", bot.id, bot.name, bot.strategy);
            }
            Ok(())
        }
        Command::Leaderboard => {
            for (rank, row) in db.leaderboard()?.iter().enumerate() {
                println!(
                    "{:>2}. {:<24} {:>7.1}  game {}  {}",
                    rank + 1,
                    row.bot_name,
                    row.score,
                    row.game_id,
                    row.recorded_at
                );
            }
            Ok(())
        }
        Command::Games => {
            for game in db.recent_games(RECENT_GAMES)? {
                let score = |s: Option<f64>| s.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
                println!(
                    "{:>4}  {:<9} {} {} vs {} {}  winner {}  {}",
                    game.id,
                    game.status,
                    game.bot1_name,
                    score(game.bot1_score),
                    game.bot2_name,
                    score(game.bot2_score),
                    game.winner.as_deref().unwrap_or("-"),
                    game.finished_at
                );
            }
            Ok(())
        }
        Command::Play(request) => play(&config, &db, request).await,
    };

    if let Err(e) = &result {
        error!("command failed: {:#}", e);
    }
    info!("hoopdraft shut down cleanly");
    result
}

async fn play(config: &Config, db: &Database, request: MatchRequest) -> anyhow::Result<()> {
    let catalog_path = Path::new(&config.app.catalog.path);
    let catalog = load_catalog(catalog_path, config.app.catalog.min_games)
        .with_context(|| format!("failed to load catalog from {}", catalog_path.display()))?;

    let advisor = LlmAdvisor::from_settings(
        &config.app.llm,
        config.credentials.anthropic_api_key.as_deref(),
    );
    if advisor.is_active() {
        info!("LLM advisor initialized (model {})", config.app.llm.model);
    } else {
        info!("LLM advisor disabled (no API key); every decision uses the fallback");
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = std::io::stdout().lock();
    let outcome = runner::play_match(
        db,
        &catalog,
        &config.rules,
        advisor,
        &request,
        &mut stdout,
        shutdown,
    )
    .await?;
    info!(
        "game {} finished with status {}",
        outcome.game_id,
        outcome.record.status.as_str()
    );
    Ok(())
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&path.to_string_lossy())
        .context("failed to open database")?
        .with_leaderboard_size(config.app.leaderboard.size);
    info!("Database opened at {}", path.display());
    Ok(db)
}

/// Initialize tracing to log to a file so stdout stays clean for output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("hoopdraft.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hoopdraft=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
