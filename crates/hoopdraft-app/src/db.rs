// SQLite persistence for bots, finished games and the leaderboard.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use hoopdraft_core::draft::state::BotProfile;
use hoopdraft_core::record::{BotDirectory, GameRecord, GameRecordSink, LeaderboardEntry};

/// Leaderboard length when none is configured.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub game_id: i64,
    pub bot_id: String,
    pub bot_name: String,
    pub score: f64,
    pub recorded_at: String,
}

/// One stored game, without its log and events.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub id: i64,
    pub status: String,
    pub bot1_name: String,
    pub bot2_name: String,
    pub bot1_score: Option<f64>,
    pub bot2_score: Option<f64>,
    pub winner: Option<String>,
    pub finished_at: String,
}

/// SQLite-backed store. Also serves as the bot directory and the game
/// record sink for the match runner.
pub struct Database {
    conn: Mutex<Connection>,
    leaderboard_size: usize,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS bots (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                strategy   TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS games (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                seed         INTEGER,
                status       TEXT NOT NULL,
                bot1_id      TEXT NOT NULL,
                bot1_name    TEXT NOT NULL,
                bot2_id      TEXT NOT NULL,
                bot2_name    TEXT NOT NULL,
                bot1_balance INTEGER NOT NULL,
                bot2_balance INTEGER NOT NULL,
                bot1_score   REAL,
                bot2_score   REAL,
                winner       TEXT,
                pool         TEXT NOT NULL,
                log          TEXT NOT NULL,
                events       TEXT NOT NULL,
                started_at   TEXT NOT NULL,
                finished_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS game_picks (
                game_id        INTEGER NOT NULL REFERENCES games(id),
                bot_id         TEXT NOT NULL,
                seat           TEXT NOT NULL,
                player_id      INTEGER NOT NULL,
                player_name    TEXT NOT NULL,
                fantasy_points REAL NOT NULL,
                price          INTEGER NOT NULL,
                order_index    INTEGER NOT NULL,
                PRIMARY KEY (game_id, order_index)
            );

            CREATE TABLE IF NOT EXISTS leaderboard (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id     INTEGER NOT NULL REFERENCES games(id),
                bot_id      TEXT NOT NULL,
                bot_name    TEXT NOT NULL,
                score       REAL NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_leaderboard_score ON leaderboard(score DESC, id ASC);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
        })
    }

    /// Keep at most `size` leaderboard rows.
    pub fn with_leaderboard_size(mut self, size: usize) -> Self {
        self.leaderboard_size = size.max(1);
        self
    }

    /// Acquire the connection lock. Panics only if a previous holder
    /// panicked, which is a bug.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Bots
    // ------------------------------------------------------------------

    /// Insert a bot, or replace the name and strategy of an existing one.
    pub fn add_bot(&self, bot: &BotProfile) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO bots (id, name, strategy) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name     = excluded.name,
                strategy = excluded.strategy",
            params![bot.id, bot.name, bot.strategy],
        )
        .with_context(|| format!("failed to save bot {}", bot.id))?;
        info!("saved bot {} ({})", bot.id, bot.name);
        Ok(())
    }

    /// All bots, oldest first.
    pub fn list_bots(&self) -> Result<Vec<BotProfile>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, strategy FROM bots ORDER BY created_at, id")
            .context("failed to prepare list_bots query")?;
        let bots = stmt
            .query_map([], |row| {
                Ok(BotProfile {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    strategy: row.get(2)?,
                })
            })
            .context("failed to query bots")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map bot rows")?;
        Ok(bots)
    }

    // ------------------------------------------------------------------
    // Leaderboard
    // ------------------------------------------------------------------

    /// Leaderboard rows, best first. Equal scores keep recording order.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_id, bot_id, bot_name, score, recorded_at
                 FROM leaderboard ORDER BY score DESC, id ASC LIMIT ?1",
            )
            .context("failed to prepare leaderboard query")?;
        let rows = stmt
            .query_map(params![self.leaderboard_size as i64], |row| {
                Ok(LeaderboardRow {
                    game_id: row.get(0)?,
                    bot_id: row.get(1)?,
                    bot_name: row.get(2)?,
                    score: row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })
            .context("failed to query leaderboard")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map leaderboard rows")?;
        Ok(rows)
    }

    /// The most recently stored games, newest first.
    pub fn recent_games(&self, limit: usize) -> Result<Vec<GameSummary>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, status, bot1_name, bot2_name, bot1_score, bot2_score, winner, finished_at
                 FROM games ORDER BY id DESC LIMIT ?1",
            )
            .context("failed to prepare recent_games query")?;
        let games = stmt
            .query_map(params![limit as i64], |row| {
                Ok(GameSummary {
                    id: row.get(0)?,
                    status: row.get(1)?,
                    bot1_name: row.get(2)?,
                    bot2_name: row.get(3)?,
                    bot1_score: row.get(4)?,
                    bot2_score: row.get(5)?,
                    winner: row.get(6)?,
                    finished_at: row.get(7)?,
                })
            })
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;
        Ok(games)
    }
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

impl BotDirectory for Database {
    fn bot(&self, id: &str) -> Result<Option<BotProfile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, strategy FROM bots WHERE id = ?1",
            params![id],
            |row| {
                Ok(BotProfile {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    strategy: row.get(2)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to look up bot {id}"))
    }
}

impl GameRecordSink for Database {
    fn save_game(&self, record: &GameRecord) -> Result<i64> {
        let pool = serde_json::to_string(&record.pool).context("failed to serialize pool")?;
        let log = serde_json::to_string(&record.log).context("failed to serialize log")?;
        let events =
            serde_json::to_string(&record.events).context("failed to serialize events")?;

        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin save_game transaction")?;

        tx.execute(
            "INSERT INTO games (
                seed, status,
                bot1_id, bot1_name, bot2_id, bot2_name,
                bot1_balance, bot2_balance, bot1_score, bot2_score, winner,
                pool, log, events, started_at, finished_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                // Stored bit-for-bit; SQLite integers are signed.
                record.seed.map(|s| s as i64),
                record.status.as_str(),
                record.bot1.bot.id,
                record.bot1.bot.name,
                record.bot2.bot.id,
                record.bot2.bot.name,
                record.bot1.final_balance,
                record.bot2.final_balance,
                record.bot1.score,
                record.bot2.score,
                record.winner.map(|s| s.as_str()),
                pool,
                log,
                events,
                record.started_at.to_rfc3339(),
                record.finished_at.to_rfc3339(),
            ],
        )
        .context("failed to insert game")?;
        let game_id = tx.last_insert_rowid();

        for result in [&record.bot1, &record.bot2] {
            for pick in &result.roster {
                tx.execute(
                    "INSERT INTO game_picks (
                        game_id, bot_id, seat, player_id, player_name,
                        fantasy_points, price, order_index
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        game_id,
                        result.bot.id,
                        result.seat.as_str(),
                        pick.player_id as i64,
                        pick.player_name,
                        pick.fantasy_points,
                        pick.price,
                        pick.order_index,
                    ],
                )
                .context("failed to insert game pick")?;
            }
        }

        tx.commit().context("failed to commit save_game")?;
        info!(
            game_id,
            status = record.status.as_str(),
            "saved game {} vs {}",
            record.bot1.bot.name,
            record.bot2.bot.name
        );
        Ok(game_id)
    }

    fn record_leaderboard(&self, game_id: i64, entry: &LeaderboardEntry) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin leaderboard transaction")?;
        tx.execute(
            "INSERT INTO leaderboard (game_id, bot_id, bot_name, score) VALUES (?1, ?2, ?3, ?4)",
            params![game_id, entry.bot_id, entry.bot_name, entry.score],
        )
        .context("failed to insert leaderboard entry")?;
        let trimmed = tx
            .execute(
                "DELETE FROM leaderboard WHERE id NOT IN (
                    SELECT id FROM leaderboard ORDER BY score DESC, id ASC LIMIT ?1
                 )",
                params![self.leaderboard_size as i64],
            )
            .context("failed to trim leaderboard")?;
        tx.commit().context("failed to commit leaderboard entry")?;
        debug!(game_id, trimmed, "leaderboard updated");
        Ok(())
    }
}
