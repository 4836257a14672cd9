use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use serde::Deserialize;
use tracing::warn;

use crate::preprocess::{MatchResult, classify_result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DEFAULT_DB_PATH: &str = "data/matches.sqlite";

/// One row of the international results snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub tournament: String,
    pub city: String,
    pub country: String,
    pub neutral: bool,
}

impl MatchRecord {
    /// `None` for fixtures that have not been played yet.
    pub fn result(&self) -> Option<MatchResult> {
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return None;
        };
        Some(classify_result(home, away))
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    home_team: String,
    away_team: String,
    home_score: String,
    away_score: String,
    #[serde(default)]
    tournament: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    neutral: String,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub rows_read: usize,
    pub rows_upserted: usize,
    /// Rows whose (date, home, away) key already appeared earlier in the
    /// batch; the later row overwrites the earlier one.
    pub merged_duplicates: usize,
    pub unscored: usize,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrainingRunRecord {
    pub started_at: String,
    pub source: String,
    pub raw_rows: usize,
    pub modern_rows: usize,
    pub train_rows: usize,
    pub eval_rows: usize,
    pub accuracy: f64,
    pub encoder_fingerprint: String,
    pub artifact_dir: String,
}

pub fn read_results_csv(path: &Path) -> Result<Vec<MatchRecord>> {
    let file = File::open(path).with_context(|| format!("open results csv {}", path.display()))?;
    parse_results_csv(file).with_context(|| format!("parse results csv {}", path.display()))
}

pub fn parse_results_csv<R: Read>(reader: R) -> Result<Vec<MatchRecord>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (idx, row) in csv.deserialize::<CsvRow>().enumerate() {
        // Header is line 1, so data row `idx` sits on line idx + 2.
        let line = idx + 2;
        let row = row.with_context(|| format!("decode csv line {line}"))?;
        out.push(record_from_row(row).with_context(|| format!("invalid csv line {line}"))?);
    }
    Ok(out)
}

fn record_from_row(row: CsvRow) -> Result<MatchRecord> {
    let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
        .with_context(|| format!("bad date '{}'", row.date))?;
    if row.home_team.is_empty() || row.away_team.is_empty() {
        return Err(anyhow!("empty team name"));
    }
    Ok(MatchRecord {
        date,
        home_team: row.home_team,
        away_team: row.away_team,
        home_score: parse_score(&row.home_score)?,
        away_score: parse_score(&row.away_score)?,
        tournament: row.tournament,
        city: row.city,
        country: row.country,
        neutral: parse_bool(&row.neutral)?,
    })
}

fn parse_score(raw: &str) -> Result<Option<u32>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .with_context(|| format!("bad score '{trimmed}'"))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(anyhow!("bad neutral flag '{other}'")),
    }
}

pub fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            tournament TEXT NOT NULL,
            city TEXT NOT NULL,
            country TEXT NOT NULL,
            neutral INTEGER NOT NULL,
            result INTEGER NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(date, home_team, away_team)
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            rows_read INTEGER NOT NULL,
            rows_upserted INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS training_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            source TEXT NOT NULL,
            raw_rows INTEGER NOT NULL,
            modern_rows INTEGER NOT NULL,
            train_rows INTEGER NOT NULL,
            eval_rows INTEGER NOT NULL,
            accuracy REAL NOT NULL,
            encoder_fingerprint TEXT NOT NULL,
            artifact_dir TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn ingest_records(
    conn: &mut Connection,
    db_path: PathBuf,
    source: &str,
    records: &[MatchRecord],
) -> Result<IngestSummary> {
    if records.is_empty() {
        return Err(anyhow!("no match records passed to ingest"));
    }

    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, rows_read, rows_upserted)
         VALUES (?1, NULL, ?2, ?3, 0)",
        params![started_at, source, records.len() as i64],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let tx = conn.transaction().context("begin ingest transaction")?;
    let mut rows_upserted = 0usize;
    let mut merged_duplicates = 0usize;
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert((record.date, record.home_team.as_str(), record.away_team.as_str())) {
            merged_duplicates += 1;
            warn!(
                date = %record.date,
                home = %record.home_team,
                away = %record.away_team,
                "duplicate fixture in batch; keeping the later row"
            );
        }
        upsert_match(&tx, record)?;
        rows_upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;

    conn.execute(
        "UPDATE ingest_runs SET finished_at = ?1, rows_upserted = ?2 WHERE run_id = ?3",
        params![Utc::now().to_rfc3339(), rows_upserted as i64, run_id],
    )
    .context("update ingest run")?;

    let (earliest_date, latest_date) = conn
        .query_row("SELECT MIN(date), MAX(date) FROM matches", [], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .context("query date range")?;

    Ok(IngestSummary {
        db_path,
        rows_read: records.len(),
        rows_upserted,
        merged_duplicates,
        unscored: records.iter().filter(|r| r.result().is_none()).count(),
        earliest_date,
        latest_date,
    })
}

pub fn load_records(conn: &Connection) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                date, home_team, away_team, home_score, away_score,
                tournament, city, country, neutral
            FROM matches
            ORDER BY date ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                MatchRecord {
                    date: NaiveDate::MIN,
                    home_team: row.get(1)?,
                    away_team: row.get(2)?,
                    home_score: row.get(3)?,
                    away_score: row.get(4)?,
                    tournament: row.get(5)?,
                    city: row.get(6)?,
                    country: row.get(7)?,
                    neutral: row.get::<_, i64>(8)? != 0,
                },
            ))
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        let (raw_date, mut record) = row.context("decode match row")?;
        record.date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
            .with_context(|| format!("bad stored date '{raw_date}'"))?;
        out.push(record);
    }
    Ok(out)
}

pub fn record_training_run(conn: &Connection, run: &TrainingRunRecord) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO training_runs (
            started_at, finished_at, source, raw_rows, modern_rows,
            train_rows, eval_rows, accuracy, encoder_fingerprint, artifact_dir
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            run.started_at,
            Utc::now().to_rfc3339(),
            run.source,
            run.raw_rows as i64,
            run.modern_rows as i64,
            run.train_rows as i64,
            run.eval_rows as i64,
            run.accuracy,
            run.encoder_fingerprint,
            run.artifact_dir,
        ],
    )
    .context("insert training run")?;
    Ok(conn.last_insert_rowid())
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &MatchRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            date, home_team, away_team, home_score, away_score,
            tournament, city, country, neutral, result, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(date, home_team, away_team) DO UPDATE SET
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            tournament = excluded.tournament,
            city = excluded.city,
            country = excluded.country,
            neutral = excluded.neutral,
            result = excluded.result,
            updated_at = excluded.updated_at
        "#,
        params![
            m.date.format(DATE_FORMAT).to_string(),
            m.home_team,
            m.away_team,
            m.home_score,
            m.away_score,
            m.tournament,
            m.city,
            m.country,
            bool_to_i64(m.neutral),
            m.result().map(|r| r.code() as i64),
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}
