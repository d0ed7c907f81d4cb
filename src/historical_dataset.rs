//! SQLite store for the historical match tables.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Row, params};
use tracing::info;

use crate::schema::{
    CLASSIC_QUEUE, MatchFilter, MatchRecord, PlayerStatRow, PlayerStats, RawTables,
    SummonerMatchRow, TeamMatchRow, TeamSideTotals,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub run_id: i64,
    pub matches_upserted: usize,
    pub team_rows_upserted: usize,
    pub summoner_rows_upserted: usize,
    pub player_rows_upserted: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)
        .with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            game_duration REAL NULL,
            queue_type TEXT NOT NULL,
            rank_tier INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_queue ON matches(queue_type);
        CREATE INDEX IF NOT EXISTS idx_matches_rank ON matches(rank_tier);

        CREATE TABLE IF NOT EXISTS team_matches (
            match_id INTEGER PRIMARY KEY,
            b1_champ INTEGER NOT NULL, b2_champ INTEGER NOT NULL, b3_champ INTEGER NOT NULL,
            b4_champ INTEGER NOT NULL, b5_champ INTEGER NOT NULL,
            r1_champ INTEGER NOT NULL, r2_champ INTEGER NOT NULL, r3_champ INTEGER NOT NULL,
            r4_champ INTEGER NOT NULL, r5_champ INTEGER NOT NULL,
            blue_kills REAL NULL, blue_deaths REAL NULL, blue_dragon_kills REAL NULL,
            blue_baron_kills REAL NULL, blue_tower_kills REAL NULL, blue_herald_kills REAL NULL,
            blue_inhib_kills REAL NULL,
            red_kills REAL NULL, red_deaths REAL NULL, red_dragon_kills REAL NULL,
            red_baron_kills REAL NULL, red_tower_kills REAL NULL, red_herald_kills REAL NULL,
            red_inhib_kills REAL NULL,
            blue_win INTEGER NULL,
            red_win INTEGER NULL
        );

        CREATE TABLE IF NOT EXISTS summoner_matches (
            summoner_match_id INTEGER PRIMARY KEY,
            match_id INTEGER NOT NULL,
            champion_id INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_summoner_matches_match ON summoner_matches(match_id);

        CREATE TABLE IF NOT EXISTS player_stats (
            summoner_match_id INTEGER PRIMARY KEY,
            kills REAL NULL,
            deaths REAL NULL,
            assists REAL NULL,
            total_gold REAL NULL,
            minions_killed REAL NULL,
            vision_score REAL NULL,
            champ_level REAL NULL,
            dragon_kills REAL NULL,
            baron_kills REAL NULL
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            matches_upserted INTEGER NOT NULL,
            team_rows_upserted INTEGER NOT NULL,
            summoner_rows_upserted INTEGER NOT NULL,
            player_rows_upserted INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Upserts every table and records its `ingest_runs` row in one transaction.
pub fn import_tables(
    conn: &mut Connection,
    raw: &RawTables,
    source: &str,
) -> Result<IngestSummary> {
    let tx = conn.transaction().context("begin ingest transaction")?;
    let started_at = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, matches_upserted,
             team_rows_upserted, summoner_rows_upserted, player_rows_upserted)
         VALUES (?1, NULL, ?2, 0, 0, 0, 0)",
        params![started_at, source],
    )
    .context("insert ingest run")?;
    let run_id = tx.last_insert_rowid();

    for m in &raw.matches {
        upsert_match(&tx, m)?;
    }
    for t in &raw.teams {
        upsert_team(&tx, t)?;
    }
    for s in &raw.summoner_matches {
        tx.execute(
            "INSERT INTO summoner_matches(summoner_match_id, match_id, champion_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(summoner_match_id) DO UPDATE SET
                match_id = excluded.match_id,
                champion_id = excluded.champion_id",
            params![
                s.summoner_match_id as i64,
                s.match_id as i64,
                s.champion_id as i64
            ],
        )
        .context("upsert summoner match")?;
    }
    for p in &raw.player_stats {
        upsert_player_stats(&tx, p)?;
    }

    let summary = IngestSummary {
        run_id,
        matches_upserted: raw.matches.len(),
        team_rows_upserted: raw.teams.len(),
        summoner_rows_upserted: raw.summoner_matches.len(),
        player_rows_upserted: raw.player_stats.len(),
    };
    tx.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, matches_upserted = ?2, team_rows_upserted = ?3,
             summoner_rows_upserted = ?4, player_rows_upserted = ?5
         WHERE run_id = ?6",
        params![
            Utc::now().to_rfc3339(),
            summary.matches_upserted as i64,
            summary.team_rows_upserted as i64,
            summary.summoner_rows_upserted as i64,
            summary.player_rows_upserted as i64,
            run_id
        ],
    )
    .context("update ingest run")?;
    tx.commit().context("commit ingest transaction")?;
    info!(
        run_id,
        source,
        matches = summary.matches_upserted,
        player_rows = summary.player_rows_upserted,
        "historical tables imported"
    );
    Ok(summary)
}

/// Imports a JSON document shaped like [`RawTables`].
pub fn import_json_dump(conn: &mut Connection, path: &Path) -> Result<IngestSummary> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let tables: RawTables =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    import_tables(conn, &tables, &path.display().to_string())
}

/// Eligible matches (CLASSIC queue, optional rank set) plus their joined
/// rows. Player rows with no join row come back too so the normalizer can
/// report them.
pub fn load_tables(conn: &Connection, filter: &MatchFilter) -> Result<RawTables> {
    let mut where_clause = format!("UPPER(TRIM(queue_type)) = '{CLASSIC_QUEUE}'");
    if let Some(tiers) = &filter.rank_tiers {
        let list = tiers
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        where_clause.push_str(&format!(" AND rank_tier IN ({list})"));
    }

    let matches = query_rows(
        conn,
        &format!(
            "SELECT match_id, game_duration, queue_type, rank_tier FROM matches
             WHERE {where_clause} ORDER BY match_id"
        ),
        |row| {
            Ok(MatchRecord {
                match_id: row.get::<_, u64>(0)?,
                game_duration: row.get(1)?,
                queue_type: row.get(2)?,
                rank_tier: row.get(3)?,
            })
        },
    )
    .context("load matches")?;

    let eligible = format!("SELECT match_id FROM matches WHERE {where_clause}");
    let teams = query_rows(
        conn,
        &format!(
            "SELECT match_id,
                b1_champ, b2_champ, b3_champ, b4_champ, b5_champ,
                r1_champ, r2_champ, r3_champ, r4_champ, r5_champ,
                blue_kills, blue_deaths, blue_dragon_kills, blue_baron_kills,
                blue_tower_kills, blue_herald_kills, blue_inhib_kills,
                red_kills, red_deaths, red_dragon_kills, red_baron_kills,
                red_tower_kills, red_herald_kills, red_inhib_kills,
                blue_win, red_win
             FROM team_matches WHERE match_id IN ({eligible}) ORDER BY match_id"
        ),
        decode_team_row,
    )
    .context("load team rows")?;

    let summoner_matches = query_rows(
        conn,
        &format!(
            "SELECT summoner_match_id, match_id, champion_id FROM summoner_matches
             WHERE match_id IN ({eligible}) ORDER BY summoner_match_id"
        ),
        |row| {
            Ok(SummonerMatchRow {
                summoner_match_id: row.get::<_, u64>(0)?,
                match_id: row.get::<_, u64>(1)?,
                champion_id: row.get::<_, u32>(2)?,
            })
        },
    )
    .context("load summoner matches")?;

    let player_stats = query_rows(
        conn,
        &format!(
            "SELECT p.summoner_match_id, p.kills, p.deaths, p.assists, p.total_gold,
                    p.minions_killed, p.vision_score, p.champ_level, p.dragon_kills, p.baron_kills
             FROM player_stats p
             LEFT JOIN summoner_matches s ON s.summoner_match_id = p.summoner_match_id
             WHERE s.match_id IS NULL OR s.match_id IN ({eligible})
             ORDER BY p.summoner_match_id"
        ),
        |row| {
            Ok(PlayerStatRow {
                summoner_match_id: row.get::<_, u64>(0)?,
                stats: PlayerStats {
                    kills: row.get(1)?,
                    deaths: row.get(2)?,
                    assists: row.get(3)?,
                    total_gold: row.get(4)?,
                    minions_killed: row.get(5)?,
                    vision_score: row.get(6)?,
                    champ_level: row.get(7)?,
                    dragon_kills: row.get(8)?,
                    baron_kills: row.get(9)?,
                },
            })
        },
    )
    .context("load player stats")?;

    Ok(RawTables {
        matches,
        teams,
        summoner_matches,
        player_stats,
    })
}

pub fn count_ingest_runs(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM ingest_runs", [], |row| row.get(0))
        .context("count ingest runs")
}

fn query_rows<T, F>(conn: &Connection, sql: &str, decode: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).context("prepare query")?;
    let rows = stmt.query_map([], decode).context("run query")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode row")?);
    }
    Ok(out)
}

fn decode_team_row(row: &Row<'_>) -> rusqlite::Result<TeamMatchRow> {
    let mut blue_roster = [0u32; 5];
    let mut red_roster = [0u32; 5];
    for i in 0..5 {
        blue_roster[i] = row.get::<_, u32>(1 + i)?;
        red_roster[i] = row.get::<_, u32>(6 + i)?;
    }
    let totals = |base: usize| -> rusqlite::Result<TeamSideTotals> {
        Ok(TeamSideTotals {
            kills: row.get(base)?,
            deaths: row.get(base + 1)?,
            dragon_kills: row.get(base + 2)?,
            baron_kills: row.get(base + 3)?,
            tower_kills: row.get(base + 4)?,
            herald_kills: row.get(base + 5)?,
            inhib_kills: row.get(base + 6)?,
        })
    };
    Ok(TeamMatchRow {
        match_id: row.get::<_, u64>(0)?,
        blue_roster,
        red_roster,
        blue: totals(11)?,
        red: totals(18)?,
        blue_win: row.get::<_, Option<i64>>(25)?.map(|v| v != 0),
        red_win: row.get::<_, Option<i64>>(26)?.map(|v| v != 0),
    })
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &MatchRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (match_id, game_duration, queue_type, rank_tier, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(match_id) DO UPDATE SET
            game_duration = excluded.game_duration,
            queue_type = excluded.queue_type,
            rank_tier = excluded.rank_tier,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id as i64,
            m.game_duration,
            m.queue_type,
            m.rank_tier.map(i64::from),
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

fn upsert_team(tx: &rusqlite::Transaction<'_>, t: &TeamMatchRow) -> Result<()> {
    let b = &t.blue_roster;
    let r = &t.red_roster;
    tx.execute(
        r#"
        INSERT OR REPLACE INTO team_matches (
            match_id,
            b1_champ, b2_champ, b3_champ, b4_champ, b5_champ,
            r1_champ, r2_champ, r3_champ, r4_champ, r5_champ,
            blue_kills, blue_deaths, blue_dragon_kills, blue_baron_kills,
            blue_tower_kills, blue_herald_kills, blue_inhib_kills,
            red_kills, red_deaths, red_dragon_kills, red_baron_kills,
            red_tower_kills, red_herald_kills, red_inhib_kills,
            blue_win, red_win
        ) VALUES (
            ?1,
            ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23, ?24, ?25,
            ?26, ?27
        )
        "#,
        params![
            t.match_id as i64,
            b[0] as i64,
            b[1] as i64,
            b[2] as i64,
            b[3] as i64,
            b[4] as i64,
            r[0] as i64,
            r[1] as i64,
            r[2] as i64,
            r[3] as i64,
            r[4] as i64,
            t.blue.kills,
            t.blue.deaths,
            t.blue.dragon_kills,
            t.blue.baron_kills,
            t.blue.tower_kills,
            t.blue.herald_kills,
            t.blue.inhib_kills,
            t.red.kills,
            t.red.deaths,
            t.red.dragon_kills,
            t.red.baron_kills,
            t.red.tower_kills,
            t.red.herald_kills,
            t.red.inhib_kills,
            t.blue_win.map(bool_to_i64),
            t.red_win.map(bool_to_i64),
        ],
    )
    .context("upsert team row")?;
    Ok(())
}

fn upsert_player_stats(tx: &rusqlite::Transaction<'_>, p: &PlayerStatRow) -> Result<()> {
    let s = &p.stats;
    tx.execute(
        r#"
        INSERT OR REPLACE INTO player_stats (
            summoner_match_id, kills, deaths, assists, total_gold, minions_killed,
            vision_score, champ_level, dragon_kills, baron_kills
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            p.summoner_match_id as i64,
            s.kills,
            s.deaths,
            s.assists,
            s.total_gold,
            s.minions_killed,
            s.vision_score,
            s.champ_level,
            s.dragon_kills,
            s.baron_kills,
        ],
    )
    .context("upsert player stats")?;
    Ok(())
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
