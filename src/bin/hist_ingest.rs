use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use rift_winprob::config::AppConfig;
use rift_winprob::historical_dataset;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    rift_winprob::init_logging();

    let cfg = AppConfig::from_env();
    let dumps = parse_dump_args();
    if dumps.is_empty() {
        return Err(anyhow!("usage: hist_ingest [--db=PATH] DUMP.json [DUMP.json ...]"));
    }
    let db_path = parse_db_path_arg().unwrap_or(cfg.db_path);

    let mut conn = historical_dataset::open_db(&db_path)?;
    println!("Historical ingest");
    println!("DB: {}", db_path.display());

    let mut total_matches = 0usize;
    let mut total_players = 0usize;
    for dump in &dumps {
        let summary = historical_dataset::import_json_dump(&mut conn, dump)
            .with_context(|| format!("import {}", dump.display()))?;
        println!(
            "{}: run={} matches={} teams={} links={} players={}",
            dump.display(),
            summary.run_id,
            summary.matches_upserted,
            summary.team_rows_upserted,
            summary.summoner_rows_upserted,
            summary.player_rows_upserted
        );
        total_matches += summary.matches_upserted;
        total_players += summary.player_rows_upserted;
    }
    println!("Matches upserted: {total_matches}");
    println!("Player rows upserted: {total_players}");
    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn parse_dump_args() -> Vec<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--db" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        out.push(PathBuf::from(arg));
    }
    out
}
