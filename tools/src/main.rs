//! oncall-runner: headless driver for the on-call desk.
//!
//! Usage:
//!   oncall-runner --seed 12345 --month 2025-10 --db desk.db
//!   oncall-runner --db desk.db --data-dir ./data --ipc-mode
//!
//! IPC requests, one per line:
//!   {"type":"command","command":{"cmd":"generate","month":"2025-10"}}
//!   {"type":"snapshot"}
//!   {"type":"quit"}

use anyhow::{Context, Result};
use oncall_core::{
    command::DeskCommand,
    engine::{GenerationOutcome, OnCallDesk},
    store::ScheduleStore,
    synthetic::SyntheticTeam,
    types::YearMonth,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcRequest {
    Command {
        command: DeskCommand,
    },
    Snapshot,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let groups = parse_arg(&args, "--groups", 3usize);
    let per_group = parse_arg(&args, "--per-group", 4usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let month: YearMonth = string_arg(&args, "--month")
        .map(|m| m.parse::<YearMonth>().map_err(anyhow::Error::msg))
        .transpose()?
        .unwrap_or_else(|| YearMonth::of(chrono::Local::now().date_naive()));
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");

    if !ipc_mode {
        println!("On-call desk: oncall-runner");
        println!("  seed:      {seed}");
        println!("  month:     {month}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = ScheduleStore::open(db).with_context(|| format!("Cannot open {db}"))?;
    let desk = OnCallDesk::build(store, data_dir)?;

    if ipc_mode {
        run_ipc_loop(&desk)?;
    } else {
        if desk.engineers()?.is_empty() {
            let team = SyntheticTeam::new(seed);
            team.populate_roster(&desk, groups, per_group)?;
            team.add_holidays(&desk, month, 2)?;
            team.submit_preferences(&desk, month, 0.75)?;
        }
        let outcome = desk.generate_schedule(month)?;
        print_summary(&outcome);
    }

    Ok(())
}

/// One JSON request per stdin line, one JSON response per stdout line.
fn run_ipc_loop(desk: &OnCallDesk) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match request {
            IpcRequest::Quit => break,
            IpcRequest::Snapshot => desk
                .export_snapshot()
                .and_then(|s| Ok(serde_json::to_value(s)?)),
            IpcRequest::Command { command } => command.apply(desk),
        };
        let line = match response {
            Ok(value) => serde_json::json!({ "ok": value }),
            Err(e) => {
                log::warn!("ipc: command failed: {e}");
                serde_json::json!({ "error": e.to_string() })
            }
        };
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(outcome: &GenerationOutcome) {
    println!("=== SCHEDULE {} ===", outcome.month);
    match outcome.version {
        Some(v) => println!("  version:    {v}"),
        None => println!("  version:    (not committed)"),
    }
    println!("  status:     {:?}", outcome.status);
    println!("  assigned:   {}", outcome.assignments.len());
    println!("  unfilled:   {}", outcome.unfilled.len());
    println!();

    for a in &outcome.assignments {
        let marker = if a.kind.is_holiday() { " (holiday)" } else { "" };
        println!("  {}  {}{marker}", a.date, a.engineer_name);
    }
    for d in &outcome.unfilled {
        println!("  {d}  -- unfilled --");
    }

    println!();
    println!("=== FAIRNESS ===");
    for c in &outcome.report.shift_counts {
        let deficit = outcome.deficits.get(&c.engineer_id).copied().unwrap_or(0.0);
        println!(
            "  {:<24} shifts: {:>2}  holidays: {:>2}  deficit: {deficit:>7.2}",
            c.name, c.total, c.holidays
        );
    }
    if !outcome.report.discrepancies.is_empty() {
        println!();
        println!("=== PREFERENCE SHORTFALLS ===");
        for d in &outcome.report.discrepancies {
            println!(
                "  {:<24} requested {} / got {} preferred (short {})",
                d.name, d.requested, d.preferred_received, d.shortfall
            );
        }
    }
    if !outcome.report.missing_preferences.is_empty() {
        println!();
        println!("=== NO PREFERENCES SUBMITTED ===");
        for m in &outcome.report.missing_preferences {
            println!("  {}", m.name);
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
