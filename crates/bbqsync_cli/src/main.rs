//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire configuration, logging, the SQLite store and one sync engine.
//! - Offer quick-add, export and a settlement summary for local checks.
//!
//! Usage: `bbqsync_cli [--room <id> | --room=<id> | ?room=<id>] [summary | add <text> | export]`

use bbqsync_core::{
    core_version, format_currency, init_logging_from_config, open_db, CoreConfig, IntentOutcome,
    ListKind, LocalIntent, RoomId, SettlementOutcome, SqliteRoomRepository, Standing, SyncEngine,
};
use log::info;
use std::process::ExitCode;
use std::sync::Arc;

enum Command {
    Summary,
    Add(String),
    Export,
}

struct Args {
    room: Option<RoomId>,
    command: Command,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut room = None;
    let mut rest = Vec::new();
    while let Some(arg) = raw.next() {
        if arg == "--room" {
            let value = raw.next().ok_or("--room needs a value")?;
            room = Some(RoomId::parse(Some(&value)));
        } else if let Some(value) = arg.strip_prefix("--room=") {
            room = Some(RoomId::parse(Some(value)));
        } else if arg.starts_with('?') {
            room = Some(RoomId::from_query(&arg));
        } else {
            rest.push(arg);
        }
    }

    let command = match rest.first().map(String::as_str) {
        None | Some("summary") => Command::Summary,
        Some("export") => Command::Export,
        Some("add") => Command::Add(rest[1..].join(" ")),
        Some(other) => return Err(format!("unknown command `{other}`")),
    };
    Ok(Args { room, command })
}

fn run(args: Args) -> Result<(), String> {
    let config = CoreConfig::from_env();
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let conn = open_db(&config.db_path).map_err(|err| format!("database open failed: {err}"))?;
    let repo = SqliteRoomRepository::try_new(conn)
        .map_err(|err| format!("room store init failed: {err}"))?;
    let mut engine = SyncEngine::new(Arc::new(repo));
    let room = args.room.unwrap_or(config.room_id);
    engine
        .attach(room)
        .map_err(|err| format!("attach failed: {err}"))?;
    engine.pump();
    info!(
        "event=cli_run module=cli status=start version={} client={}",
        core_version(),
        engine.client_id()
    );

    match args.command {
        Command::Summary => print_summary(&engine),
        Command::Export => {
            let document = engine.export();
            let text = document
                .to_json_pretty()
                .map_err(|err| format!("export encode failed: {err}"))?;
            eprintln!("suggested file name: {}", document.file_name());
            println!("{text}");
        }
        Command::Add(text) => {
            let outcome = engine
                .dispatch(LocalIntent::QuickAdd {
                    kind: ListKind::Checklist,
                    text,
                })
                .map_err(|err| format!("add failed: {err}"))?;
            if let IntentOutcome::Added(item) = outcome {
                println!("added {} x{} ({})", item.name, item.qty, item.id);
            }
            engine.pump();
            print_summary(&engine);
        }
    }
    Ok(())
}

fn print_summary(engine: &SyncEngine<SqliteRoomRepository>) {
    let derived = engine.derived();
    let stats = &derived.stats;
    println!("bbqsync {} room={}", core_version(), derived.room_id);
    println!(
        "checklist total={} done={} bought={} open={}",
        stats.checklist.total, stats.checklist.done, stats.checklist.bought, stats.checklist.open
    );
    println!(
        "wishlist total={} bought={} open={}",
        stats.wishlist.total, stats.wishlist.bought, stats.wishlist.open
    );
    println!("spent={}", format_currency(stats.total_spent));

    match &derived.settlement {
        SettlementOutcome::NoParticipants { total } => {
            println!("no participants yet; total={}", format_currency(*total));
        }
        SettlementOutcome::Settled(settlement) => {
            println!("fair share={}", format_currency(settlement.fair_share));
            for row in &settlement.balances {
                let standing = match row.standing() {
                    Standing::Receives => "receives",
                    Standing::Pays => "pays",
                    Standing::Even => "even",
                };
                println!(
                    "  {} paid={} {standing} {}",
                    row.name,
                    format_currency(row.paid),
                    format_currency(row.balance.abs())
                );
            }
            for transfer in &settlement.transfers {
                println!(
                    "  {} -> {} {}",
                    transfer.from,
                    transfer.to,
                    format_currency(transfer.amount)
                );
            }
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_args, Command};

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn defaults_to_summary_without_room() {
        let parsed = parse_args(args(&[])).unwrap();
        assert!(parsed.room.is_none());
        assert!(matches!(parsed.command, Command::Summary));
    }

    #[test]
    fn add_joins_remaining_words_and_reads_room_flag() {
        let parsed = parse_args(args(&["--room", "team/a", "add", "雞翼", "x20"])).unwrap();
        assert_eq!(parsed.room.unwrap().as_str(), "team-a");
        assert!(matches!(parsed.command, Command::Add(ref text) if text == "雞翼 x20"));
    }

    #[test]
    fn query_style_room_and_unknown_command() {
        let parsed = parse_args(args(&["?room=night+bbq", "export"])).unwrap();
        assert_eq!(parsed.room.unwrap().as_str(), "night bbq");
        assert!(parse_args(args(&["dance"])).is_err());
    }
}
