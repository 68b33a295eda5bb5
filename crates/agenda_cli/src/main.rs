//! Smoke-check CLI for the agenda core.
//!
//! # Responsibility
//! - Verify `agenda_core` linkage and configuration from a shell.
//! - Run the wire decoder and scoped listings without an HTTP layer.
//!
//! Usage:
//! - `agenda_cli` or `agenda_cli ping`
//! - `agenda_cli check '<item json>'`
//! - `agenda_cli list <social_id> [meeting_id]`

use agenda_core::{
    core_version, decode_item, encode_item, ping, CallerContext, CoreConfig, ItemService,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> CliResult {
    let config = CoreConfig::from_env()?;
    config.init_logging()?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["ping"] | ["version"] => {
            println!("agenda_core ping={}", ping());
            println!("agenda_core version={}", core_version());
            Ok(())
        }
        ["check", payload] => check(payload),
        ["list", social_id] => list(&config, social_id, None),
        ["list", social_id, meeting_id] => list(&config, social_id, Some(*meeting_id)),
        _ => Err(format!("unrecognised arguments: {}", args.join(" ")).into()),
    }
}

/// Decodes one payload and prints its normalized encoding.
fn check(payload: &str) -> CliResult {
    let decoded = decode_item(payload.as_bytes())?;
    let kind = decoded.kind();
    let item = decoded.into_item_or(Uuid::new_v4);
    item.validate()?;
    println!("kind={kind}");
    println!("{}", String::from_utf8(encode_item(&item)?)?);
    Ok(())
}

/// Prints every visible item, one JSON object per line.
fn list(config: &CoreConfig, social_id: &str, meeting_id: Option<&str>) -> CliResult {
    let conn = config.open_db()?;
    let service = ItemService::try_new(&conn)?;
    let caller = CallerContext::new(social_id);

    let items = match meeting_id {
        Some(raw) => service.list_by_meeting(&caller, Uuid::parse_str(raw)?)?,
        None => service.list(&caller)?,
    };
    for item in &items {
        println!("{}", String::from_utf8(encode_item(item)?)?);
    }
    Ok(())
}
