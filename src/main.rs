use anyhow::{Context, Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fc_league::config::{AppConfig, PlayoffSize, StoreBackend};
use fc_league::participants::{Participant, SqliteDirectory, rating_table};
use fc_league::store::{CsvStore, RecordStore, SqliteStore};
use fc_league::{Engine, Outcome, Response, Score, TournamentKey};

const USAGE: &str = "usage: fc_league [--league TAG] [--season N] [--json] <command> [args]

commands:
  stage                               current stage of the tournament
  groups [COUNT]                      draw the group stage
  playoff [PAIRS|auto]                draw the playoff bracket
  record ID_A ID_B G_A:G_B            record a result
  report REPORTER_ID WORDS...         record a free-text report (\"won @bob 2:0\")
  status [PARTICIPANT_ID]             group tables or playoff schedule
  summary                             medal winners of a finished tournament
  register ID HANDLE RATE LEAGUE      add a participant
  rating ID HANDLE RATE               update a participant's rating
  ratings                             league rating table";

struct Cli {
    league: Option<String>,
    season: Option<u32>,
    json: bool,
    command: Vec<String>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args(std::env::args().skip(1).collect());
    let Some(name) = cli.command.first().cloned() else {
        println!("{USAGE}");
        return Ok(());
    };
    let args = &cli.command[1..];

    let config = AppConfig::from_env().context("unable to resolve data directory")?;
    let key = TournamentKey::new(
        cli.league.clone().unwrap_or_else(|| config.league.clone()),
        cli.season.unwrap_or(config.season),
    );
    let directory = SqliteDirectory::open(&config.directory_path)?;

    match name.as_str() {
        "register" => {
            let [id, handle, rate, league] = args else {
                return Err(anyhow!("register needs ID HANDLE RATE LEAGUE"));
            };
            let rate = rate.parse::<i64>().context("rate must be an integer")?;
            directory.upsert(&Participant::new(id, handle, rate, league))?;
            println!("Participant @{handle} registered in {league}");
            return Ok(());
        }
        "rating" => {
            let [id, handle, rate] = args else {
                return Err(anyhow!("rating needs ID HANDLE RATE"));
            };
            let rate = rate.parse::<i64>().context("rate must be an integer")?;
            println!("{}", directory.update_rating(id, handle, rate)?);
            return Ok(());
        }
        "ratings" => {
            println!("{}", rating_table(&directory.all()?));
            return Ok(());
        }
        _ => {}
    }

    let store = open_store(&config.backend)?;
    info!(%key, backend = ?config.backend, "engine ready");
    let engine = Engine::new(store, directory, config.engine);

    let response = match name.as_str() {
        "stage" => engine.stage(&key),
        "groups" => {
            let count = match args.first() {
                Some(raw) => Some(raw.parse::<usize>().context("group count must be a number")?),
                None => None,
            };
            engine.start_group_stage(&key, count)
        }
        "playoff" => {
            let size = match args.first() {
                Some(raw) => PlayoffSize::parse(raw).context("playoff size must be a number or auto")?,
                None => config.playoff_size,
            };
            engine.start_playoff(&key, size)
        }
        "record" => {
            let [a, b, score] = args else {
                return Err(anyhow!("record needs ID_A ID_B G_A:G_B"));
            };
            let score = Score::parse(score).context("score must look like 2:1")?;
            engine.record_result(&key, a, b, score)
        }
        "report" => {
            let Some((reporter, words)) = args.split_first() else {
                return Err(anyhow!("report needs REPORTER_ID WORDS..."));
            };
            let tokens: Vec<String> = words
                .iter()
                .flat_map(|w| w.split_whitespace())
                .map(str::to_lowercase)
                .collect();
            engine.report_result(&key, reporter, &tokens)
        }
        "status" => engine.status(&key, args.first().map(String::as_str)),
        "summary" => engine.summary(&key),
        other => return Err(anyhow!("unknown command {other:?}\n\n{USAGE}")),
    };

    print_response(&response, cli.json)
}

fn print_response(response: &Response, json: bool) -> Result<()> {
    if json {
        let raw = serde_json::to_string_pretty(response).context("serialize response")?;
        println!("{raw}");
    } else {
        println!("{}", response.text());
    }
    match &response.outcome {
        Outcome::Failed(text) => Err(anyhow!("{text}")),
        _ => Ok(()),
    }
}

fn open_store(backend: &StoreBackend) -> Result<Box<dyn RecordStore>> {
    Ok(match backend {
        StoreBackend::Sqlite(path) => Box::new(SqliteStore::open(path)?),
        StoreBackend::Csv(dir) => Box::new(CsvStore::new(dir.clone())),
    })
}

fn parse_args(args: Vec<String>) -> Cli {
    let mut cli = Cli {
        league: None,
        season: None,
        json: false,
        command: Vec::new(),
    };
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if let Some(raw) = arg.strip_prefix("--league=") {
            cli.league = Some(raw.trim().to_string());
        } else if arg == "--league" {
            cli.league = iter.next();
        } else if let Some(raw) = arg.strip_prefix("--season=") {
            cli.season = raw.trim().parse().ok();
        } else if arg == "--season" {
            cli.season = iter.next().and_then(|raw| raw.trim().parse().ok());
        } else if arg == "--json" {
            cli.json = true;
        } else {
            cli.command.push(arg);
            cli.command.extend(iter.by_ref());
        }
    }
    cli
}
