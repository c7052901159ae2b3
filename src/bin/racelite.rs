use clap::{Parser, Subcommand};
use racelite::{Connection, QueryFacade, StoreConfig, cli as prog_cli, config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "racelite", version, about = "Race results store CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Defaults to $RACELITE_CONFIG, then ./racelite.toml")]
    config: Option<PathBuf>,
    #[arg(long, help = "Store endpoint: memory:// or file://<dir>. Takes precedence over config/env.")]
    url: Option<String>,
    #[arg(long, help = "Database name. Takes precedence over config/env.")]
    database: Option<String>,
    #[arg(long, help = "Collection name. Takes precedence over config/env.")]
    collection: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Delete every document in the collection")]
    Clear,
    #[command(about = "Insert the documents of a JSON array file")]
    Load {
        #[arg(help = "Path to a JSON file holding an array of objects")]
        file: PathBuf,
    },
    #[command(about = "Insert one JSON object, or every object of a JSON array")]
    Insert {
        #[arg(help = "Document JSON (e.g., {\"number\": 7, \"secs\": 61})")]
        json: String,
    },
    #[command(about = "Print every document matching a prototype as NDJSON")]
    All {
        #[arg(long, help = "Exact-match prototype JSON; all documents when omitted")]
        prototype: Option<String>,
    },
    #[command(about = "Count documents matching a prototype")]
    Count {
        #[arg(long, help = "Exact-match prototype JSON; all documents when omitted")]
        prototype: Option<String>,
    },
    #[command(name = "find-by-name", about = "Find racers by first and last name")]
    FindByName { first_name: String, last_name: String },
    #[command(about = "One page of a group's results ordered by time")]
    Group {
        group: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },
    #[command(about = "Results with time strictly between min and max")]
    Between {
        #[arg(allow_negative_numbers = true)]
        min: String,
        #[arg(allow_negative_numbers = true)]
        max: String,
    },
    #[command(name = "by-letter", about = "Racers whose last name starts with a letter, ordered by last name")]
    ByLetter {
        letter: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },
    #[command(name = "update-racer", about = "Replace the racer with the given _id")]
    UpdateRacer {
        #[arg(help = "Racer JSON including _id")]
        json: String,
    },
    #[command(name = "add-time", about = "Add seconds (possibly negative) to a racer's time")]
    AddTime {
        number: String,
        #[arg(allow_negative_numbers = true)]
        secs: String,
    },
}

impl From<Commands> for prog_cli::Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::Clear => Self::Clear,
            Commands::Load { file } => Self::Load { file },
            Commands::Insert { json } => Self::Insert { json },
            Commands::All { prototype } => Self::All { prototype },
            Commands::Count { prototype } => Self::Count { prototype },
            Commands::FindByName { first_name, last_name } => Self::FindByName { first_name, last_name },
            Commands::Group { group, offset, limit } => Self::Group { group, offset, limit },
            Commands::Between { min, max } => Self::Between { min, max },
            Commands::ByLetter { letter, offset, limit } => Self::ByLetter { letter, offset, limit },
            Commands::UpdateRacer { json } => Self::UpdateRacer { json },
            Commands::AddTime { number, secs } => Self::AddTime { number, secs },
        }
    }
}

fn run(cli: Cli) -> Result<(), racelite::DbError> {
    // Precedence: CLI > env > config file > defaults
    let cfg = StoreConfig::resolve(cli.config.as_deref(), &config::process_env)?
        .with_overrides(cli.url, cli.database, cli.collection);
    let conn = Connection::open(&cfg)?;
    let facade = QueryFacade::from_connection(&conn, &cfg.collection)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let r = prog_cli::run(&facade, cli.command.into(), &mut out);
    conn.close();
    r
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = racelite::init() {
        eprintln!("warning: logging disabled: {e}");
    }
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
