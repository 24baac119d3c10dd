//! kvlite CLI
//!
//! Command-line administration for a kvlite database file.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use kvlite::{CheckpointMode, ColumnFamily, Config, JournalMode, KvError, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// kvlite CLI
#[derive(Parser, Debug)]
#[command(name = "kvlite-cli")]
#[command(about = "Inspect and edit a kvlite database")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long)]
    db: PathBuf,

    /// Journal mode used when the database is opened
    #[arg(short, long, value_enum, default_value = "wal")]
    journal: Journal,

    /// Retry for this long when another connection is writing (ms)
    #[arg(long, default_value = "1000")]
    busy_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Journal {
    Wal,
    Delete,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Passive,
    Full,
    Restart,
    Truncate,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        key: String,

        /// Column family
        #[arg(long, default_value = "default")]
        cf: String,
    },

    /// Set a key-value pair
    Put {
        key: String,
        value: String,

        /// Expire the key this many milliseconds from now
        #[arg(long)]
        ttl_ms: Option<i64>,

        #[arg(long, default_value = "default")]
        cf: String,
    },

    /// Delete a key
    Del {
        key: String,

        #[arg(long, default_value = "default")]
        cf: String,
    },

    /// List keys and values in order
    Scan {
        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long, default_value = "default")]
        cf: String,
    },

    /// List column families
    CfList,

    /// Create a column family
    CfCreate { name: String },

    /// Drop a column family and its TTL indexes
    CfDrop { name: String },

    /// Delete expired keys
    Purge {
        #[arg(long, default_value = "default")]
        cf: String,
    },

    /// Checkpoint the write-ahead log
    Checkpoint {
        #[arg(long, value_enum, default_value = "passive")]
        mode: Mode,
    },

    /// Run the integrity check
    Check,

    /// Show operation counters for this session
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kvlite=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let journal_mode = match args.journal {
        Journal::Wal => JournalMode::Wal,
        Journal::Delete => JournalMode::Delete,
    };
    let config = Config::builder()
        .journal_mode(journal_mode)
        .busy_timeout_ms(args.busy_timeout_ms)
        .build();

    let store = match Store::open(&args.db, config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.db.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&store, args.command) {
        eprintln!("error ({}): {}", e.code(), e);
        std::process::exit(1);
    }
}

fn run(store: &Store, command: Commands) -> Result<(), KvError> {
    match command {
        Commands::Get { key, cf } => {
            let (value, remaining) = open_cf(store, &cf)?.get_with_ttl(key.as_bytes())?;
            if remaining == kvlite::NO_TTL {
                println!("{}", String::from_utf8_lossy(&value));
            } else {
                println!("{}\t(ttl {} ms)", String::from_utf8_lossy(&value), remaining);
            }
        }
        Commands::Put { key, value, ttl_ms, cf } => {
            let cf = open_cf(store, &cf)?;
            match ttl_ms {
                Some(ttl) => {
                    cf.put_with_ttl(key.as_bytes(), value.as_bytes(), kvlite::now_ms() + ttl)?
                }
                None => cf.put(key.as_bytes(), value.as_bytes())?,
            }
            println!("OK");
        }
        Commands::Del { key, cf } => {
            open_cf(store, &cf)?.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan { prefix, cf } => {
            let cf = open_cf(store, &cf)?;
            let mut iter = match &prefix {
                Some(prefix) => cf.prefix_iter(prefix.as_bytes())?,
                None => {
                    let mut iter = cf.iter()?;
                    iter.first()?;
                    iter
                }
            };
            let mut count = 0;
            while !iter.eof() {
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(iter.key()?),
                    String::from_utf8_lossy(iter.value()?)
                );
                count += 1;
                iter.next()?;
            }
            eprintln!("({} entries)", count);
        }
        Commands::CfList => {
            for name in store.cf_list()? {
                println!("{}", name);
            }
        }
        Commands::CfCreate { name } => {
            store.cf_create(&name)?;
            println!("OK");
        }
        Commands::CfDrop { name } => {
            store.cf_drop(&name)?;
            println!("OK");
        }
        Commands::Purge { cf } => {
            let purged = open_cf(store, &cf)?.purge_expired()?;
            println!("purged {} expired keys", purged);
        }
        Commands::Checkpoint { mode } => {
            let mode = match mode {
                Mode::Passive => CheckpointMode::Passive,
                Mode::Full => CheckpointMode::Full,
                Mode::Restart => CheckpointMode::Restart,
                Mode::Truncate => CheckpointMode::Truncate,
            };
            let (log, done) = store.checkpoint(mode)?;
            println!("log frames: {}, checkpointed: {}", log, done);
        }
        Commands::Check => {
            store.integrity_check()?;
            println!("ok");
        }
        Commands::Stats => println!("{}", store.stats()),
    }
    Ok(())
}

fn open_cf(store: &Store, name: &str) -> Result<ColumnFamily, KvError> {
    store.cf_open(name)
}
