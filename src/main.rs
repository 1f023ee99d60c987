use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use dictserver::{router, AppState, SharedStore};
use webster_dict::DictFile;
use webster_lookup::StoreExt;
use webster_types::{Store, Word};

const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[derive(Parser)]
#[command(name = "dictserver")]
#[command(about = "Webster's Unabridged Dictionary (1913) tools and server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the dictionary source text into a dict file.
    Parse {
        /// Plain-text dictionary source.
        input: PathBuf,
        /// Dict file to create (overwritten if present).
        output: PathBuf,
    },
    /// Check every record in a dict file.
    Verify {
        dict: PathBuf,
    },
    /// Look up one word and print the entry.
    Lookup {
        dict: PathBuf,
        word: String,
    },
    /// Serve lookups over HTTP.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: SocketAddr,
        dict: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    match Cli::parse().command {
        Commands::Parse { input, output } => parse(&input, &output),
        Commands::Verify { dict } => verify(&dict),
        Commands::Lookup { dict, word } => lookup(&dict, &word),
        Commands::Serve { addr, dict } => serve(addr, &dict).await,
    }
}

fn parse(input: &PathBuf, output: &PathBuf) -> anyhow::Result<()> {
    let start = Instant::now();
    let wm = webster_parse::parse_path(input)
        .with_context(|| format!("could not parse dictionary {}", input.display()))?;
    info!("parse finished in {} ms", start.elapsed().as_millis());

    webster_dict::create(&wm, output)
        .with_context(|| format!("could not export dictionary to {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(())
}

fn verify(dict: &PathBuf) -> anyhow::Result<()> {
    let dict = open_dict(dict)?;
    dict.verify().context("verification failed")?;
    info!("dictionary is consistent");
    Ok(())
}

fn lookup(dict: &PathBuf, word: &str) -> anyhow::Result<()> {
    let dict = open_dict(dict)?;
    match dict.lookup_word(word).context("error looking up word")? {
        Some(words) => {
            for word in &words {
                print_word(word);
            }
        }
        None => println!("{}: word not in dictionary", word.to_uppercase()),
    }
    Ok(())
}

async fn serve(addr: SocketAddr, dict: &PathBuf) -> anyhow::Result<()> {
    let dict = open_dict(dict)?;
    let store: SharedStore = Arc::new(dict);

    let app = router(AppState { store }).layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn open_dict(path: &PathBuf) -> anyhow::Result<DictFile> {
    let start = Instant::now();
    let dict = DictFile::open(path)
        .with_context(|| format!("could not open dictionary {}", path.display()))?;
    info!(
        "loaded {} entries in {} ms",
        dict.num_words(),
        start.elapsed().as_millis()
    );
    Ok(dict)
}

fn print_word(word: &Word) {
    let mut headline = word.word.clone();
    for alt in &word.alternates {
        headline.push_str(", ");
        headline.push_str(alt);
    }
    println!("\n{}:", headline.to_uppercase());
    if !word.info.is_empty() {
        println!("{}", word.info);
    }
    if !word.etymology.is_empty() {
        println!("{}", word.etymology);
    }
    for (i, meaning) in word.meanings.iter().enumerate() {
        println!("\n {}. {}", i + 1, meaning.text);
        if !meaning.example.is_empty() {
            println!("    Example: {}", meaning.example);
        }
    }
    for note in &word.notes {
        println!("\nNote: {note}");
    }
    if !word.extra.is_empty() {
        println!("\nExtra: {:?}", word.extra);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
