use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use arshif::{LocalEmbedder, ScoredResult, SearchEngine};
use arshif::{error, store::InMemoryStore};
use cli::{Cli, Command, SearchArgs, SuggestArgs};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("ARSHIF_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = InMemoryStore::load(&cli.corpus)?;
    let embedder = match &cli.model {
        Some(name) => LocalEmbedder::new(name),
        None => LocalEmbedder::default(),
    };
    let engine = SearchEngine::new(Arc::new(store), Box::new(embedder));

    match cli.command {
        Command::Index => {
            let indexed = engine.build_index()?;
            println!("Indexed {indexed} document(s)");
        }
        Command::Search(args) => cmd_search(&engine, &args)?,
        Command::Suggest(args) => cmd_suggest(&engine, &args)?,
        Command::Words(args) => cmd_words(&engine, &args),
    }

    Ok(())
}

fn cmd_search(engine: &SearchEngine, args: &SearchArgs) -> error::Result<()> {
    let results = engine.search(&args.query)?;

    if args.json {
        let suggestions = if args.suggestions {
            engine.word_suggestions(&args.query, 5)
        } else {
            Vec::new()
        };
        let payload = serde_json::json!({
            "query": args.query,
            "result_count": results.len(),
            "results": results,
            "suggestions": suggestions,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    print_results(&results);
    if args.suggestions {
        let words = engine.word_suggestions(&args.query, 5);
        if !words.is_empty() {
            println!("\nDid you mean: {}", words.join(", "));
        }
    }
    Ok(())
}

fn cmd_suggest(engine: &SearchEngine, args: &SuggestArgs) -> error::Result<()> {
    let results = engine.suggest(&args.query, args.count)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }
    Ok(())
}

fn cmd_words(engine: &SearchEngine, args: &SuggestArgs) {
    let words = engine.word_suggestions(&args.query, args.count);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&words).unwrap_or_else(|_| "[]".to_string())
        );
    } else {
        for word in words {
            println!("{word}");
        }
    }
}

fn print_results(results: &[ScoredResult]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        match r.score {
            Some(score) => println!("{:>3}. [{score:>4}] {} ({})", i + 1, r.name, r.url),
            None => println!("{:>3}. {} ({})", i + 1, r.name, r.url),
        }
    }
    println!("\n{} result(s)", results.len());
}
