use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "arshif",
    about = "Hybrid Arabic/English search over a document archive"
)]
pub struct Cli {
    /// Path to the corpus file (a JSON array of document records)
    #[arg(long, global = true, default_value = "corpus.json")]
    pub corpus: PathBuf,

    /// Override the embedding model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the vector index and report corpus statistics
    Index,
    /// Rank documents against a query with the lexical matcher
    Search(SearchArgs),
    /// Semantic document suggestions from the vector index
    Suggest(SuggestArgs),
    /// Autocomplete-style word suggestions
    Words(SuggestArgs),
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Also print word suggestions under the ranked results
    #[arg(long)]
    pub suggestions: bool,
}

#[derive(Debug, Parser)]
pub struct SuggestArgs {
    /// The query text
    pub query: String,

    /// Number of suggestions to return
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
