use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Data directory holding the catalog CSV, the tagged-description
    /// corpus, downloaded models and vectors.bin.
    /// Defaults to $TOME_DATA_DIR, then ~/.local/share/tome
    #[clap(long, global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve recommendations over HTTP
    Daemon {
        #[clap(long, default_value = "127.0.0.1")]
        host: String,

        #[clap(long, default_value = "5000")]
        port: u16,
    },

    /// Print recommendations for a query as JSON
    Recommend {
        /// Free-text description of the book you want
        query: String,

        /// Category filter ("All" disables it)
        #[clap(short, long, default_value = "All")]
        category: String,

        /// Emotional tone to sort by: Happy, Surprising, Angry,
        /// Suspenseful, Sad, or All
        #[clap(short, long, default_value = "All")]
        tone: String,

        /// Override the number of results
        #[clap(long)]
        final_k: Option<usize>,
    },

    /// Print the category and tone vocabularies as JSON
    Categories {},

    /// Build or refresh the vector index, deriving the tagged-description
    /// corpus from the catalog if the file is absent, then exit
    Index {},
}
