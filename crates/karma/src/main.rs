// Karma - Agent Trust Scoring
// Copyright (C) 2025 Karma Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Karma - Trust scoring for on-chain AI agent wallets
//!
//! Operator CLI for the batch pipeline: `karma index` harvests registry
//! and payment events into the store, `karma score` runs the aggregation
//! and scoring pass and dispatches score-change webhooks.

use clap::{Args, Parser, Subcommand, ValueEnum};
use eyre::Result;
use karma_common::Chain;
use karma_indexer::ScanOptions;

mod cmd;

/// Command-line interface for Karma
#[derive(Debug, Parser)]
#[command(name = "karma")]
#[command(about = "Trust scoring pipeline for on-chain AI agent wallets")]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan chains for registry and payment events
    Index(IndexArgs),
    /// Aggregate signals, score wallets and dispatch webhooks
    Score(ScoreArgs),
}

/// Options for the indexer run
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Chain to scan
    #[arg(long, value_enum, default_value = "all")]
    pub chain: ChainArg,

    /// Default window in days when a scanner has no cursor yet
    #[arg(long)]
    pub days: Option<u64>,

    /// Cap on blocks scanned per scanner this run
    #[arg(long)]
    pub limit: Option<u64>,
}

/// Options for the scoring run
#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Rescore every wallet instead of only the dirty ones
    #[arg(long)]
    pub full: bool,

    /// Skip webhook dispatch after the pass
    #[arg(long)]
    pub skip_webhooks: bool,
}

/// Chain selection for the indexer
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChainArg {
    /// Ethereum mainnet
    Ethereum,
    /// Base
    Base,
    /// Arbitrum One
    Arbitrum,
    /// Every supported chain
    All,
}

impl ChainArg {
    fn chains(self) -> Vec<Chain> {
        match self {
            Self::Ethereum => vec![Chain::Ethereum],
            Self::Base => vec![Chain::Base],
            Self::Arbitrum => vec![Chain::Arbitrum],
            Self::All => Chain::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index(args) => {
            karma_common::logging::init_logging("karma-index", true)?;
            let config = karma_common::Config::from_env()?;
            let opts = ScanOptions { days: args.days, limit: args.limit };
            cmd::index::run(&config, args.chain.chains(), opts).await
        }
        Commands::Score(args) => {
            karma_common::logging::init_logging("karma-score", true)?;
            let config = karma_common::Config::from_env()?;
            cmd::score::run(&config, args.full, args.skip_webhooks).await
        }
    }
}
