use anyhow::{Context, Result};
use clap::Parser;
use ironbasket::{FileStateStore, MiningConfig, driver};
use std::path::PathBuf;
use tracing::debug;

/// Market basket analysis: frequent itemsets and association rules.
#[derive(Parser, Debug)]
#[command(name = "ironbasket", version, about)]
struct Cli {
    /// Input file, directory or glob pattern, one transaction per line
    #[arg(required_unless_present = "config")]
    input: Option<PathBuf>,

    /// Output directory for every report
    #[arg(required_unless_present = "config")]
    output: Option<PathBuf>,

    /// Read all options from a JSON file instead
    #[arg(long, conflicts_with_all = ["input", "output"])]
    config: Option<PathBuf>,

    /// Minimum support, a fraction of all transactions
    #[arg(long, default_value_t = 0.01)]
    min_support: f64,

    /// Minimum rule confidence
    #[arg(long, default_value_t = 0.5)]
    min_confidence: f64,

    /// Total transaction count; defaults to the number of records read
    #[arg(long)]
    transactions: Option<u64>,

    /// Item delimiter inside a transaction, matched as a literal string
    /// (`::` splits on the pair, not on each colon)
    #[arg(long, default_value = ",")]
    delimiter: String,

    /// Maximum number of Apriori passes
    #[arg(long, default_value_t = 10)]
    max_pass: u32,

    /// Keep only rules with lift above 1
    #[arg(long)]
    lift_filter: bool,

    /// Shuffle partitions
    #[arg(long)]
    partitions: Option<usize>,

    /// Worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Where the pass state is checkpointed
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<MiningConfig> {
        if let Some(path) = &self.config {
            return MiningConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()));
        }
        let input = self.input.context("missing input path")?;
        let output = self.output.context("missing output path")?;
        let mut config =
            MiningConfig::new(input, output, self.min_support, self.min_confidence);
        config.transaction_count = self.transactions;
        config.item_delimiter = self.delimiter;
        config.max_pass = self.max_pass;
        config.lift_filter = self.lift_filter;
        config.partitions = self.partitions;
        config.threads = self.threads;
        config.state_path = self.state_path;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("ironbasket started with verbosity level: {}", cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    let runner = config.runner();
    let summary = driver::run(&config, &runner, &FileStateStore::new())?;
    println!(
        "{} frequent itemsets over {} passes, {} rules ({} after removing redundant ones) in {}",
        summary.frequent_itemsets,
        summary.passes,
        summary.rules_mined,
        summary.rules_kept,
        config.output_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delimiter_is_passed_through_literally() -> Result<()> {
        let cli = Cli::try_parse_from(["ironbasket", "in.txt", "out", "--delimiter", "::"])?;
        let config = cli.into_config()?;
        assert_eq!(config.item_delimiter, "::");
        // Counted by the driver from the records it reads.
        assert_eq!(config.transaction_count, None);
        Ok(())
    }

    #[test]
    fn explicit_transaction_count_is_kept() -> Result<()> {
        let cli = Cli::try_parse_from(["ironbasket", "in.txt", "out", "--transactions", "42"])?;
        assert_eq!(cli.into_config()?.transaction_count, Some(42));
        Ok(())
    }
}
