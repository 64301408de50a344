//! # Ironbasket
//!
//! **Market basket analysis** on a small partitioned batch engine: Apriori
//! frequent itemset mining, association rule mining and redundant rule
//! removal, each expressed as a map → combine → shuffle → reduce stage.
//!
//! ## Key Features
//!
//! - **Stage runtime** - one [`Stage`] trait, run sequentially or on rayon by a [`Runner`]
//! - **Secondary sort** - a stage's [`KeyOrdering`] sorts by one key and groups by a coarser one
//! - **Map-side combine** - counts are pre-summed per chunk before the shuffle
//! - **Checkpointed passes** - pass state is saved and reloaded between Apriori passes
//! - **Deterministic reports** - text outputs are sorted, independent of partitioning
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironbasket::{FileStateStore, MiningConfig, driver};
//!
//! # fn main() -> Result<(), ironbasket::MiningError> {
//! let mut config = MiningConfig::new("baskets.txt", "out", 0.02, 0.3);
//! config.max_pass = 4;
//! config.lift_filter = true;
//!
//! let summary = driver::run(&config, &config.runner(), &FileStateStore::new())?;
//! println!("{} rules kept", summary.rules_kept);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stages
//!
//! | stage                                  | key               | group key   |
//! |----------------------------------------|-------------------|-------------|
//! | [`ItemsetCountStage`] (one per pass)   | itemset           | itemset     |
//! | [`RuleMiningStage`]                    | antecedent        | antecedent  |
//! | [`RuleAggregationStage`]               | consequent + lift | consequent  |
//!
//! ## Module Overview
//!
//! - [`stage`] / [`runner`] / [`combiners`] - the execution engine
//! - [`itemset`] / [`transaction`] - data model and record parsing
//! - [`mining`] / [`state`] / [`checkpoint`] - Apriori passes and their persisted state
//! - [`rules`] / [`aggregate`] / [`report`] - rule generation, pruning and rendering
//! - [`io`] / [`config`] / [`driver`] - inputs, options and the end-to-end run
//! - [`testing`] - fixtures and brute-force reference counts

pub mod aggregate;
pub mod checkpoint;
pub mod combiners;
pub mod config;
pub mod driver;
pub mod error;
pub mod io;
pub mod itemset;
pub mod mining;
pub mod report;
pub mod rules;
pub mod runner;
pub mod stage;
pub mod state;
pub mod testing;
pub mod transaction;

// General re-exports
pub use aggregate::{RuleAggregationStage, aggregate_rules};
pub use checkpoint::{FileStateStore, MemoryStateStore, PostcardCodec, StateCodec, StateStore};
pub use combiners::{Combiner, SumCounts};
pub use config::MiningConfig;
pub use driver::RunSummary;
pub use error::{MiningError, MiningResult, StagePhase};
pub use itemset::Itemset;
pub use mining::{ItemsetCountStage, generate_candidates, mine_frequent_itemsets};
pub use rules::{AssociationRule, RuleMiningStage, RuleParams, mine_rules};
pub use runner::{ExecMode, Runner};
pub use stage::{Emitter, KeyOrdering, NaturalOrder, Stage, StageCounters, StageOutput};
pub use state::{ListPhase, PassState};
pub use transaction::{Transaction, parse_transaction};
