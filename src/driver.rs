//! End-to-end run: frequent itemsets, rule mining, rule aggregation.
//!
//! Output layout under the configured output directory:
//!
//! - `output-pass-<K>`: survivors of pass K
//! - `all-frequent-itemsets/freq-list`: the whole frequent table
//! - `rule-mining-output`: every rule that passed the thresholds
//! - `final-output`: the non-redundant rules as a table
//! - `summary.json`: run counters

use crate::aggregate::aggregate_rules;
use crate::checkpoint::StateStore;
use crate::config::MiningConfig;
use crate::error::{MiningError, MiningResult};
use crate::io::{read_records, write_lines};
use crate::itemset::Itemset;
use crate::mining::mine_frequent_itemsets;
use crate::report::{final_report_lines, frequent_itemset_lines, rule_line};
use crate::rules::{AssociationRule, RuleParams, mine_rules};
use crate::runner::Runner;
use crate::state::PassState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

pub const PASS_OUTPUT_PREFIX: &str = "output-pass-";
pub const FREQUENT_LIST: &str = "all-frequent-itemsets/freq-list";
pub const RULE_MINING_OUTPUT: &str = "rule-mining-output";
pub const FINAL_OUTPUT: &str = "final-output";
pub const SUMMARY_FILE: &str = "summary.json";

/// What a run produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub records_read: u64,
    pub transaction_count: u64,
    pub min_support_count: u64,
    pub passes: usize,
    /// Survivor count per pass, index 0 is pass 1.
    pub frequent_per_pass: Vec<usize>,
    pub frequent_itemsets: usize,
    pub rules_mined: usize,
    pub rules_kept: usize,
    pub skipped_records: u64,
    pub elapsed_ms: u64,
    #[serde(skip)]
    pub frequent: BTreeMap<Itemset, u64>,
    #[serde(skip)]
    pub rules: Vec<AssociationRule>,
}

/// Path of the pass-K output file.
#[must_use]
pub fn pass_output_path(output: &Path, pass: u32) -> PathBuf {
    output.join(format!("{PASS_OUTPUT_PREFIX}{pass}"))
}

/// Run every stage for `config`.
///
/// Ratios use `config.transaction_count` when set and the number of records
/// read otherwise.
///
/// Nothing is written to `final-output` unless every earlier stage succeeded.
///
/// # Errors
///
/// Invalid configuration, unreadable input, stage failures, state
/// persistence failures and report write failures are all fatal.
pub fn run(
    config: &MiningConfig,
    runner: &Runner,
    store: &dyn StateStore,
) -> MiningResult<RunSummary> {
    let started = Instant::now();
    config.validate()?;

    let records = read_records(&config.input_path)?;
    let records_read = records.len() as u64;
    info!(
        input = %config.input_path.display(),
        records = records_read,
        "read transactions"
    );
    let transaction_count = match config.transaction_count {
        Some(configured) => {
            if records_read != configured {
                warn!(
                    configured,
                    read = records_read,
                    "transaction count differs from the number of records read; ratios use the configured count"
                );
            }
            configured
        }
        None => records_read,
    };
    if transaction_count == 0 {
        return Err(MiningError::configuration(format!(
            "no transactions in {}",
            config.input_path.display()
        )));
    }

    let output = config.output_path.as_path();
    let min_support_count = config.min_support_count(transaction_count);
    info!(
        min_support_count,
        max_pass = config.max_pass,
        partitions = runner.partitions,
        "starting frequent itemset mining"
    );

    let mining = mine_frequent_itemsets(
        runner,
        &records,
        &config.item_delimiter,
        PassState::new(config.max_pass, min_support_count),
        store,
        &config.state_path(),
        |pass, survivors| {
            let lines = frequent_itemset_lines(survivors.iter().map(|(s, c)| (s, *c)));
            write_lines(&pass_output_path(output, pass), lines).map(|_| ())
        },
    )?;

    let frequent = mining.state.frequent;
    write_lines(
        &output.join(FREQUENT_LIST),
        frequent_itemset_lines(frequent.iter().map(|(s, c)| (s, *c))),
    )?;

    let mined = mine_rules(
        runner,
        &frequent,
        RuleParams {
            transaction_count,
            min_confidence: config.min_confidence,
            lift_filter: config.lift_filter,
        },
    )?;
    write_lines(
        &output.join(RULE_MINING_OUTPUT),
        mined.rules.iter().map(rule_line),
    )?;

    let aggregated = aggregate_rules(runner, &mined.rules)?;
    write_lines(
        &output.join(FINAL_OUTPUT),
        final_report_lines(&aggregated.rules),
    )?;

    let summary = RunSummary {
        records_read,
        transaction_count,
        min_support_count,
        passes: mining.passes.len(),
        frequent_per_pass: mining.passes.iter().map(Vec::len).collect(),
        frequent_itemsets: frequent.len(),
        rules_mined: mined.rules.len(),
        rules_kept: aggregated.rules.len(),
        skipped_records: mining.skipped_records,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        frequent,
        rules: aggregated.rules,
    };
    write_summary(&output.join(SUMMARY_FILE), &summary)?;

    info!(
        passes = summary.passes,
        frequent = summary.frequent_itemsets,
        rules = summary.rules_kept,
        elapsed_ms = summary.elapsed_ms,
        "market basket analysis finished"
    );
    Ok(summary)
}

fn write_summary(path: &Path, summary: &RunSummary) -> MiningResult<()> {
    let json = serde_json::to_string_pretty(summary).map_err(|e| MiningError::io(path, e.into()))?;
    write_lines(path, [json]).map(|_| ())
}
