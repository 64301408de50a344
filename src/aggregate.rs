//! Redundant rule removal.
//!
//! Rules are regrouped by consequent with a secondary sort on lift (highest
//! first). Inside a group, a rule is redundant when a rule with a smaller or
//! equal antecedent predicts the same consequent at least as confidently.

use crate::error::MiningResult;
use crate::itemset::Itemset;
use crate::rules::AssociationRule;
use crate::runner::Runner;
use crate::stage::{Emitter, KeyOrdering, Stage, StageCounters};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, info};

/// Intermediate key: consequent plus lift.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub consequent: Itemset,
    pub lift: OrderedFloat<f64>,
}

/// Sort by consequent ascending then lift descending; group by consequent.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsequentLiftOrder;

impl KeyOrdering<RuleKey> for ConsequentLiftOrder {
    type SortKey = (Itemset, Reverse<OrderedFloat<f64>>);
    type GroupKey = Itemset;

    fn sort_key(&self, key: &RuleKey) -> Self::SortKey {
        (key.consequent.clone(), Reverse(key.lift))
    }

    fn group_key(&self, key: &RuleKey) -> Itemset {
        key.consequent.clone()
    }
}

/// Antecedents marked redundant among `ranked`.
///
/// `ranked` must be ordered by confidence descending, then antecedent size
/// descending, then antecedent text. For every later entry `i` and earlier
/// entry `j`, `j` is redundant when `antecedent[i] ⊆ antecedent[j]` and
/// `confidence[i] >= confidence[j]`.
#[must_use]
pub fn find_redundant(ranked: &[(&Itemset, f64)]) -> HashSet<Itemset> {
    let mut redundant = HashSet::new();
    for i in (1..ranked.len()).rev() {
        let (ant_i, conf_i) = ranked[i];
        for j in (0..i).rev() {
            let (ant_j, conf_j) = ranked[j];
            if ant_i.is_subset_of(ant_j) && conf_i >= conf_j {
                redundant.insert(ant_j.clone());
            }
        }
    }
    redundant
}

/// Order rules for [`find_redundant`].
fn rank(rules: &[AssociationRule]) -> Vec<(&Itemset, f64)> {
    let mut ranked: Vec<(&Itemset, f64)> = rules
        .iter()
        .map(|r| (&r.antecedent, r.confidence))
        .collect();
    ranked.sort_by(|(ant_a, conf_a), (ant_b, conf_b)| {
        conf_b
            .total_cmp(conf_a)
            .then_with(|| ant_b.len().cmp(&ant_a.len()))
            .then_with(|| ant_a.canonical().cmp(&ant_b.canonical()))
    });
    ranked
}

pub struct RuleAggregationStage {
    ordering: ConsequentLiftOrder,
}

impl Default for RuleAggregationStage {
    fn default() -> Self {
        Self {
            ordering: ConsequentLiftOrder,
        }
    }
}

impl Stage for RuleAggregationStage {
    type Input = AssociationRule;
    type Key = RuleKey;
    type Value = AssociationRule;
    type Output = AssociationRule;
    type Ordering = ConsequentLiftOrder;

    fn name(&self) -> &str {
        "rule-aggregation"
    }

    fn map(
        &self,
        rule: &AssociationRule,
        out: &mut Emitter<RuleKey, AssociationRule>,
    ) -> anyhow::Result<()> {
        let key = RuleKey {
            consequent: rule.consequent.clone(),
            lift: OrderedFloat(rule.lift),
        };
        out.emit(key, rule.clone());
        Ok(())
    }

    fn ordering(&self) -> &ConsequentLiftOrder {
        &self.ordering
    }

    fn reduce(
        &self,
        consequent: &Itemset,
        rules: Vec<AssociationRule>,
    ) -> anyhow::Result<Vec<AssociationRule>> {
        let redundant = find_redundant(&rank(&rules));
        if !redundant.is_empty() {
            debug!(%consequent, removed = redundant.len(), "dropping redundant rules");
        }
        Ok(rules
            .into_iter()
            .filter(|r| !redundant.contains(&r.antecedent))
            .collect())
    }
}

/// Aggregated rules plus stage counters.
#[derive(Debug)]
pub struct AggregateOutcome {
    /// Grouped by consequent (ascending), lift descending inside a group.
    pub rules: Vec<AssociationRule>,
    pub counters: StageCounters,
}

/// Drop redundant rules.
///
/// Rules are regrouped by consequent. Inside a group a rule is dropped when
/// another rule with a subset of its antecedent is at least as confident.
/// The result is ordered by consequent, then by lift, highest first.
/// Running this again on its own output removes nothing.
///
/// # Examples
///
/// ```
/// use ironbasket::{AssociationRule, Itemset, Runner, aggregate_rules};
///
/// # fn main() -> Result<(), ironbasket::MiningError> {
/// let rule = |antecedent: &str, confidence: f64, lift: f64| AssociationRule {
///     antecedent: Itemset::parse_canonical(antecedent),
///     consequent: Itemset::single("milk"),
///     support: 0.3,
///     confidence,
///     lift,
/// };
/// let rules = vec![
///     rule("bread,butter", 0.75, 1.25),
///     rule("bread", 0.75, 1.25),
///     rule("cereal", 0.9, 1.5),
/// ];
///
/// let out = aggregate_rules(&Runner::sequential(), &rules)?;
/// let kept: Vec<String> = out.rules.iter().map(|r| r.to_string()).collect();
/// assert_eq!(kept, vec!["[cereal] => milk", "[bread] => milk"]);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Propagates stage failures.
pub fn aggregate_rules(
    runner: &Runner,
    rules: &[AssociationRule],
) -> MiningResult<AggregateOutcome> {
    let output = runner.run_stage(&RuleAggregationStage::default(), rules)?;
    let mut rules = output.records;
    // Each consequent is one reduce group, so a stable sort keeps lift order.
    rules.sort_by(|a, b| a.consequent.cmp(&b.consequent));
    info!(
        kept = rules.len(),
        dropped = output.counters.input_records - output.counters.output_records,
        "rule aggregation finished"
    );
    Ok(AggregateOutcome {
        rules,
        counters: output.counters,
    })
}
