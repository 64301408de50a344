//! Association rule mining over the frequent itemset table.
//!
//! The map step sends every frequent itemset `S` to itself and, for each item
//! `i` of `S`, to the antecedent `S \ {i}`. The reduce step for an antecedent
//! `A` then sees its own support plus every frequent superset one item larger,
//! which is exactly what a rule `A => i` needs.

use crate::error::MiningResult;
use crate::itemset::Itemset;
use crate::runner::Runner;
use crate::stage::{Emitter, NaturalOrder, Stage, StageCounters};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;
use tracing::{info, warn};

/// `antecedent => consequent` with its measures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: Itemset,
    /// Always a single item.
    pub consequent: Itemset,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

impl AssociationRule {
    /// `[a,b] => c`
    #[must_use]
    pub fn text(&self) -> String {
        self.to_string()
    }

    /// Text of the rule read backwards, `[c] => a,b`.
    #[must_use]
    pub fn reverse_text(&self) -> String {
        format!("[{}] => {}", self.consequent, self.antecedent)
    }
}

impl Display for AssociationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "[{}] => {}", self.antecedent, self.consequent)
    }
}

/// What an antecedent group receives from the map step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleEvidence {
    /// Support count of the antecedent itself.
    Own(u64),
    /// A frequent superset with one extra item, and its support count.
    Superset(Itemset, u64),
}

/// Thresholds and totals for rule mining.
#[derive(Clone, Copy, Debug)]
pub struct RuleParams {
    pub transaction_count: u64,
    pub min_confidence: f64,
    /// Keep only rules with lift strictly above 1.
    pub lift_filter: bool,
}

pub struct RuleMiningStage {
    frequent: Arc<BTreeMap<Itemset, u64>>,
    params: RuleParams,
}

impl RuleMiningStage {
    #[must_use]
    pub fn new(frequent: Arc<BTreeMap<Itemset, u64>>, params: RuleParams) -> Self {
        Self { frequent, params }
    }
}

impl Stage for RuleMiningStage {
    type Input = (Itemset, u64);
    type Key = Itemset;
    type Value = RuleEvidence;
    type Output = AssociationRule;
    type Ordering = NaturalOrder;

    fn name(&self) -> &str {
        "rule-mining"
    }

    fn map(
        &self,
        (itemset, support): &(Itemset, u64),
        out: &mut Emitter<Itemset, RuleEvidence>,
    ) -> anyhow::Result<()> {
        out.emit(itemset.clone(), RuleEvidence::Own(*support));
        if itemset.len() > 1 {
            for item in itemset.iter() {
                out.emit(
                    itemset.without(item),
                    RuleEvidence::Superset(itemset.clone(), *support),
                );
            }
        }
        Ok(())
    }

    fn ordering(&self) -> &NaturalOrder {
        &NaturalOrder
    }

    #[allow(clippy::cast_precision_loss)]
    fn reduce(
        &self,
        antecedent: &Itemset,
        evidence: Vec<RuleEvidence>,
    ) -> anyhow::Result<Vec<AssociationRule>> {
        if self.params.transaction_count == 0 {
            bail!("transaction count must be positive");
        }
        let n = self.params.transaction_count as f64;

        let Some(own) = evidence.iter().find_map(|e| match e {
            RuleEvidence::Own(count) => Some(*count),
            RuleEvidence::Superset(..) => None,
        }) else {
            warn!(%antecedent, "no support recorded for antecedent; skipping its rules");
            return Ok(Vec::new());
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut rules = Vec::new();
        for e in evidence {
            let RuleEvidence::Superset(superset, count) = e else {
                continue;
            };
            let consequent = superset.difference(antecedent);
            if consequent.len() != 1 {
                bail!("superset {superset} is not one item larger than {antecedent}");
            }
            let Some(&consequent_count) = self.frequent.get(&consequent) else {
                warn!(%consequent, "consequent missing from the frequent table; skipping rule");
                continue;
            };

            let support = count as f64 / n;
            // One division of counts, so equal ratios compare equal bit for bit.
            let confidence = count as f64 / own as f64;
            let lift = confidence / (consequent_count as f64 / n);
            let rule = AssociationRule {
                antecedent: antecedent.clone(),
                consequent,
                support,
                confidence,
                lift,
            };

            // A rule and its reverse are one candidate; the first one wins.
            let text = rule.text();
            if seen.contains(&text) || seen.contains(&rule.reverse_text()) {
                continue;
            }
            seen.insert(text);

            if confidence >= self.params.min_confidence
                && (!self.params.lift_filter || lift > 1.0)
            {
                rules.push(rule);
            }
        }
        Ok(rules)
    }
}

/// Rules plus the counters of the stage that produced them.
#[derive(Debug)]
pub struct RuleOutcome {
    /// Sorted by antecedent, then consequent.
    pub rules: Vec<AssociationRule>,
    pub counters: StageCounters,
}

/// Mine every rule supported by `frequent`.
///
/// # Errors
///
/// Propagates stage failures.
pub fn mine_rules(
    runner: &Runner,
    frequent: &BTreeMap<Itemset, u64>,
    params: RuleParams,
) -> MiningResult<RuleOutcome> {
    let records: Vec<(Itemset, u64)> = frequent.iter().map(|(s, c)| (s.clone(), *c)).collect();
    let stage = RuleMiningStage::new(Arc::new(frequent.clone()), params);
    let output = runner.run_stage(&stage, &records)?;

    let mut rules = output.records;
    rules.sort_by(|a, b| {
        a.antecedent
            .cmp(&b.antecedent)
            .then_with(|| a.consequent.cmp(&b.consequent))
    });
    info!(rules = rules.len(), "rule mining finished");
    Ok(RuleOutcome {
        rules,
        counters: output.counters,
    })
}
