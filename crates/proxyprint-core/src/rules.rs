// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Declarative rules over printer-option combinations.
//
// Cost rules turn a set of chosen printer options (IPP attribute → choice)
// into a cost.  Number-up rules map page geometry and n-up settings onto the
// orientation and layout the printer must be asked for.  Everything here is
// immutable once built and safe to share between threads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ProxyPrintError, Result};
use crate::types::Amount;

/// Chosen printer options keyed by IPP attribute name.
pub type PrinterChoices = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Cost rules
// ---------------------------------------------------------------------------

/// A named cost that applies when a combination of printer options is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRule {
    name: String,
    /// Required attribute → choice pairs.
    required: BTreeMap<String, String>,
    /// Attributes whose pair means "must NOT be this choice".
    negated: BTreeSet<String>,
    amount: Amount,
}

impl CostRule {
    pub fn new(name: impl Into<String>, amount: Amount) -> Self {
        Self {
            name: name.into(),
            required: BTreeMap::new(),
            negated: BTreeSet::new(),
            amount,
        }
    }

    /// Require `attribute` to be `choice`.
    pub fn with_choice(mut self, attribute: impl Into<String>, choice: impl Into<String>) -> Self {
        let attribute = attribute.into();
        self.negated.remove(&attribute);
        self.required.insert(attribute, choice.into());
        self
    }

    /// Require `attribute` to be anything but `choice`.
    pub fn with_negated_choice(
        mut self,
        attribute: impl Into<String>,
        choice: impl Into<String>,
    ) -> Self {
        let attribute = attribute.into();
        self.negated.insert(attribute.clone());
        self.required.insert(attribute, choice.into());
        self
    }

    /// Build a rule from its compact text form, e.g.
    /// `"sides=two-sided-long-edge,!media=iso_a3_297x420mm"`.
    pub fn parse(name: impl Into<String>, expression: &str, amount: Amount) -> Result<Self> {
        let mut rule = Self::new(name, amount);
        for token in expression.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (negated, pair) = match token.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, token),
            };
            let (attribute, choice) = pair
                .split_once('=')
                .map(|(a, c)| (a.trim(), c.trim()))
                .filter(|(a, c)| !a.is_empty() && !c.is_empty())
                .ok_or_else(|| ProxyPrintError::Rule(format!("malformed pair {token:?}")))?;
            rule = if negated {
                rule.with_negated_choice(attribute, choice)
            } else {
                rule.with_choice(attribute, choice)
            };
        }
        Ok(rule)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn is_negated(&self, attribute: &str) -> bool {
        self.negated.contains(attribute)
    }

    /// Cost of this rule for `choices`, or `None` when the rule does not apply.
    ///
    /// Attributes the caller did not choose are treated as satisfied.
    pub fn calc_cost(&self, choices: &PrinterChoices) -> Option<Amount> {
        for (attribute, required) in &self.required {
            let Some(actual) = choices.get(attribute) else {
                continue;
            };
            let equal = actual == required;
            let satisfied = equal != self.negated.contains(attribute);
            if !satisfied {
                return None;
            }
        }
        Some(self.amount)
    }
}

/// How the costs of several matching rules are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RulePolicy {
    /// The first matching rule wins (per-media / per-sheet cost).
    FirstMatch,
    /// All matching rules are summed (per-copy / per-set cost).
    Accumulate,
}

/// Evaluate `rules` in order under `policy`.  `None` when no rule applies.
pub fn evaluate_rules(
    rules: &[CostRule],
    choices: &PrinterChoices,
    policy: RulePolicy,
) -> Option<Amount> {
    match policy {
        RulePolicy::FirstMatch => rules.iter().find_map(|rule| rule.calc_cost(choices)),
        RulePolicy::Accumulate => rules
            .iter()
            .filter_map(|rule| rule.calc_cost(choices))
            .reduce(|total, cost| total + cost),
    }
}

/// Combines per-sheet media rules with per-copy rules into a job cost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCalculator {
    /// First-match rules giving the cost of one printed sheet.
    pub media_rules: Vec<CostRule>,
    /// Accumulated rules giving an extra cost per copy (finishing etc.).
    pub copy_rules: Vec<CostRule>,
}

impl CostCalculator {
    pub fn new(media_rules: Vec<CostRule>, copy_rules: Vec<CostRule>) -> Self {
        Self {
            media_rules,
            copy_rules,
        }
    }

    /// `sheet cost × sheets × copies + copy cost × copies`.
    pub fn calc_job_cost(&self, choices: &PrinterChoices, sheets: u32, copies: u32) -> Amount {
        let per_sheet = evaluate_rules(&self.media_rules, choices, RulePolicy::FirstMatch)
            .unwrap_or(Amount::ZERO);
        let per_copy = evaluate_rules(&self.copy_rules, choices, RulePolicy::Accumulate)
            .unwrap_or(Amount::ZERO);
        per_sheet.times(sheets).times(copies) + per_copy.times(copies)
    }
}

// ---------------------------------------------------------------------------
// Number-up rules
// ---------------------------------------------------------------------------

/// Maps page geometry and n-up settings onto the IPP orientation and
/// number-up layout to request.
///
/// The independent variables identify the rule; the dependent variables are
/// what a match contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberUpRule {
    pub landscape: bool,
    pub pdf_rotation: i32,
    pub user_rotation: i32,
    pub number_up: String,
    pub orientation_requested: Option<String>,
    pub number_up_layout: Option<String>,
}

impl NumberUpRule {
    /// A query template: independent variables only.
    pub fn template(
        landscape: bool,
        pdf_rotation: i32,
        user_rotation: i32,
        number_up: impl Into<String>,
    ) -> Self {
        Self {
            landscape,
            pdf_rotation,
            user_rotation,
            number_up: number_up.into(),
            orientation_requested: None,
            number_up_layout: None,
        }
    }

    pub fn with_dependent(
        mut self,
        orientation_requested: impl Into<String>,
        number_up_layout: impl Into<String>,
    ) -> Self {
        self.orientation_requested = Some(orientation_requested.into());
        self.number_up_layout = Some(number_up_layout.into());
        self
    }

    /// Whether all independent variables are equal.
    pub fn is_parameter_match(&self, other: &NumberUpRule) -> bool {
        self.landscape == other.landscape
            && self.pdf_rotation == other.pdf_rotation
            && self.user_rotation == other.user_rotation
            && self.number_up == other.number_up
    }
}

/// Ordered set of known number-up rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberUpRuleTable {
    rules: Vec<NumberUpRule>,
}

impl NumberUpRuleTable {
    pub fn new(rules: Vec<NumberUpRule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the first rule matching `template` and return the template with
    /// the rule's dependent variables filled in.
    pub fn find_match(&self, template: NumberUpRule) -> Option<NumberUpRule> {
        let rule = self.rules.iter().find(|r| r.is_parameter_match(&template))?;
        Some(NumberUpRule {
            orientation_requested: rule.orientation_requested.clone(),
            number_up_layout: rule.number_up_layout.clone(),
            ..template
        })
    }
}
