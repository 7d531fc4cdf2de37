/// CodeCase Engine — Validator
///
/// Deterministic, side-effect free. Satisfied/unsatisfied lists preserve the
/// mission's condition order. `is_completed` is derived from the lists,
/// never from the rounded score.

use crate::arithmetic::percent_rounded;
use crate::domain::ValidationVerdict;
use crate::rules::RuleRegistry;

/// Evaluate `conditions` in order against the current source text.
pub fn evaluate(
    registry: &RuleRegistry,
    conditions: &[String],
    html: &str,
    css: &str,
) -> ValidationVerdict {
    let html = html.to_lowercase();
    let css = css.to_lowercase();

    let mut satisfied = Vec::new();
    let mut unsatisfied = Vec::new();
    for id in conditions {
        if registry.check_lowered(id, &html, &css) {
            satisfied.push(id.clone());
        } else {
            unsatisfied.push(id.clone());
        }
    }

    let score = percent_rounded(satisfied.len(), conditions.len());
    let is_completed = unsatisfied.is_empty();

    ValidationVerdict {
        satisfied,
        unsatisfied,
        score,
        is_completed,
    }
}
