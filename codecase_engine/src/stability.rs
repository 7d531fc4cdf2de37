/// CodeCase Engine — Stability Gate
///
/// Tolerant structural heuristics that decide whether source text is settled
/// enough to validate. Not a parser.
///
/// Checks, in order:
///   1. HTML tag balance: |open − close − self_closing| ≤ 2
///   2. CSS brace balance: count('{') == count('}')
///   3. HTML not inside an unterminated tag ('<' after the last '>')
///   4. HTML not inside an unterminated attribute (odd number of '"')
///   5. CSS not inside an unterminated rule ('{' after the last '}')
///
/// The quiescence interval lives with the runtime timer; this module only
/// answers "is the text stable right now".

use std::fmt;

use tracing::debug;

use crate::domain::ValidationVerdict;
use crate::rules::RuleRegistry;
use crate::validator::evaluate;

/// Maximum tolerated tag imbalance.
pub const TAG_BALANCE_TOLERANCE: i64 = 2;

/// Elements that never take a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Why evaluation was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instability {
    UnbalancedTags { open: i64, close: i64, self_closing: i64 },
    UnbalancedBraces { open: i64, close: i64 },
    UnterminatedTag,
    UnterminatedAttribute,
    UnterminatedRule,
}

impl fmt::Display for Instability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instability::UnbalancedTags { open, close, self_closing } => write!(
                f,
                "unbalanced tags: open={} close={} self_closing={}",
                open, close, self_closing
            ),
            Instability::UnbalancedBraces { open, close } => {
                write!(f, "unbalanced braces: open={} close={}", open, close)
            }
            Instability::UnterminatedTag => write!(f, "unterminated tag"),
            Instability::UnterminatedAttribute => write!(f, "unterminated attribute"),
            Instability::UnterminatedRule => write!(f, "unterminated css rule"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stability {
    Stable,
    Unstable(Instability),
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        matches!(self, Stability::Stable)
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

/// (open, close, self_closing) tag counts.
///
/// `open` counts every `<` followed by an ASCII letter, `close` every `</`,
/// `self_closing` every `/>` plus void elements written without `/>`.
pub fn count_tags(html: &str) -> (i64, i64, i64) {
    let bytes = html.as_bytes();
    let mut open = 0;
    let mut close = 0;
    let mut self_closing = 0;

    for (at, _) in html.match_indices('<') {
        match bytes.get(at + 1) {
            Some(b'/') => close += 1,
            Some(b) if b.is_ascii_alphabetic() => {
                open += 1;
                let span = match html[at..].find('>') {
                    Some(end) => &html[at..at + end + 1],
                    None => &html[at..],
                };
                if span.ends_with("/>") || is_void_tag(&span[1..]) {
                    self_closing += 1;
                }
            }
            _ => {}
        }
    }

    (open, close, self_closing)
}

fn is_void_tag(after_lt: &str) -> bool {
    let name: String = after_lt
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    VOID_ELEMENTS.contains(&name.as_str())
}

pub fn html_tags_balanced(html: &str) -> Result<(), Instability> {
    let (open, close, self_closing) = count_tags(html);
    if (open - close - self_closing).abs() > TAG_BALANCE_TOLERANCE {
        return Err(Instability::UnbalancedTags { open, close, self_closing });
    }
    Ok(())
}

pub fn css_braces_balanced(css: &str) -> Result<(), Instability> {
    let open = css.matches('{').count() as i64;
    let close = css.matches('}').count() as i64;
    if open != close {
        return Err(Instability::UnbalancedBraces { open, close });
    }
    Ok(())
}

pub fn html_not_mid_edit(html: &str) -> Result<(), Instability> {
    if let Some(lt) = html.rfind('<') {
        match html.rfind('>') {
            Some(gt) if gt > lt => {}
            _ => return Err(Instability::UnterminatedTag),
        }
    }
    if html.matches('"').count() % 2 == 1 {
        return Err(Instability::UnterminatedAttribute);
    }
    Ok(())
}

pub fn css_not_mid_edit(css: &str) -> Result<(), Instability> {
    if let Some(open) = css.rfind('{') {
        match css.rfind('}') {
            Some(close) if close > open => {}
            _ => return Err(Instability::UnterminatedRule),
        }
    }
    Ok(())
}

/// Run every heuristic. Returns the first failure.
pub fn assess(html: &str, css: &str) -> Stability {
    let checks = html_tags_balanced(html)
        .and_then(|_| css_braces_balanced(css))
        .and_then(|_| html_not_mid_edit(html))
        .and_then(|_| css_not_mid_edit(css));
    match checks {
        Ok(()) => Stability::Stable,
        Err(reason) => Stability::Unstable(reason),
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Result of passing text through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Evaluated(ValidationVerdict),
    Skipped {
        verdict: ValidationVerdict,
        reason: Instability,
    },
}

impl GateOutcome {
    pub fn verdict(&self) -> &ValidationVerdict {
        match self {
            GateOutcome::Evaluated(v) => v,
            GateOutcome::Skipped { verdict, .. } => verdict,
        }
    }

    pub fn into_verdict(self) -> ValidationVerdict {
        match self {
            GateOutcome::Evaluated(v) => v,
            GateOutcome::Skipped { verdict, .. } => verdict,
        }
    }
}

/// Remembers the last real verdict for the current mission so unstable text
/// can report partial progress without ever reporting completion.
#[derive(Debug, Clone, Default)]
pub struct StabilityGate {
    last: Option<ValidationVerdict>,
}

impl StabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the retained verdict. Called when a mission's text is reset.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last_verdict(&self) -> Option<&ValidationVerdict> {
        self.last.as_ref()
    }

    pub fn filter(
        &mut self,
        registry: &RuleRegistry,
        conditions: &[String],
        html: &str,
        css: &str,
    ) -> GateOutcome {
        match assess(html, css) {
            Stability::Stable => {
                let verdict = evaluate(registry, conditions, html, css);
                self.last = Some(verdict.clone());
                GateOutcome::Evaluated(verdict)
            }
            Stability::Unstable(reason) => {
                debug!(%reason, "source text unstable, evaluation skipped");
                let verdict = match &self.last {
                    Some(previous) => previous.forced_incomplete(),
                    None => ValidationVerdict::pending(conditions),
                };
                GateOutcome::Skipped { verdict, reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tags() {
        assert_eq!(count_tags("<h1>x</h1>"), (1, 1, 0));
        assert_eq!(count_tags("<p>a<br>b<br/></p>"), (3, 1, 2));
        assert_eq!(count_tags("<!-- note --><!doctype html>"), (0, 0, 0));
        assert_eq!(count_tags("a < b"), (0, 0, 0));
    }

    #[test]
    fn test_tag_tolerance() {
        assert!(html_tags_balanced("<div><p>x").is_ok());
        assert!(matches!(
            html_tags_balanced("<div><p><span>x"),
            Err(Instability::UnbalancedTags { open: 3, close: 0, self_closing: 0 })
        ));
    }

    #[test]
    fn test_many_void_elements_are_balanced() {
        let html = "<img src=\"a\"><img src=\"b\"><img src=\"c\"><hr><br>";
        assert_eq!(assess(html, ""), Stability::Stable);
    }

    #[test]
    fn test_unterminated_tag() {
        assert_eq!(
            assess("<h1>The Daily Byte</h1><p", ""),
            Stability::Unstable(Instability::UnterminatedTag)
        );
    }

    #[test]
    fn test_unterminated_attribute() {
        assert_eq!(
            assess("<a href=\"/home>home</a>", ""),
            Stability::Unstable(Instability::UnterminatedAttribute)
        );
    }

    #[test]
    fn test_css_checks() {
        assert_eq!(
            assess("", ".a { color: red; } .b {"),
            Stability::Unstable(Instability::UnbalancedBraces { open: 2, close: 1 })
        );
        assert_eq!(
            assess("", "} .a {"),
            Stability::Unstable(Instability::UnterminatedRule)
        );
        assert_eq!(assess("", ".a { color: red; }"), Stability::Stable);
    }

    #[test]
    fn test_gate_retains_previous_verdict_forced_incomplete() {
        let registry = RuleRegistry::builtin();
        let conditions = vec!["has-heading".to_string()];
        let mut gate = StabilityGate::new();

        let first = gate.filter(&registry, &conditions, "<h1>x</h1>", "");
        assert!(first.verdict().is_completed);

        let second = gate.filter(&registry, &conditions, "<h1>x</h1><", "");
        match &second {
            GateOutcome::Skipped { verdict, reason } => {
                assert_eq!(*reason, Instability::UnterminatedTag);
                assert_eq!(verdict.satisfied, conditions);
                assert_eq!(verdict.score, 100);
                assert!(!verdict.is_completed);
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_gate_without_history_reports_pending() {
        let registry = RuleRegistry::builtin();
        let conditions = vec!["has-heading".to_string()];
        let mut gate = StabilityGate::new();
        let outcome = gate.filter(&registry, &conditions, "<h1", "");
        assert_eq!(outcome.into_verdict(), ValidationVerdict::pending(&conditions));
    }
}
