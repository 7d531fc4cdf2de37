/// Playthrough scenarios replayed through the public engine surface.
///
/// Covers the validator scenarios, the reset-only-on-transition rule, the
/// mission transition rule and kernel ledger pricing.

use std::sync::Arc;

use proptest::prelude::*;

use codecase_engine::casebook::{builtin_engine, builtin_hints, missing_headline, reference_solution};
use codecase_engine::commands::{sequence_commands, Command};
use codecase_engine::domain::{Case, EditorPane, Phase};
use codecase_engine::engine::{PlaythroughEngine, ProgressionError};
use codecase_engine::ledger::{case_unlock_cost, plan_spend, LedgerState, SpendPlan};
use codecase_engine::rules::{RuleRegistry, BUILTIN_CONDITIONS};
use codecase_engine::validator::evaluate;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn engine_for(case: Case) -> PlaythroughEngine {
    PlaythroughEngine::new(
        Arc::new(case),
        Arc::new(RuleRegistry::builtin()),
        Arc::new(builtin_hints()),
    )
    .expect("valid case")
}

fn solve_current(engine: &mut PlaythroughEngine) {
    let mission_id = engine.current_mission().unwrap().id.clone();
    let (html, css) = reference_solution(&mission_id).unwrap();
    let t = engine.update_source_and_evaluate(html, css).unwrap();
    assert!(t.mission_completed, "{} did not complete", mission_id);
}

// ---------------------------------------------------------------------------
// Validator scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_clean_html_completes() {
    let registry = RuleRegistry::builtin();
    let conditions = ids(&["no-deprecated-tag", "has-required-text"]);
    let v = evaluate(&registry, &conditions, "<h1>The Daily Byte</h1>", "");
    assert!(v.is_completed);
    assert_eq!(v.score, 100);
}

#[test]
fn scenario_b_deprecated_tag_fails_everything() {
    let registry = RuleRegistry::builtin();
    let conditions = ids(&["no-deprecated-tag", "has-required-text"]);
    let v = evaluate(&registry, &conditions, "<center>Breaking news</center>", "");
    assert!(!v.is_completed);
    assert_eq!(v.score, 0);
    assert_eq!(v.unsatisfied, conditions);
}

#[test]
fn scenario_b_partial_rounds_to_half() {
    let registry = RuleRegistry::builtin();
    let conditions = ids(&["no-deprecated-tag", "has-required-text"]);
    let v = evaluate(&registry, &conditions, "<font>The Daily Byte</font>", "");
    assert!(!v.is_completed);
    assert_eq!(v.score, 50);
}

#[test]
fn evaluate_is_idempotent() {
    let registry = RuleRegistry::builtin();
    let case = missing_headline();
    let m = &case.missions[0];
    let first = evaluate(&registry, &m.conditions, &m.initial_html, &m.initial_css);
    let second = evaluate(&registry, &m.conditions, &m.initial_html, &m.initial_css);
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Ledger scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_c_insufficient_funds() {
    let case = missing_headline();
    let cost = case_unlock_cost(&case).unwrap();
    assert_eq!(cost, 200);
    let ledger = LedgerState::new(150);
    assert_eq!(
        plan_spend(&ledger, &case.id, cost).unwrap(),
        SpendPlan::InsufficientFunds { balance: 150, cost: 200 }
    );
    assert_eq!(ledger.point_balance, 150);
}

#[test]
fn scenario_d_debit() {
    let case = missing_headline();
    let cost = case_unlock_cost(&case).unwrap();
    let ledger = LedgerState::new(250);
    match plan_spend(&ledger, &case.id, cost).unwrap() {
        SpendPlan::Debit { next } => {
            assert_eq!(next.point_balance, 50);
            assert!(next.is_unlocked(&case.id));
            assert_eq!(
                plan_spend(&next, &case.id, cost).unwrap(),
                SpendPlan::AlreadyUnlocked
            );
        }
        other => panic!("expected debit, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

#[test]
fn full_playthrough_reaches_resolved() {
    let mut engine = builtin_engine().unwrap();
    let beats = engine.case().beats.len();
    for _ in 0..beats {
        engine.advance_narrative().unwrap();
    }
    assert_eq!(engine.state().phase, Phase::Task);

    let missions = engine.case().missions.len();
    for _ in 0..missions {
        solve_current(&mut engine);
        engine.complete_and_advance().unwrap();
    }

    let state = engine.state();
    assert_eq!(state.phase, Phase::Resolved);
    assert_eq!(state.revealed_clues.len(), missions);
    assert!(engine.hint().is_none());
    assert!(matches!(
        engine.skip_to_task(),
        Err(ProgressionError::WrongPhase { phase: Phase::Resolved, .. })
    ));
}

#[test]
fn edits_survive_non_transition_commands() {
    let mut engine = builtin_engine().unwrap();
    engine.skip_to_task().unwrap();
    engine.update_source("<p>my draft</p>", "p { color: blue; }").unwrap();

    let commands = [
        Command::Refresh,
        Command::SkipToTask,
        Command::SelectPane { pane: EditorPane::Css },
        Command::Evaluate,
        Command::Refresh,
    ];
    for command in commands {
        let t = engine.apply(command).unwrap();
        assert!(!t.text_reset, "{} reset the text", t.command);
        assert_eq!(engine.state().html, "<p>my draft</p>");
        assert_eq!(engine.state().css, "p { color: blue; }");
    }
    assert_eq!(engine.state().active_pane, EditorPane::Css);
}

#[test]
fn entering_next_mission_loads_its_defaults() {
    let mut engine = builtin_engine().unwrap();
    engine.skip_to_task().unwrap();
    engine.select_pane(EditorPane::Css).unwrap();
    solve_current(&mut engine);

    let t = engine.complete_and_advance().unwrap();
    assert!(t.mission_advanced);
    assert!(t.text_reset);

    let next = engine.case().missions[1].clone();
    let state = engine.state();
    assert_eq!(state.mission_index, 1);
    assert_eq!(state.html, next.initial_html);
    assert_eq!(state.css, next.initial_css);
    assert!(!state.mission_completed);
    assert!(!state.pending_reset);
    assert_eq!(state.active_pane, EditorPane::Html);
    assert!(engine.verdict().is_none());
}

#[test]
fn completion_latches_through_later_edits() {
    let mut engine = builtin_engine().unwrap();
    engine.skip_to_task().unwrap();
    solve_current(&mut engine);

    let t = engine
        .update_source_and_evaluate("<center>broken again</center>", "")
        .unwrap();
    assert!(!t.verdict.unwrap().is_completed);
    assert!(engine.state().mission_completed);
    assert_eq!(engine.state().revealed_clues.len(), 1);
}

#[test]
fn unstable_text_never_completes() {
    let mut engine = builtin_engine().unwrap();
    engine.skip_to_task().unwrap();
    let (html, css) = reference_solution("front-page").unwrap();
    let unfinished = format!("{}<p class=\"", html);
    let t = engine.update_source_and_evaluate(unfinished, css).unwrap();
    assert!(!t.evaluated);
    assert!(t.evaluation_skipped.is_some());
    assert!(!t.verdict.unwrap().is_completed);
    assert!(!engine.state().mission_completed);
}

#[test]
fn narrative_navigation_is_bounded() {
    let mut engine = builtin_engine().unwrap();
    engine.retreat_narrative().unwrap();
    assert_eq!(engine.state().beat_index, 0);
    engine.advance_narrative().unwrap();
    engine.advance_narrative().unwrap();
    engine.retreat_narrative().unwrap();
    assert_eq!(engine.state().beat_index, 1);
    assert_eq!(engine.state().phase, Phase::Narrative);
}

#[test]
fn replay_reproduces_live_state() {
    let commands = vec![
        Command::AdvanceNarrative,
        Command::SkipToTask,
        Command::UpdateSource {
            html: reference_solution("front-page").unwrap().0.into(),
            css: reference_solution("front-page").unwrap().1.into(),
        },
        Command::Evaluate,
        Command::CompleteAndAdvance,
        Command::SelectPane { pane: EditorPane::Css },
    ];

    let mut live = builtin_engine().unwrap();
    for command in commands.clone() {
        live.apply(command).unwrap();
    }

    let mut replayed = builtin_engine().unwrap();
    replayed.replay(&sequence_commands(commands)).unwrap();

    assert_eq!(replayed.state(), live.state());
    assert_eq!(replayed.current_hash(), live.current_hash());
    assert_eq!(replayed.last_sequence(), 6);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

const FRAGMENTS: &[&str] = &[
    "<h1>The Daily Byte</h1>",
    "<center>",
    "</center>",
    "<p style=\"color:red\">x</p>",
    "<img src=\"a.png\">",
    "<img src=\"b.png\" alt=\"b\">",
    "<a>bare</a>",
    "<a href=\"/\">home</a>",
    "<nav>menu</nav>",
    "<ul><li>one</li></ul>",
    "<a class=\"x\">classy</a>",
    "<marquee>news</marquee>",
    "plain text",
];

const CSS_FRAGMENTS: &[&str] = &[
    ".a { color: red; }",
    ".b { display: none; }",
    ".c { display: flex; }",
    ".d { font-size: 12px !important; }",
    ".e { background-color: blue; }",
    ".f { visibility: hidden; }",
    ".g { display :none; }",
    ".h { float: left; font-size: 1em; }",
    "",
];

fn html_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..6).prop_map(|parts| parts.concat())
}

fn css_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(CSS_FRAGMENTS), 0..4).prop_map(|parts| parts.join("\n"))
}

fn conditions_strategy() -> impl Strategy<Value = Vec<String>> {
    let known: Vec<String> = BUILTIN_CONDITIONS.iter().map(|(id, _)| id.to_string()).collect();
    prop::sample::subsequence(known, 0..=BUILTIN_CONDITIONS.len())
}

proptest! {
    #[test]
    fn completed_iff_every_predicate_holds(
        conditions in conditions_strategy(),
        html in html_strategy(),
        css in css_strategy(),
    ) {
        let registry = RuleRegistry::builtin();
        let verdict = evaluate(&registry, &conditions, &html, &css);
        let all_hold = conditions.iter().all(|id| registry.check(id, &html, &css));
        prop_assert_eq!(verdict.is_completed, all_hold);
        prop_assert_eq!(verdict.total(), conditions.len());
    }

    #[test]
    fn evaluation_is_deterministic(
        conditions in conditions_strategy(),
        html in html_strategy(),
        css in css_strategy(),
    ) {
        let registry = RuleRegistry::builtin();
        prop_assert_eq!(
            evaluate(&registry, &conditions, &html, &css),
            evaluate(&registry, &conditions, &html, &css)
        );
    }

    #[test]
    fn builtin_solved_hint_implies_completion(
        mission_index in 0usize..3,
        html in html_strategy(),
        css in css_strategy(),
    ) {
        let case = missing_headline();
        let mission = &case.missions[mission_index];
        let hint = builtin_hints().resolve(mission, &html, &css);
        let verdict = evaluate(&RuleRegistry::builtin(), &mission.conditions, &html, &css);
        prop_assert!(
            !hint.is_resolved || verdict.is_completed,
            "{} read {} with unsatisfied {:?}", mission.id, hint.id, verdict.unsatisfied
        );
    }
}
