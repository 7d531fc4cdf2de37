/// CodeCase Engine — Built-in Casebook
///
/// "The Missing Headline": three beats, three missions. Used by the CLI, the
/// tests and as the authoring reference for JSON case files.
///
/// Each hint table ends with signatures built on the mission's own rule
/// predicates, so a table only reports "solved" when every condition holds.

use std::sync::Arc;

use crate::domain::{Case, Difficulty, Mission, NarrativeBeat};
use crate::engine::{PlaythroughEngine, ProgressionError};
use crate::hints::{HintResolver, HintSignature, MissionHints};
use crate::rules::{self, compact, has_tag, RuleRegistry};

pub const MISSING_HEADLINE_ID: &str = "missing-headline";

pub fn missing_headline() -> Case {
    Case {
        id: MISSING_HEADLINE_ID.to_string(),
        title: "The Missing Headline".to_string(),
        difficulty: Difficulty::Beginner,
        reward_points: 100,
        beats: vec![
            beat(
                "night-shift",
                "Night Shift",
                "Editor Vance",
                "Our front page went blank an hour before print. Someone tampered with the markup.",
                "newsroom-night",
            ),
            beat(
                "partner",
                "The Newsroom",
                "Rook",
                "Every broken tag hides something. Fix the page and the clues will surface.",
                "newsroom-desk",
            ),
            beat(
                "deadline",
                "Deadline",
                "Editor Vance",
                "You have until the presses roll. Start with the masthead.",
                "printing-press",
            ),
        ],
        missions: vec![
            Mission {
                id: "front-page".to_string(),
                title: "Restore the Masthead".to_string(),
                objective: "Replace the obsolete markup with a real heading and move the inline colour into CSS.".to_string(),
                initial_html: concat!(
                    "<center><font size=\"7\">The Daily Byte</font></center>\n",
                    "<div style=\"color: red\">Mayor vanishes the night before the vote</div>\n",
                )
                .to_string(),
                initial_css: ".alert { font-weight: bold; }\n".to_string(),
                conditions: ids(&["no-deprecated-tag", "has-required-text", "no-inline-style", "has-heading"]),
                clue: "The mayor's office lights were still on at midnight.".to_string(),
                hints: vec![
                    "Modern pages use headings, not <center> and <font>.".to_string(),
                    "Styles belong in the stylesheet.".to_string(),
                ],
            },
            Mission {
                id: "evidence-board".to_string(),
                title: "Label the Evidence".to_string(),
                objective: "Turn the menu into navigation with working links and describe every photo.".to_string(),
                initial_html: concat!(
                    "<div class=\"menu\"><a>Home</a> <a>Archive</a></div>\n",
                    "<img src=\"dock.jpg\">\n",
                    "<img src=\"car.jpg\">\n",
                )
                .to_string(),
                initial_css: ".menu { padding: 4px; }\n".to_string(),
                conditions: ids(&["has-semantic-nav", "links-have-href", "images-have-alt"]),
                clue: "A car registered to City Hall was photographed at the docks.".to_string(),
                hints: vec![
                    "Screen readers need alt text to describe images.".to_string(),
                    "A link without href goes nowhere.".to_string(),
                ],
            },
            Mission {
                id: "hidden-memo".to_string(),
                title: "Reveal the Memos".to_string(),
                objective: "Unhide the memos, drop !important, lay the board out with flexbox and give the text a readable size.".to_string(),
                initial_html: concat!(
                    "<div class=\"board\">\n",
                    "  <div class=\"memo\">Meet me at the old lighthouse.</div>\n",
                    "  <div class=\"memo\">Bring the ledger.</div>\n",
                    "</div>\n",
                )
                .to_string(),
                initial_css: concat!(
                    ".board { float: left; }\n",
                    ".memo { display: none !important; font: 9px serif; }\n",
                )
                .to_string(),
                conditions: ids(&["css-nothing-hidden", "css-no-important", "css-flex-layout", "css-font-size"]),
                clue: "The memos point to the old lighthouse.".to_string(),
                hints: vec!["Something in the stylesheet is hiding the memos.".to_string()],
            },
        ],
        resolution: "The mayor was found at the old lighthouse, guarding the stolen election ledger. The Daily Byte goes to print on time.".to_string(),
    }
}

/// Known-good (html, css) for each built-in mission.
pub fn reference_solution(mission_id: &str) -> Option<(&'static str, &'static str)> {
    match mission_id {
        "front-page" => Some((
            "<h1>The Daily Byte</h1>\n<p class=\"alert\">Mayor vanishes the night before the vote</p>\n",
            ".alert { font-weight: bold; color: red; }\n",
        )),
        "evidence-board" => Some((
            concat!(
                "<nav class=\"menu\"><a href=\"/\">Home</a> <a href=\"/archive\">Archive</a></nav>\n",
                "<img src=\"dock.jpg\" alt=\"Car at the docks\">\n",
                "<img src=\"car.jpg\" alt=\"City Hall plates\">\n",
            ),
            ".menu { padding: 4px; }\n",
        )),
        "hidden-memo" => Some((
            concat!(
                "<div class=\"board\">\n",
                "  <div class=\"memo\">Meet me at the old lighthouse.</div>\n",
                "  <div class=\"memo\">Bring the ledger.</div>\n",
                "</div>\n",
            ),
            concat!(
                ".board { display: flex; gap: 8px; }\n",
                ".memo { display: block; font-size: 16px; }\n",
            ),
        )),
        _ => None,
    }
}

/// Hint tables for the built-in missions, in priority order.
pub fn hint_tables() -> Vec<(&'static str, MissionHints)> {
    vec![
        (
            "front-page",
            MissionHints {
                signatures: vec![
                    HintSignature::new(
                        "front-page:center",
                        "The <center> tag is obsolete. Let CSS handle alignment.",
                        |html, _| has_tag(html, "center"),
                    )
                    .with_error("deprecated tag <center>"),
                    HintSignature::new(
                        "front-page:font",
                        "The <font> tag is obsolete. Put the masthead text in a heading.",
                        |html, _| has_tag(html, "font"),
                    )
                    .with_error("deprecated tag <font>"),
                    HintSignature::new(
                        "front-page:deprecated",
                        "Another obsolete presentational tag is still on the page.",
                        |html, css| !rules::no_deprecated_tag(html, css),
                    )
                    .with_error("deprecated tag"),
                    HintSignature::new(
                        "front-page:masthead",
                        "The masthead must still read \"The Daily Byte\".",
                        |html, css| !rules::has_required_text(html, css),
                    ),
                    HintSignature::new(
                        "front-page:inline-style",
                        "Move the inline colour into the .alert rule in the stylesheet.",
                        |html, css| !rules::no_inline_style(html, css),
                    )
                    .with_error("inline style attribute"),
                    HintSignature::new(
                        "front-page:heading",
                        "Wrap the masthead in an <h1> and close it.",
                        |html, css| !rules::has_heading(html, css),
                    ),
                ],
                completion_message: "Front page restored. Check the clue board.".to_string(),
            },
        ),
        (
            "evidence-board",
            MissionHints {
                signatures: vec![
                    HintSignature::new(
                        "evidence-board:nav",
                        "Menus are navigation. Use a <nav> element.",
                        |html, css| !rules::has_semantic_nav(html, css),
                    ),
                    HintSignature::new(
                        "evidence-board:bare-link",
                        "An <a> without href goes nowhere. Add a destination.",
                        |html, css| !rules::links_have_href(html, css),
                    )
                    .with_error("link without href"),
                    HintSignature::new(
                        "evidence-board:alt-missing",
                        "None of the photos are described. Add alt text.",
                        |html, _| has_tag(html, "img") && !html.contains("alt="),
                    )
                    .with_error("image without alt"),
                    HintSignature::new(
                        "evidence-board:alt-partial",
                        "One of the photos still has no alt text.",
                        |html, css| !rules::images_have_alt(html, css),
                    ),
                ],
                completion_message: "Every piece of evidence is labelled.".to_string(),
            },
        ),
        (
            "hidden-memo",
            MissionHints {
                signatures: vec![
                    HintSignature::new(
                        "hidden-memo:important",
                        "!important is forcing the memos hidden. Remove it first.",
                        |html, css| !rules::css_no_important(html, css),
                    )
                    .with_error("!important override"),
                    HintSignature::new(
                        "hidden-memo:display-none",
                        "The memos are set to display: none.",
                        |_, css| compact(css).contains("display:none"),
                    ),
                    HintSignature::new(
                        "hidden-memo:visibility",
                        "The memos are still invisible. Drop visibility: hidden.",
                        |html, css| !rules::css_nothing_hidden(html, css),
                    ),
                    HintSignature::new(
                        "hidden-memo:float",
                        "Floats are fragile. Lay the board out with display: flex.",
                        |html, css| {
                            compact(css).contains("float:") && !rules::css_flex_layout(html, css)
                        },
                    ),
                    HintSignature::new(
                        "hidden-memo:flex",
                        "The board needs display: flex.",
                        |html, css| !rules::css_flex_layout(html, css),
                    ),
                    HintSignature::new(
                        "hidden-memo:font-size",
                        "The memo text is tiny. Set an explicit font-size.",
                        |html, css| !rules::css_font_size(html, css),
                    ),
                ],
                completion_message: "The memos are readable. Follow the lead.".to_string(),
            },
        ),
    ]
}

/// Resolver preloaded with the casebook's hint tables.
pub fn builtin_hints() -> HintResolver {
    let mut resolver = HintResolver::new();
    for (mission_id, hints) in hint_tables() {
        resolver.insert(mission_id, hints);
    }
    resolver
}

/// "The Missing Headline" with the built-in rules and hints.
pub fn builtin_engine() -> Result<PlaythroughEngine, ProgressionError> {
    PlaythroughEngine::new(
        Arc::new(missing_headline()),
        Arc::new(RuleRegistry::builtin()),
        Arc::new(builtin_hints()),
    )
}

fn beat(id: &str, title: &str, speaker: &str, dialogue: &str, background: &str) -> NarrativeBeat {
    NarrativeBeat {
        id: id.to_string(),
        title: title.to_string(),
        dialogue: dialogue.to_string(),
        speaker: speaker.to_string(),
        background: background.to_string(),
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
