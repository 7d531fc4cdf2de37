/// CodeCase Engine — Rule Predicate Library
///
/// Each condition is a pure substring/pattern predicate over lower-cased
/// HTML and CSS text. This is deliberately not a parser: mission content is
/// tuned against these exact semantics.
///
/// Unknown condition identifiers fail closed (not satisfied).

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

/// `fn(html_lower, css_lower) -> satisfied`.
pub type Predicate = fn(&str, &str) -> bool;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("unknown condition {0:?}")]
    UnknownCondition(String),
}

/// Identifier → predicate table. Constructed per playthrough host.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    predicates: BTreeMap<String, Predicate>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.predicates.keys()).finish()
    }
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in condition.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (id, predicate) in BUILTIN_CONDITIONS {
            registry.register(*id, *predicate);
        }
        registry
    }

    /// Add or replace a condition. Returns the replaced predicate, if any.
    pub fn register(&mut self, id: impl Into<String>, predicate: Predicate) -> Option<Predicate> {
        self.predicates.insert(id.into(), predicate)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.predicates.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    pub fn lookup(&self, id: &str) -> Result<Predicate, RuleError> {
        self.predicates
            .get(id)
            .copied()
            .ok_or_else(|| RuleError::UnknownCondition(id.to_string()))
    }

    /// Evaluate one condition against raw (not yet lower-cased) text.
    pub fn check(&self, id: &str, html: &str, css: &str) -> bool {
        self.check_lowered(id, &html.to_lowercase(), &css.to_lowercase())
    }

    /// Evaluate one condition against text the caller already lower-cased.
    pub fn check_lowered(&self, id: &str, html: &str, css: &str) -> bool {
        match self.lookup(id) {
            Ok(predicate) => predicate(html, css),
            Err(err) => {
                warn!(condition = id, error = %err, "condition failed closed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in conditions
// ---------------------------------------------------------------------------

/// Masthead text every front-page mission must keep.
pub const REQUIRED_TEXT_MARKER: &str = "the daily byte";

/// Presentational tags dropped from modern HTML.
pub const DEPRECATED_TAGS: &[&str] = &["font", "center", "marquee", "blink", "big", "strike"];

pub const BUILTIN_CONDITIONS: &[(&str, Predicate)] = &[
    ("no-deprecated-tag", no_deprecated_tag),
    ("has-required-text", has_required_text),
    ("no-inline-style", no_inline_style),
    ("has-heading", has_heading),
    ("headline-restored", headline_restored),
    ("images-have-alt", images_have_alt),
    ("links-have-href", links_have_href),
    ("has-semantic-nav", has_semantic_nav),
    ("list-structure", list_structure),
    ("css-text-color", css_text_color),
    ("css-font-size", css_font_size),
    ("css-flex-layout", css_flex_layout),
    ("css-nothing-hidden", css_nothing_hidden),
    ("css-no-important", css_no_important),
];

pub fn no_deprecated_tag(html: &str, _css: &str) -> bool {
    !DEPRECATED_TAGS.iter().any(|tag| has_tag(html, tag))
}

pub fn has_required_text(html: &str, _css: &str) -> bool {
    html.contains(REQUIRED_TEXT_MARKER)
}

pub fn no_inline_style(html: &str, _css: &str) -> bool {
    !html.contains("style=")
}

pub fn has_heading(html: &str, _css: &str) -> bool {
    has_tag(html, "h1") && html.contains("</h1>")
}

/// No deprecated marker, masthead present, no inline style.
pub fn headline_restored(html: &str, css: &str) -> bool {
    no_deprecated_tag(html, css) && has_required_text(html, css) && no_inline_style(html, css)
}

/// Every `<img ...>` tag carries an `alt=` attribute.
pub fn images_have_alt(html: &str, _css: &str) -> bool {
    tag_spans(html, "img").all(|span| span.contains("alt="))
}

/// Every `<a ...>` tag carries an `href=` attribute.
pub fn links_have_href(html: &str, _css: &str) -> bool {
    tag_spans(html, "a").all(|span| span.contains("href="))
}

pub fn has_semantic_nav(html: &str, _css: &str) -> bool {
    has_tag(html, "nav") && html.contains("</nav>")
}

pub fn list_structure(html: &str, _css: &str) -> bool {
    (has_tag(html, "ul") || has_tag(html, "ol")) && has_tag(html, "li")
}

/// A `color:` declaration that is not `background-color:`.
pub fn css_text_color(_html: &str, css: &str) -> bool {
    let css = compact(css);
    css.match_indices("color:")
        .any(|(at, _)| at == 0 || css.as_bytes()[at - 1] != b'-')
}

pub fn css_font_size(_html: &str, css: &str) -> bool {
    compact(css).contains("font-size:")
}

pub fn css_flex_layout(_html: &str, css: &str) -> bool {
    let css = compact(css);
    css.contains("display:flex") || css.contains("display:inline-flex")
}

pub fn css_nothing_hidden(_html: &str, css: &str) -> bool {
    let css = compact(css);
    !css.contains("display:none") && !css.contains("visibility:hidden")
}

pub fn css_no_important(_html: &str, css: &str) -> bool {
    !compact(css).contains("!important")
}

// ---------------------------------------------------------------------------
// Pattern helpers
// ---------------------------------------------------------------------------

/// `<name` followed by a tag boundary (`>`, `/` or whitespace) or end of text.
pub fn has_tag(html: &str, name: &str) -> bool {
    tag_starts(html, name).next().is_some()
}

/// Byte offsets of every `<name` opening that ends at a tag boundary.
fn tag_starts<'a>(html: &'a str, name: &'a str) -> impl Iterator<Item = usize> + 'a {
    html.match_indices('<').filter_map(move |(at, _)| {
        let rest = &html[at + 1..];
        if !rest.starts_with(name) {
            return None;
        }
        match rest.as_bytes().get(name.len()) {
            None => Some(at),
            Some(b) if *b == b'>' || *b == b'/' || b.is_ascii_whitespace() => Some(at),
            Some(_) => None,
        }
    })
}

/// Text of each `<name ...>` tag up to (not including) its closing `>`.
/// An unterminated tag runs to the end of the text.
fn tag_spans<'a>(html: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    tag_starts(html, name).map(move |at| {
        let rest = &html[at..];
        match rest.find('>') {
            Some(end) => &rest[..end],
            None => rest,
        }
    })
}

/// CSS with all whitespace removed, so `display : none` matches `display:none`.
pub fn compact(css: &str) -> String {
    css.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_condition_fails_closed() {
        let registry = RuleRegistry::builtin();
        assert!(!registry.check("no-such-condition", "<h1>x</h1>", ""));
        assert!(matches!(
            registry.lookup("no-such-condition"),
            Err(RuleError::UnknownCondition(id)) if id == "no-such-condition"
        ));
    }

    #[test]
    fn test_check_lowercases_input() {
        let registry = RuleRegistry::builtin();
        assert!(!registry.check("no-deprecated-tag", "<FONT size=2>x</FONT>", ""));
        assert!(registry.check("has-required-text", "<h1>The Daily Byte</h1>", ""));
    }

    #[test]
    fn test_register_replaces() {
        fn always(_: &str, _: &str) -> bool {
            true
        }
        let mut registry = RuleRegistry::builtin();
        assert!(registry.register("has-heading", always).is_some());
        assert!(registry.check("has-heading", "", ""));
        assert!(registry.register("custom", always).is_none());
        assert!(registry.contains("custom"));
    }

    #[test]
    fn test_has_tag_boundaries() {
        assert!(has_tag("<font>", "font"));
        assert!(has_tag("<font size=\"2\">", "font"));
        assert!(has_tag("<br/>", "br"));
        assert!(!has_tag("<footer>", "font"));
        assert!(!has_tag("<bigger>", "big"));
        assert!(!has_tag("<a>", "abbr"));
    }

    #[test]
    fn test_images_have_alt() {
        assert!(images_have_alt("<p>no images</p>", ""));
        assert!(images_have_alt("<img src=\"a\" alt=\"dock\"><img alt=\"\" src=\"b\">", ""));
        assert!(!images_have_alt("<img src=\"a\" alt=\"dock\"><img src=\"b\">", ""));
    }

    #[test]
    fn test_links_have_href() {
        assert!(links_have_href("<a href=\"/\">home</a>", ""));
        assert!(!links_have_href("<a>home</a> <a href=\"/x\">x</a>", ""));
        assert!(links_have_href("<abbr>n/a</abbr>", ""));
    }

    #[test]
    fn test_css_text_color_ignores_background() {
        assert!(!css_text_color("", ".x { background-color: red; }"));
        assert!(css_text_color("", ".x { background-color: red; color: #222; }"));
        assert!(css_text_color("", "color:blue"));
    }

    #[test]
    fn test_css_checks_ignore_whitespace() {
        assert!(!css_nothing_hidden("", ".memo { display : none; }"));
        assert!(!css_nothing_hidden("", ".memo{visibility:hidden}"));
        assert!(css_flex_layout("", ".board { display: flex; }"));
        assert!(!css_no_important("", ".memo { color: red ! important; }"));
    }

    #[test]
    fn test_headline_restored_is_conjunction() {
        let ok = "<h1>the daily byte</h1>";
        assert!(headline_restored(ok, ""));
        assert!(!headline_restored("<center>the daily byte</center>", ""));
        assert!(!headline_restored("<h1 style=\"color:red\">the daily byte</h1>", ""));
        assert!(!headline_restored("<h1>the nightly byte</h1>", ""));
    }
}
