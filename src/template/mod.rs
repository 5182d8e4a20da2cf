//! Conditional message template engine
//!
//! A two-stage compiler over a small conditional language embedded in free
//! text. The [`lexer`] splits a template into literal text and
//! `{{#if}}`/`{{#elseif}}`/`{{#else}}`/`{{/if}}` tags, the [`parser`] builds
//! a tree of text and conditional nodes, and [`eval`] renders the tree
//! against a lobby snapshot.
//!
//! Syntax:
//!
//! ```text
//! {{#if name contains "DotA"}}@DotARole{{#else}}@everyone{{/if}} - {{host}} hosts {{map}}
//! ```
//!
//! Conditions are disjunctions of conjunctions of single predicates
//! (`field contains "literal"` or `field matches "/pattern/flags"`); `and`
//! binds tighter than `or`, both left-associative, no parentheses.
//! `{{field}}` interpolation replaces known fields and leaves unknown names
//! verbatim so authoring typos stay visible.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use parser::{Branch, Condition, Node, Predicate, PredicateOp};

use crate::types::{CompiledPattern, Lobby};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

/// Errors surfaced while compiling a template
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unterminated template tag")]
    UnterminatedTag,

    #[error("Unexpected {tag} outside a conditional")]
    UnexpectedTag { tag: String },

    #[error("Conditional is missing its closing /if tag")]
    MissingEndIf,

    #[error("No branches may follow an else branch")]
    BranchAfterElse,

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),
}

/// Field values a template is rendered against
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub name: String,
    pub map: String,
    pub host: String,
    pub server: String,
    pub slots_taken: u32,
    pub slots_total: u32,
}

impl TemplateContext {
    /// Look up a field by its template-language name
    pub fn get(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "map" => Some(self.map.clone()),
            "host" => Some(self.host.clone()),
            "server" => Some(self.server.clone()),
            "slotsTaken" => Some(self.slots_taken.to_string()),
            "slotsTotal" => Some(self.slots_total.to_string()),
            _ => None,
        }
    }
}

impl From<&Lobby> for TemplateContext {
    fn from(lobby: &Lobby) -> Self {
        Self {
            name: lobby.name.clone(),
            map: lobby.map.clone(),
            host: lobby.host.clone(),
            server: lobby.server.clone(),
            slots_taken: lobby.slots_taken,
            slots_total: lobby.slots_total,
        }
    }
}

/// Cache of compiled `matches` patterns keyed by their `/pattern/flags`
/// literal. Invalid literals are remembered as failures so they are not
/// re-parsed on every evaluation.
#[derive(Debug, Default)]
pub struct PatternCache {
    inner: Mutex<HashMap<String, Option<CompiledPattern>>>,
}

impl PatternCache {
    /// Test `text` against the pattern literal; invalid patterns never match
    pub fn test(&self, literal: &str, text: &str) -> bool {
        let Ok(mut cache) = self.inner.lock() else {
            return false;
        };
        let compiled = cache
            .entry(literal.to_string())
            .or_insert_with(|| CompiledPattern::parse_literal(literal));
        compiled.as_ref().is_some_and(|p| p.is_match(text))
    }
}

/// Compiling/rendering engine owning the pattern cache
#[derive(Debug)]
pub struct TemplateEngine {
    patterns: PatternCache,
    interpolation: Regex,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            patterns: PatternCache::default(),
            interpolation: Regex::new(r"\{\{(\w+)\}\}").expect("interpolation pattern is valid"),
        }
    }

    /// Compile a template into its node tree
    pub fn compile(&self, template: &str) -> Result<Vec<Node>, TemplateError> {
        parser::parse(lexer::tokenize(template)?)
    }

    /// Render a template against a context.
    ///
    /// An empty or absent template yields `None` ("nothing to send") rather
    /// than an error.
    pub fn render(
        &self,
        template: Option<&str>,
        context: &TemplateContext,
    ) -> Result<Option<String>, TemplateError> {
        let Some(template) = template else {
            return Ok(None);
        };
        if template.is_empty() {
            return Ok(None);
        }

        let nodes = self.compile(template)?;
        Ok(Some(eval::evaluate(
            &nodes,
            context,
            &self.patterns,
            &self.interpolation,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext {
            name: "DotA v6.83 -apem".to_string(),
            map: "DotA Allstars".to_string(),
            host: "Player123".to_string(),
            server: "us".to_string(),
            slots_taken: 5,
            slots_total: 10,
        }
    }

    fn render(template: &str) -> Option<String> {
        TemplateEngine::new()
            .render(Some(template), &context())
            .unwrap()
    }

    #[test]
    fn test_absent_or_empty_template_yields_nothing() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render(None, &context()).unwrap(), None);
        assert_eq!(engine.render(Some(""), &context()).unwrap(), None);
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("Just a plain message").unwrap(), "Just a plain message");
    }

    #[test]
    fn test_if_contains() {
        assert_eq!(
            render("{{#if name contains \"DotA\"}}Found DotA{{/if}}").unwrap(),
            "Found DotA"
        );
        assert_eq!(
            render("{{#if name contains \"Legion\"}}Found Legion{{/if}}").unwrap(),
            ""
        );
        assert_eq!(
            render("{{#if name contains \"dota\"}}Found{{/if}}").unwrap(),
            "Found"
        );
    }

    #[test]
    fn test_if_matches() {
        assert_eq!(
            render("{{#if name matches \"/dota/i\"}}Matched{{/if}}").unwrap(),
            "Matched"
        );
        assert_eq!(
            render("{{#if name matches \"/^Legion/\"}}Matched{{/if}}").unwrap(),
            ""
        );
        assert_eq!(
            render("{{#if map matches \"/allstars$/i\"}}Matched{{/if}}").unwrap(),
            "Matched"
        );
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        assert_eq!(
            render("{{#if name matches \"/(/\"}}Broken{{#else}}Fallback{{/if}}").unwrap(),
            "Fallback"
        );
    }

    #[test]
    fn test_if_else_chain() {
        assert_eq!(
            render("{{#if name contains \"DotA\"}}Its DotA{{#else}}Not DotA{{/if}}").unwrap(),
            "Its DotA"
        );
        assert_eq!(
            render("{{#if name contains \"Legion\"}}Legion{{#else}}Other{{/if}}").unwrap(),
            "Other"
        );
        assert_eq!(
            render(
                "{{#if name contains \"Legion\"}}L{{#elseif map contains \"Allstars\"}}A{{#else}}O{{/if}}"
            )
            .unwrap(),
            "A"
        );
    }

    #[test]
    fn test_nested_conditionals() {
        let template = "{{#if name contains \"DotA\"}}\
                        outer {{#if server contains \"us\"}}inner{{/if}}\
                        {{/if}}";
        assert_eq!(render(template).unwrap(), "outer inner");
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // a ∨ (b ∧ c): first clause true regardless of the conjunction
        let template = "{{#if name contains \"dota\" or map contains \"nope\" and server contains \"kr\"}}T{{/if}}";
        assert_eq!(render(template).unwrap(), "T");

        // a false, b ∧ c true
        let template = "{{#if name contains \"nope\" or map contains \"allstars\" and server contains \"us\"}}T{{/if}}";
        assert_eq!(render(template).unwrap(), "T");

        // a false, b true, c false: (a ∨ (b ∧ c)) = false; ((a ∨ b) ∧ c) would be true were precedence wrong... inverted
        let template = "{{#if name contains \"nope\" or map contains \"allstars\" and server contains \"kr\"}}T{{#else}}F{{/if}}";
        assert_eq!(render(template).unwrap(), "F");
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            render("{{host}} hosts {{map}} ({{slotsTaken}}/{{slotsTotal}})").unwrap(),
            "Player123 hosts DotA Allstars (5/10)"
        );
    }

    #[test]
    fn test_unknown_fields_left_verbatim() {
        assert_eq!(render("hello {{nonsense}}").unwrap(), "hello {{nonsense}}");
    }

    #[test]
    fn test_interpolation_inside_conditional_body() {
        assert_eq!(
            render("{{#if name contains \"DotA\"}}{{host}} is hosting{{/if}}").unwrap(),
            "Player123 is hosting"
        );
    }

    #[test]
    fn test_compile_errors() {
        let engine = TemplateEngine::new();
        assert_eq!(
            engine.render(Some("{{#if name contains \"x\"}}body"), &context()),
            Err(TemplateError::MissingEndIf)
        );
        assert!(matches!(
            engine.render(Some("text {{/if}}"), &context()),
            Err(TemplateError::UnexpectedTag { .. })
        ));
        assert!(matches!(
            engine.render(Some("{{#if name frobs \"x\"}}b{{/if}}"), &context()),
            Err(TemplateError::InvalidCondition(_))
        ));
    }
}
