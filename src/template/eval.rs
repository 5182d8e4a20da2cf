//! Template evaluation
//!
//! Depth-first walk over the parsed node tree. Conditional nodes render the
//! first branch whose condition holds (or the else branch); text nodes get
//! `{{field}}` interpolation with unknown fields left verbatim.

use crate::template::parser::{Condition, Node, Predicate, PredicateOp};
use crate::template::{PatternCache, TemplateContext};
use crate::utils::contains_ci;
use regex::Regex;

/// Render a node tree against a context
pub fn evaluate(
    nodes: &[Node],
    context: &TemplateContext,
    patterns: &PatternCache,
    interpolation: &Regex,
) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&interpolate(text, context, interpolation)),
            Node::Conditional(branches) => {
                for branch in branches {
                    let taken = match &branch.condition {
                        None => true,
                        Some(condition) => eval_condition(condition, context, patterns),
                    };
                    if taken {
                        out.push_str(&evaluate(&branch.body, context, patterns, interpolation));
                        break;
                    }
                }
            }
        }
    }
    out
}

fn eval_condition(condition: &Condition, context: &TemplateContext, patterns: &PatternCache) -> bool {
    condition
        .any
        .iter()
        .any(|conj| conj.all.iter().all(|p| eval_predicate(p, context, patterns)))
}

fn eval_predicate(predicate: &Predicate, context: &TemplateContext, patterns: &PatternCache) -> bool {
    let Some(field_value) = context.get(&predicate.field) else {
        return false;
    };
    match predicate.op {
        PredicateOp::Contains => contains_ci(&field_value, &predicate.value),
        PredicateOp::Matches => patterns.test(&predicate.value, &field_value),
    }
}

fn interpolate(text: &str, context: &TemplateContext, interpolation: &Regex) -> String {
    interpolation
        .replace_all(text, |captures: &regex::Captures<'_>| {
            match context.get(&captures[1]) {
                Some(value) => value,
                // Leave unknown fields verbatim so typos stay visible
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}
