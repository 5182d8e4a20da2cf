//! Template tokenizer
//!
//! Splits a template into literal text runs and conditional tags. Plain
//! `{{field}}` interpolation is not a tag; it stays inside text runs and is
//! resolved during evaluation.

use crate::template::TemplateError;

/// A lexed template token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    /// `{{#if <condition>}}` with the raw condition text
    If(String),
    /// `{{#elseif <condition>}}` with the raw condition text
    ElseIf(String),
    /// `{{#else}}`
    Else,
    /// `{{/if}}`
    EndIf,
}

const ELSE_TAG: &str = "{{#else}}";
const ENDIF_TAG: &str = "{{/if}}";

/// Tokenize a template into text and tag tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    let mut flush = |text: &mut String, tokens: &mut Vec<Token>| {
        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(text)));
        }
    };

    while let Some(open) = rest.find("{{") {
        text.push_str(&rest[..open]);
        let tail = &rest[open..];

        if let Some(condition) = condition_tag(tail, "{{#if")? {
            flush(&mut text, &mut tokens);
            tokens.push(Token::If(condition.text));
            rest = &tail[condition.consumed..];
        } else if let Some(condition) = condition_tag(tail, "{{#elseif")? {
            flush(&mut text, &mut tokens);
            tokens.push(Token::ElseIf(condition.text));
            rest = &tail[condition.consumed..];
        } else if tail.starts_with(ELSE_TAG) {
            flush(&mut text, &mut tokens);
            tokens.push(Token::Else);
            rest = &tail[ELSE_TAG.len()..];
        } else if tail.starts_with(ENDIF_TAG) {
            flush(&mut text, &mut tokens);
            tokens.push(Token::EndIf);
            rest = &tail[ENDIF_TAG.len()..];
        } else {
            // Not a conditional tag; keep the braces as literal text
            text.push_str("{{");
            rest = &tail[2..];
        }
    }

    text.push_str(rest);
    flush(&mut text, &mut tokens);
    Ok(tokens)
}

struct TagBody {
    text: String,
    consumed: usize,
}

/// Match a `{{#if`/`{{#elseif` tag at the start of `tail`, returning the raw
/// condition text and total tag length. The keyword must be followed by
/// whitespace; anything else is treated as literal text by the caller.
fn condition_tag(tail: &str, keyword: &str) -> Result<Option<TagBody>, TemplateError> {
    let Some(after) = tail.strip_prefix(keyword) else {
        return Ok(None);
    };
    if !after.starts_with(char::is_whitespace) {
        return Ok(None);
    }
    let Some(close) = after.find("}}") else {
        return Err(TemplateError::UnterminatedTag);
    };
    Ok(Some(TagBody {
        text: after[..close].trim().to_string(),
        consumed: keyword.len() + close + 2,
    }))
}
