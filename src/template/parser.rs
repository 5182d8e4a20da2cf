//! Template parser
//!
//! Builds a tree of text and conditional nodes from the lexer's token stream
//! and parses branch conditions into a disjunction-of-conjunctions form.

use crate::template::lexer::Token;
use crate::template::TemplateError;
use std::iter::Peekable;
use std::vec::IntoIter;

/// A parsed template node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    /// Ordered branches; the first whose condition holds (or is `None` for
    /// else) is rendered
    Conditional(Vec<Branch>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// `None` marks the else branch
    pub condition: Option<Condition>,
    pub body: Vec<Node>,
}

/// Disjunction of conjunctions; `and` binds tighter than `or`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub any: Vec<Conjunction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conjunction {
    pub all: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub op: PredicateOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Contains,
    Matches,
}

type Tokens = Peekable<IntoIter<Token>>;

/// Parse a token stream into a node tree
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Node>, TemplateError> {
    let mut iter = tokens.into_iter().peekable();
    let nodes = parse_nodes(&mut iter)?;
    match iter.next() {
        None => Ok(nodes),
        Some(token) => Err(TemplateError::UnexpectedTag {
            tag: tag_name(&token),
        }),
    }
}

/// Parse nodes until a branch-delimiting tag or the end of input
fn parse_nodes(iter: &mut Tokens) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();
    while let Some(token) = iter.peek() {
        match token {
            Token::Text(_) => {
                if let Some(Token::Text(text)) = iter.next() {
                    nodes.push(Node::Text(text));
                }
            }
            Token::If(_) => {
                let Some(Token::If(condition)) = iter.next() else {
                    unreachable!("peeked an if tag");
                };
                nodes.push(parse_conditional(condition, iter)?);
            }
            Token::ElseIf(_) | Token::Else | Token::EndIf => break,
        }
    }
    Ok(nodes)
}

fn parse_conditional(first: String, iter: &mut Tokens) -> Result<Node, TemplateError> {
    let mut branches = Vec::new();
    let mut pending = Some(parse_condition(&first)?);
    let mut seen_else = false;

    loop {
        let body = parse_nodes(iter)?;
        branches.push(Branch {
            condition: pending.take(),
            body,
        });

        match iter.next() {
            Some(Token::ElseIf(condition)) => {
                if seen_else {
                    return Err(TemplateError::BranchAfterElse);
                }
                pending = Some(parse_condition(&condition)?);
            }
            Some(Token::Else) => {
                if seen_else {
                    return Err(TemplateError::BranchAfterElse);
                }
                seen_else = true;
            }
            Some(Token::EndIf) => break,
            None => return Err(TemplateError::MissingEndIf),
            Some(token) => {
                // Text and nested ifs are consumed by parse_nodes
                return Err(TemplateError::UnexpectedTag {
                    tag: tag_name(&token),
                });
            }
        }
    }

    Ok(Node::Conditional(branches))
}

fn tag_name(token: &Token) -> String {
    match token {
        Token::Text(_) => "text".to_string(),
        Token::If(_) => "#if".to_string(),
        Token::ElseIf(_) => "#elseif".to_string(),
        Token::Else => "#else".to_string(),
        Token::EndIf => "/if".to_string(),
    }
}

/// Condition-level lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
enum CondToken {
    Word(String),
    Quoted(String),
}

fn condition_tokens(src: &str) -> Result<Vec<CondToken>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => value.push(ch),
                    None => {
                        return Err(TemplateError::InvalidCondition(format!(
                            "unterminated string in `{src}`"
                        )))
                    }
                }
            }
            tokens.push(CondToken::Quoted(value));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(CondToken::Word(word));
        }
    }
    Ok(tokens)
}

/// Parse a condition: `pred (and pred)* (or pred (and pred)*)*`
pub fn parse_condition(src: &str) -> Result<Condition, TemplateError> {
    let tokens = condition_tokens(src)?;
    let mut iter = tokens.into_iter().peekable();
    let mut any = Vec::new();

    loop {
        let mut all = vec![parse_predicate(&mut iter, src)?];
        while matches!(iter.peek(), Some(CondToken::Word(w)) if w == "and") {
            iter.next();
            all.push(parse_predicate(&mut iter, src)?);
        }
        any.push(Conjunction { all });

        match iter.next() {
            None => break,
            Some(CondToken::Word(w)) if w == "or" => continue,
            Some(_) => {
                return Err(TemplateError::InvalidCondition(format!(
                    "expected `and`/`or` in `{src}`"
                )))
            }
        }
    }

    Ok(Condition { any })
}

fn parse_predicate(
    iter: &mut Peekable<IntoIter<CondToken>>,
    src: &str,
) -> Result<Predicate, TemplateError> {
    let field = match iter.next() {
        Some(CondToken::Word(w)) if w != "and" && w != "or" => w,
        _ => {
            return Err(TemplateError::InvalidCondition(format!(
                "expected field name in `{src}`"
            )))
        }
    };
    let op = match iter.next() {
        Some(CondToken::Word(w)) if w == "contains" => PredicateOp::Contains,
        Some(CondToken::Word(w)) if w == "matches" => PredicateOp::Matches,
        _ => {
            return Err(TemplateError::InvalidCondition(format!(
                "expected `contains` or `matches` in `{src}`"
            )))
        }
    };
    let value = match iter.next() {
        Some(CondToken::Quoted(v)) => v,
        _ => {
            return Err(TemplateError::InvalidCondition(format!(
                "expected quoted value in `{src}`"
            )))
        }
    };
    Ok(Predicate { field, op, value })
}
