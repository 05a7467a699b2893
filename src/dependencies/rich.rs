// src/dependencies/rich.rs

//! Rich (boolean) dependency expressions
//!
//! Parses strings such as `(foo >= 1.2 or bar) if baz` into a [`DepExpr`]
//! tree that can be evaluated against any [`Satisfier`].
//!
//! Grammar, loosest binding last:
//!
//! ```text
//! cond    := or [ ("if" | "unless") or [ "else" or ] ]
//! or      := and { "or" and }
//! and     := with { "and" with }
//! with    := primary { ("with" | "without") primary }
//! primary := "(" cond ")" | atom
//! atom    := NAME [ OP EVR ]
//! ```
//!
//! Names may contain balanced parentheses (`perl(Cwd)`), so `(` only opens
//! a group when it starts a token.

use crate::error::{Error, Result};
use crate::packages::{Capability, ContentId, Operator};
use crate::version::RpmVersion;
use std::collections::BTreeSet;
use std::fmt;

/// A parsed dependency expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepExpr {
    Atom(Capability),
    And(Box<DepExpr>, Box<DepExpr>),
    Or(Box<DepExpr>, Box<DepExpr>),
    /// `then if condition [else otherwise]`
    If {
        then: Box<DepExpr>,
        condition: Box<DepExpr>,
        otherwise: Option<Box<DepExpr>>,
    },
    /// `then unless condition [else otherwise]`
    Unless {
        then: Box<DepExpr>,
        condition: Box<DepExpr>,
        otherwise: Option<Box<DepExpr>>,
    },
    /// Both sides provided by the same package
    With(Box<DepExpr>, Box<DepExpr>),
    /// Left side provided by a package that does not provide the right side
    Without(Box<DepExpr>, Box<DepExpr>),
    Group(Box<DepExpr>),
}

/// Answers "is this capability available?" during evaluation
pub trait Satisfier {
    fn satisfies(&self, cap: &Capability) -> bool;

    /// Packages providing `cap`; only `with`/`without` need this
    ///
    /// Predicates that know nothing about packages treat every capability
    /// as provided by a package of its own name.
    fn providers(&self, cap: &Capability) -> BTreeSet<ContentId> {
        if self.satisfies(cap) {
            BTreeSet::from([ContentId::new(cap.name.clone())])
        } else {
            BTreeSet::new()
        }
    }
}

impl<F> Satisfier for F
where
    F: Fn(&Capability) -> bool,
{
    fn satisfies(&self, cap: &Capability) -> bool {
        self(cap)
    }
}

impl DepExpr {
    /// Parse a dependency string, rich or simple
    pub fn parse(input: &str) -> Result<DepExpr> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_cond()?;
        if let Some(tok) = parser.peek() {
            return Err(parser.error(tok.offset, format!("unexpected '{}'", tok.text)));
        }
        Ok(expr)
    }

    /// Evaluate top-down; `and`/`or` short-circuit
    pub fn evaluate<S: Satisfier + ?Sized>(&self, sat: &S) -> bool {
        match self {
            DepExpr::Atom(cap) => sat.satisfies(cap),
            DepExpr::And(left, right) => left.evaluate(sat) && right.evaluate(sat),
            DepExpr::Or(left, right) => left.evaluate(sat) || right.evaluate(sat),
            DepExpr::If {
                then,
                condition,
                otherwise,
            } => {
                if condition.evaluate(sat) {
                    then.evaluate(sat)
                } else {
                    otherwise.as_ref().is_none_or(|e| e.evaluate(sat))
                }
            }
            DepExpr::Unless {
                then,
                condition,
                otherwise,
            } => {
                if !condition.evaluate(sat) {
                    then.evaluate(sat)
                } else {
                    otherwise.as_ref().is_none_or(|e| e.evaluate(sat))
                }
            }
            DepExpr::With(..) | DepExpr::Without(..) => !self.providers(sat).is_empty(),
            DepExpr::Group(inner) => inner.evaluate(sat),
        }
    }

    /// Packages satisfying a `with`/`without` chain (or a single atom)
    pub fn providers<S: Satisfier + ?Sized>(&self, sat: &S) -> BTreeSet<ContentId> {
        match self {
            DepExpr::Atom(cap) => sat.providers(cap),
            DepExpr::With(left, right) => {
                let left = left.providers(sat);
                let right = right.providers(sat);
                left.intersection(&right).cloned().collect()
            }
            DepExpr::Without(left, right) => {
                let left = left.providers(sat);
                let right = right.providers(sat);
                left.difference(&right).cloned().collect()
            }
            DepExpr::Group(inner) => inner.providers(sat),
            _ => BTreeSet::new(),
        }
    }

    /// Every capability mentioned in the expression, in order of appearance
    pub fn atoms(&self) -> Vec<&Capability> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Capability>) {
        match self {
            DepExpr::Atom(cap) => out.push(cap),
            DepExpr::And(l, r)
            | DepExpr::Or(l, r)
            | DepExpr::With(l, r)
            | DepExpr::Without(l, r) => {
                l.collect_atoms(out);
                r.collect_atoms(out);
            }
            DepExpr::If {
                then,
                condition,
                otherwise,
            }
            | DepExpr::Unless {
                then,
                condition,
                otherwise,
            } => {
                then.collect_atoms(out);
                condition.collect_atoms(out);
                if let Some(e) = otherwise {
                    e.collect_atoms(out);
                }
            }
            DepExpr::Group(inner) => inner.collect_atoms(out),
        }
    }

    fn is_with_chain(&self) -> bool {
        match self {
            DepExpr::Atom(_) => true,
            DepExpr::With(l, r) | DepExpr::Without(l, r) => l.is_with_chain() && r.is_with_chain(),
            DepExpr::Group(inner) => inner.is_with_chain(),
            _ => false,
        }
    }
}

impl fmt::Display for DepExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepExpr::Atom(cap) => write!(f, "{}", cap),
            DepExpr::And(l, r) => write!(f, "{} and {}", l, r),
            DepExpr::Or(l, r) => write!(f, "{} or {}", l, r),
            DepExpr::With(l, r) => write!(f, "{} with {}", l, r),
            DepExpr::Without(l, r) => write!(f, "{} without {}", l, r),
            DepExpr::If {
                then,
                condition,
                otherwise,
            } => {
                write!(f, "{} if {}", then, condition)?;
                if let Some(e) = otherwise {
                    write!(f, " else {}", e)?;
                }
                Ok(())
            }
            DepExpr::Unless {
                then,
                condition,
                otherwise,
            } => {
                write!(f, "{} unless {}", then, condition)?;
                if let Some(e) = otherwise {
                    write!(f, " else {}", e)?;
                }
                Ok(())
            }
            DepExpr::Group(inner) => write!(f, "({})", inner),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Open,
    Close,
    Word,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    offset: usize,
}

fn syntax_error(input: &str, offset: usize, reason: impl Into<String>) -> Error {
    Error::ExpressionSyntax {
        expression: input.to_string(),
        offset,
        reason: reason.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'(' || c == b')' {
            tokens.push(Token {
                kind: if c == b'(' {
                    TokenKind::Open
                } else {
                    TokenKind::Close
                },
                text: (c as char).to_string(),
                offset: i,
            });
            i += 1;
            continue;
        }

        let start = i;
        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b if b.is_ascii_whitespace() => {
                    if depth > 0 {
                        return Err(syntax_error(input, start, "unbalanced parenthesis in name"));
                    }
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        if depth > 0 {
            return Err(syntax_error(input, start, "unbalanced parenthesis in name"));
        }
        tokens.push(Token {
            kind: TokenKind::Word,
            text: input[start..i].to_string(),
            offset: start,
        });
    }

    Ok(tokens)
}

const KEYWORDS: &[&str] = &["and", "or", "if", "unless", "else", "with", "without"];

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self) -> Option<&str> {
        self.peek()
            .filter(|t| t.kind == TokenKind::Word && KEYWORDS.contains(&t.text.as_str()))
            .map(|t| t.text.as_str())
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn end_offset(&self) -> usize {
        self.input.len()
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> Error {
        syntax_error(self.input, offset, reason)
    }

    fn parse_cond(&mut self) -> Result<DepExpr> {
        let then = self.parse_or()?;
        let Some(keyword) = self.peek_keyword() else {
            return Ok(then);
        };
        let is_if = match keyword {
            "if" => true,
            "unless" => false,
            _ => return Ok(then),
        };
        self.pos += 1;

        let condition = self.parse_or()?;
        let otherwise = if self.peek_keyword() == Some("else") {
            self.pos += 1;
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };

        if let Some(kw @ ("if" | "unless" | "else")) = self.peek_keyword() {
            let offset = self.peek().map_or(self.end_offset(), |t| t.offset);
            return Err(self.error(offset, format!("'{}' must be parenthesized", kw)));
        }

        let (then, condition) = (Box::new(then), Box::new(condition));
        Ok(if is_if {
            DepExpr::If {
                then,
                condition,
                otherwise,
            }
        } else {
            DepExpr::Unless {
                then,
                condition,
                otherwise,
            }
        })
    }

    fn parse_or(&mut self) -> Result<DepExpr> {
        let mut left = self.parse_and()?;
        while self.peek_keyword() == Some("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = DepExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<DepExpr> {
        let mut left = self.parse_with()?;
        while self.peek_keyword() == Some("and") {
            self.pos += 1;
            let right = self.parse_with()?;
            left = DepExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_with(&mut self) -> Result<DepExpr> {
        let start = self.peek().map_or(self.end_offset(), |t| t.offset);
        let mut left = self.parse_primary()?;
        while let Some(kw @ ("with" | "without")) = self.peek_keyword() {
            let with = kw == "with";
            self.pos += 1;
            let right = self.parse_primary()?;
            left = if with {
                DepExpr::With(Box::new(left), Box::new(right))
            } else {
                DepExpr::Without(Box::new(left), Box::new(right))
            };
            if !left.is_with_chain() {
                return Err(self.error(start, "'with'/'without' operands must be capabilities"));
            }
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<DepExpr> {
        let end = self.end_offset();
        let Some(tok) = self.next() else {
            return Err(self.error(end, "unexpected end of expression"));
        };

        match tok.kind {
            TokenKind::Open => {
                let inner = self.parse_cond()?;
                match self.next() {
                    Some(t) if t.kind == TokenKind::Close => Ok(DepExpr::Group(Box::new(inner))),
                    Some(t) => {
                        Err(self.error(t.offset, format!("expected ')', found '{}'", t.text)))
                    }
                    None => Err(self.error(tok.offset, "unbalanced '('")),
                }
            }
            TokenKind::Close => Err(self.error(tok.offset, "unexpected ')'")),
            TokenKind::Word if KEYWORDS.contains(&tok.text.as_str()) => Err(self.error(
                tok.offset,
                format!("expected a capability, found '{}'", tok.text),
            )),
            TokenKind::Word if Operator::from_symbol(&tok.text).is_some() => Err(self.error(
                tok.offset,
                format!("operator '{}' without a capability", tok.text),
            )),
            TokenKind::Word => self.parse_atom(tok),
        }
    }

    fn parse_atom(&mut self, name: Token) -> Result<DepExpr> {
        let op = match self.peek() {
            Some(t) if t.kind == TokenKind::Word => Operator::from_symbol(&t.text),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(DepExpr::Atom(Capability::named(name.text)));
        };
        self.pos += 1;

        let end = self.end_offset();
        let evr_tok = match self.next() {
            Some(t) if t.kind == TokenKind::Word && !KEYWORDS.contains(&t.text.as_str()) => t,
            Some(t) => {
                return Err(self.error(t.offset, format!("expected a version, found '{}'", t.text)));
            }
            None => return Err(self.error(end, "expected a version")),
        };
        let evr = RpmVersion::parse(&evr_tok.text)
            .map_err(|_| {
                self.error(evr_tok.offset, format!("invalid version '{}'", evr_tok.text))
            })?;

        Ok(DepExpr::Atom(Capability::versioned(name.text, op, &evr)))
    }
}
