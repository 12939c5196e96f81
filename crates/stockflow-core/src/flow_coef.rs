//! Parsing of Godley table cells and initial-condition expressions.
//!
//! Cells hold signed linear terms such as `Lending`, `-Repayment`, `0.5*Wages` or
//! `Lending-Repayment`. Each term is a [`FlowCoef`]: a coefficient applied to a
//! named variable, or a bare number when the name is empty.
//!
//! Accepted grammar, whitespace allowed between tokens:
//!
//! ```text
//! cell  := term (('+' | '-') term)*
//! term  := sign* (number | name | number '*' name | name '*' number)
//! sign  := '+' | '-'
//! name  := (letter | '_' | ':' | '.') (letter | digit | '_' | ':' | '.')*
//! ```
//!
//! A `-` outside a numeric exponent (`1e-3`) always separates terms, so
//! `Banks-Equity` is two terms. Names never contain whitespace or hyphens; use
//! `Banks_Equity` instead.

use crate::errors::{SimError, SimResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `coef * name` term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCoef {
    pub coef: FloatValue,
    /// Referenced variable name. Empty for a literal.
    pub name: String,
}

impl FlowCoef {
    pub fn new(coef: FloatValue, name: impl Into<String>) -> Self {
        Self {
            coef,
            name: name.into(),
        }
    }

    pub fn is_literal(&self) -> bool {
        self.name.is_empty()
    }

    /// Parse a single term. Leading signs may repeat (`--x` is `x`).
    pub fn parse(term: &str) -> SimResult<Self> {
        let invalid = || SimError::InvalidFlowCoefficient(term.to_string());

        let mut sign = 1.0;
        let mut rest = term.trim();
        while let Some(c) = rest.chars().next() {
            match c {
                '-' => sign = -sign,
                '+' => {}
                _ => break,
            }
            rest = rest[1..].trim_start();
        }
        if rest.is_empty() {
            return Err(invalid());
        }

        if let Some((lhs, rhs)) = rest.split_once('*') {
            let (lhs, rhs) = (lhs.trim(), rhs.trim());
            let (coef, name) = match (lhs.parse::<FloatValue>(), rhs.parse::<FloatValue>()) {
                (Ok(coef), _) => (coef, rhs),
                (Err(_), Ok(coef)) => (coef, lhs),
                _ => return Err(invalid()),
            };
            if !is_valid_name(name) {
                return Err(invalid());
            }
            return Ok(Self::new(sign * coef, name));
        }

        match rest.parse::<FloatValue>() {
            Ok(value) => Ok(Self::new(sign * value, "")),
            Err(_) if is_valid_name(rest) => Ok(Self::new(sign, rest)),
            Err(_) => Err(invalid()),
        }
    }
}

impl fmt::Display for FlowCoef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_literal() {
            return write!(f, "{}", self.coef);
        }
        if self.coef == 1.0 {
            write!(f, "{}", self.name)
        } else if self.coef == -1.0 {
            write!(f, "-{}", self.name)
        } else {
            write!(f, "{}*{}", self.coef, self.name)
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':' || c == '.'
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(is_ident_char)
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// Whether the sign at `i` belongs to a numeric exponent such as `1e-3`.
fn is_exponent_sign(chars: &[(usize, char)], i: usize) -> bool {
    if i < 2 || !matches!(chars[i - 1].1, 'e' | 'E') {
        return false;
    }
    let mut j = i - 1;
    let mut saw_digit = false;
    while j > 0 && (chars[j - 1].1.is_ascii_digit() || chars[j - 1].1 == '.') {
        j -= 1;
        saw_digit = true;
    }
    saw_digit && (j == 0 || !is_ident_char(chars[j - 1].1))
}

/// Split an expression into its additive terms.
///
/// An empty (or whitespace-only) expression has no terms.
pub fn parse_terms(expr: &str) -> SimResult<Vec<FlowCoef>> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(vec![]);
    }

    let chars: Vec<(usize, char)> = expr.char_indices().collect();
    let mut terms = Vec::new();
    let mut start = 0;
    for (i, &(pos, c)) in chars.iter().enumerate() {
        if !matches!(c, '+' | '-') || pos == start || is_exponent_sign(&chars, i) {
            continue;
        }
        let segment = &expr[start..pos];
        // Only signs so far: this sign is a unary prefix of the same term
        if segment
            .trim_start_matches(|c: char| c == '+' || c == '-' || c.is_whitespace())
            .is_empty()
        {
            continue;
        }
        terms.push(FlowCoef::parse(segment)?);
        start = pos;
    }
    terms.push(FlowCoef::parse(&expr[start..])?);
    Ok(terms)
}

/// Render terms back into canonical cell text.
pub fn format_terms(terms: &[FlowCoef]) -> String {
    let mut out = String::new();
    for term in terms {
        let rendered = term.to_string();
        if !out.is_empty() && !rendered.starts_with('-') {
            out.push('+');
        }
        out.push_str(&rendered);
    }
    out
}
