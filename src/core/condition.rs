//! Boolean guard expressions for `if:` fields
//!
//! Expressions compare quoted strings and combine the results. Substituted
//! values arrive already single-quoted, so tokens are written bare:
//!
//! ```text
//! ${{build.arch}} == 'x86_64' && !(${{options.fast.enabled}} == 'true')
//! ```
//!
//! A lone operand must be `true` or `false` (bare or quoted).

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{anychar, char, multispace0},
    combinator::{all_consuming, map, not, opt, value},
    multi::{fold_many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("empty expression")]
    Empty,

    #[error("syntax error at offset {offset} near {near:?}")]
    Syntax { offset: usize, near: String },

    #[error("value {0:?} is not a boolean")]
    NotBoolean(String),
}

/// Parsed guard expression
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Literal(String),
    Compare {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negate: bool,
    },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    // Every operand is evaluated so errors surface whatever the short-circuit
    // outcome would have been.
    fn truth(&self) -> Result<bool, ConditionError> {
        match self {
            Expr::Literal(text) => match text.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConditionError::NotBoolean(text.clone())),
            },
            Expr::Compare { lhs, rhs, negate } => Ok((lhs.text()? == rhs.text()?) != *negate),
            Expr::Not(inner) => Ok(!inner.truth()?),
            Expr::And(terms) => Ok(truths(terms)?.into_iter().all(|v| v)),
            Expr::Or(terms) => Ok(truths(terms)?.into_iter().any(|v| v)),
        }
    }

    fn text(&self) -> Result<String, ConditionError> {
        match self {
            Expr::Literal(text) => Ok(text.clone()),
            other => other.truth().map(|b| b.to_string()),
        }
    }
}

fn truths(terms: &[Expr]) -> Result<Vec<bool>, ConditionError> {
    terms.iter().map(Expr::truth).collect()
}

/// Evaluate a guard expression
pub fn evaluate(expr: &str) -> Result<bool, ConditionError> {
    if expr.trim().is_empty() {
        return Err(ConditionError::Empty);
    }

    let (_, parsed) = all_consuming(or_expr)(expr).map_err(|e| syntax_error(expr, e))?;
    parsed.truth()
}

fn syntax_error(expr: &str, err: nom::Err<nom::error::Error<&str>>) -> ConditionError {
    let rest = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
        nom::Err::Incomplete(_) => "",
    };
    ConditionError::Syntax {
        offset: expr.len() - rest.len(),
        near: rest.chars().take(16).collect(),
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn op<'a>(symbol: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    ws(tag(symbol))
}

fn join(mut terms: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        combine(terms)
    }
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(op("||"), and_expr), |terms| join(terms, Expr::Or))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(op("&&"), unary), |terms| join(terms, Expr::And))(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(ws(terminated(char('!'), not(char('=')))), unary),
            |inner| Expr::Not(Box::new(inner)),
        ),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = atom(input)?;
    let (input, rhs) = opt(pair(
        alt((value(false, op("==")), value(true, op("!=")))),
        atom,
    ))(input)?;

    let expr = match rhs {
        Some((negate, rhs)) => Expr::Compare {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            negate,
        },
        None => lhs,
    };
    Ok((input, expr))
}

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), or_expr, ws(char(')'))),
        map(alt((single_quoted, double_quoted, word)), Expr::Literal),
    )))(input)
}

/// Quoted string; a backslash takes the next character literally
fn quoted<'a>(input: &'a str, quote: char, stop: &'static str) -> IResult<&'a str, String> {
    delimited(
        char(quote),
        fold_many0(
            alt((
                map(is_not(stop), String::from),
                map(preceded(char('\\'), anychar), String::from),
            )),
            String::new,
            |mut acc, part| {
                acc.push_str(&part);
                acc
            },
        ),
        char(quote),
    )(input)
}

fn single_quoted(input: &str) -> IResult<&str, String> {
    quoted(input, '\'', "\\'")
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    quoted(input, '"', "\\\"")
}

fn word(input: &str) -> IResult<&str, String> {
    map(take_while1(is_word_char), String::from)(input)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '+')
}
