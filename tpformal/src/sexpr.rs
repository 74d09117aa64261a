//! Reader for the s-expressions solvers print back: `get-value` replies,
//! `(error "...")` messages and `get-info` answers.
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chumsky::prelude::*;

use crate::{error::Error, smtlib::unquote_symbol, solver::Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Atom(String),
    Str(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{}", a),
            SExpr::Str(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn sexpr_parser<'src>() -> impl Parser<'src, &'src str, Vec<SExpr>, extra::Err<Rich<'src, char>>> {
    let comment = just(';')
        .then(any().and_is(just('\n').not()).repeated())
        .padded();

    let sexpr = recursive(|sexpr| {
        let quoted = just('|')
            .then(none_of('|').repeated())
            .then(just('|'))
            .to_slice()
            .map(|s: &str| SExpr::Atom(s.to_string()));

        // SMT-LIB escapes a double quote inside a string by doubling it.
        let string = none_of('"')
            .to_slice()
            .or(just("\"\"").to("\""))
            .repeated()
            .collect::<Vec<&str>>()
            .delimited_by(just('"'), just('"'))
            .map(|parts| SExpr::Str(parts.concat()));

        let atom = none_of("()|\"; \t\r\n")
            .repeated()
            .at_least(1)
            .to_slice()
            .map(|s: &str| SExpr::Atom(s.to_string()));

        let list = sexpr
            .padded_by(comment.clone().repeated())
            .padded()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just('('), just(')'))
            .map(SExpr::List);

        choice((list, quoted, string, atom)).padded()
    });

    sexpr
        .padded_by(comment.repeated())
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Parse every s-expression in `source`.
pub fn parse_sexprs(source: &str) -> Result<Vec<SExpr>, Error> {
    sexpr_parser()
        .parse(source)
        .into_result()
        .map_err(|errs| Error::MalformedReply {
            reply: source.to_string(),
            message: errs
                .into_iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })
}

/// Interpret a solver value: `true`, `5`, `(- 5)`, `2.5`, `(/ 1.0 2.0)`,
/// `(- (/ 1 3))`. Anything else, such as algebraic numbers, is kept opaque.
pub fn value_from_sexpr(expr: &SExpr) -> Value {
    numeric_value(expr).unwrap_or_else(|| match expr.as_atom() {
        Some("true") => Value::Bool(true),
        Some("false") => Value::Bool(false),
        _ => Value::Opaque(expr.to_string()),
    })
}

fn numeric_value(expr: &SExpr) -> Option<Value> {
    match expr {
        SExpr::Atom(a) if a.contains('.') => BigDecimal::from_str(a).ok().map(Value::Real),
        SExpr::Atom(a) => a.parse::<i64>().ok().map(Value::Int),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(op), inner] if op == "-" => match numeric_value(inner)? {
                Value::Int(v) => Some(Value::Int(v.checked_neg()?)),
                Value::Real(v) => Some(Value::Real(-v)),
                _ => None,
            },
            [SExpr::Atom(op), num, den] if op == "/" => {
                let num = numeric_value(num)?.as_decimal()?;
                let den = numeric_value(den)?.as_decimal()?;
                if den == BigDecimal::from(0) {
                    return None;
                }
                Some(Value::Real(num / den))
            }
            _ => None,
        },
        SExpr::Str(_) => None,
    }
}

/// Read a `get-value` reply `((x 1) (y (- 2)))` into `(name, value)` pairs.
pub fn parse_value_reply(reply: &str) -> Result<Vec<(String, Value)>, Error> {
    let malformed = |message: &str| Error::MalformedReply {
        reply: reply.to_string(),
        message: message.to_string(),
    };

    let exprs = parse_sexprs(reply)?;
    let [SExpr::List(pairs)] = exprs.as_slice() else {
        return Err(malformed("expected a single list of pairs"));
    };
    pairs
        .iter()
        .map(|pair| match pair.as_list() {
            Some([SExpr::Atom(name), value]) => {
                Ok((unquote_symbol(name).to_string(), value_from_sexpr(value)))
            }
            _ => Err(malformed("expected a (symbol value) pair")),
        })
        .collect()
}

/// Message of an `(error "...")` reply, if `reply` is one.
pub fn error_message(reply: &str) -> Option<String> {
    let exprs = parse_sexprs(reply).ok()?;
    match exprs.first()?.as_list()? {
        [SExpr::Atom(head), SExpr::Str(message)] if head == "error" => Some(message.clone()),
        _ => None,
    }
}

/// Whether the parentheses of `text` are balanced, ignoring quoted symbols,
/// strings and comments. Used to know when a multi-line reply is complete.
pub fn is_balanced(text: &str) -> bool {
    let mut depth = 0i64;
    let mut in_symbol = false;
    let mut in_string = false;
    let mut in_comment = false;
    for c in text.chars() {
        match c {
            '\n' if in_comment => in_comment = false,
            _ if in_comment => {}
            '|' if !in_string => in_symbol = !in_symbol,
            '"' if !in_symbol => in_string = !in_string,
            _ if in_symbol || in_string => {}
            ';' => in_comment = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0 && !in_symbol && !in_string
}
