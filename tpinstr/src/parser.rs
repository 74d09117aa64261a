//! Text front-end for source listings.
//!
//! One statement per line, optionally prefixed by a `[Ln]` line label and
//! suffixed by a `[k]` relative jump. Blank lines and lines starting with `//`
//! are ignored. This is the format produced by the `Display` implementation of
//! [`Program`](crate::program::Program), so printed listings parse back.
//!
//! ```text
//! [L0] :y = :x * 2
//! [L1] cond (:x > 0) [3]
//! [L2] forward :x
//! [L3] cond false [2]
//! [L4] left 90
//! [L5] assert pendown?
//! ```
use chumsky::prelude::*;
use either::Either;

use crate::{
    ast::{AstProgram, Direction, PenStatus, Stmt},
    expr::{ArithOp, BoolOp, Expr},
    program::FALL_THROUGH,
    utils::{Error, ParserError},
};

pub fn variable_parser<'src>()
-> impl Parser<'src, &'src str, String, extra::Err<Rich<'src, char>>> + Clone {
    just(':')
        .ignore_then(text::ident())
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("variable")
}

pub fn integer_parser<'src>()
-> impl Parser<'src, &'src str, i64, extra::Err<Rich<'src, char>>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|digits: &str, span| {
            digits
                .parse::<i64>()
                .map_err(|_| Rich::custom(span, format!("integer literal out of range: {}", digits)))
        })
        .labelled("integer")
}

pub fn expr_parser<'src>()
-> impl Parser<'src, &'src str, Expr, extra::Err<Rich<'src, char>>> + Clone {
    recursive(|expr| {
        let atom = choice((
            integer_parser().map(Expr::num),
            just("true").to(Expr::bool(true)),
            just("false").to(Expr::bool(false)),
            just("pendown?").to(Expr::pen_down()),
            variable_parser().map(Expr::var),
            expr.clone()
                .padded()
                .delimited_by(just('('), just(')')),
        ))
        .padded()
        .labelled("atom");

        #[derive(Clone, Copy)]
        enum Prefix {
            Neg,
            Not,
        }
        // `-3` is a literal, `-(3)` and `- 3` are negations.
        let neg = just('-')
            .then_ignore(any().filter(|c: &char| c.is_ascii_digit()).not())
            .to(Prefix::Neg);
        let unary = choice((neg, just("not").to(Prefix::Not)))
            .padded()
            .repeated()
            .foldr(atom, |op, rhs| match op {
                Prefix::Neg => Expr::neg(rhs),
                Prefix::Not => Expr::not(rhs),
            })
            .labelled("unary expression");

        let product = unary.clone().foldl(
            choice((
                just('*').to(ArithOp::Mul),
                just('/').to(ArithOp::Div),
                just('%').to(ArithOp::Mod),
            ))
            .padded()
            .then(unary)
            .repeated(),
            |lhs, (op, rhs)| Expr::arith(op, lhs, rhs),
        );

        let sum = product.clone().foldl(
            choice((just('+').to(ArithOp::Add), just('-').to(ArithOp::Sub)))
                .padded()
                .then(product)
                .repeated(),
            |lhs, (op, rhs)| Expr::arith(op, lhs, rhs),
        );

        let comparison = sum.clone().foldl(
            choice((
                just("<=").to(BoolOp::Le),
                just(">=").to(BoolOp::Ge),
                just("==").to(BoolOp::Eq),
                just("!=").to(BoolOp::Ne),
                just('<').to(BoolOp::Lt),
                just('>').to(BoolOp::Gt),
            ))
            .padded()
            .then(sum)
            .repeated(),
            |lhs, (op, rhs)| Expr::logic(op, lhs, rhs),
        );

        let conjunction = comparison.clone().foldl(
            just("and")
                .padded()
                .to(BoolOp::And)
                .then(comparison)
                .repeated(),
            |lhs, (op, rhs)| Expr::logic(op, lhs, rhs),
        );

        conjunction
            .clone()
            .foldl(
                just("or")
                    .padded()
                    .to(BoolOp::Or)
                    .then(conjunction)
                    .repeated(),
                |lhs, (op, rhs)| Expr::logic(op, lhs, rhs),
            )
            .labelled("expression")
    })
}

pub fn stmt_parser<'src>()
-> impl Parser<'src, &'src str, Stmt, extra::Err<Rich<'src, char>>> + Clone {
    let phi = just("phi")
        .ignore_then(
            variable_parser()
                .padded()
                .separated_by(just(','))
                .collect::<Vec<_>>()
                .delimited_by(just('('), just(')')),
        )
        .labelled("phi operands");

    let assignment = variable_parser()
        .then_ignore(just('=').padded())
        .then(choice((
            phi.map(Either::<Vec<String>, Expr>::Left),
            expr_parser().map(Either::<Vec<String>, Expr>::Right),
        )))
        .map(|(lvar, rhs)| match rhs {
            Either::Left(operands) => Stmt::PhiAssignment { lvar, operands },
            Either::Right(expr) => Stmt::Assignment { lvar, expr },
        })
        .labelled("assignment");

    let direction = text::ident()
        .try_map(|word: &str, span| {
            word.parse::<Direction>()
                .map_err(|e| Rich::custom(span, e.to_string()))
        })
        .labelled("move direction");

    choice((
        just("cond")
            .padded()
            .ignore_then(expr_parser())
            .map(Stmt::Condition),
        just("assert")
            .padded()
            .ignore_then(expr_parser())
            .map(Stmt::Assert),
        just("penup").to(Stmt::Pen(PenStatus::Up)),
        just("pendown").to(Stmt::Pen(PenStatus::Down)),
        just("goto")
            .padded()
            .ignore_then(expr_parser())
            .then_ignore(just(',').padded())
            .then(expr_parser())
            .map(|(x, y)| Stmt::Goto { x, y }),
        just("nop").to(Stmt::NoOp),
        just("pause").to(Stmt::Pause),
        assignment,
        direction
            .padded()
            .then(expr_parser())
            .map(|(direction, expr)| Stmt::Move { direction, expr }),
    ))
    .labelled("statement")
}

fn line_parser<'src>()
-> impl Parser<'src, &'src str, (Stmt, i64), extra::Err<Rich<'src, char>>> {
    let label = just("[L")
        .ignore_then(text::int(10))
        .then_ignore(just(']'))
        .padded()
        .labelled("line label");

    let jump = integer_parser()
        .padded()
        .delimited_by(just('['), just(']'))
        .padded()
        .labelled("relative jump");

    label
        .or_not()
        .ignore_then(stmt_parser())
        .then(jump.or_not())
        .padded()
        .then_ignore(end())
        .map(|(stmt, jump)| (stmt, jump.unwrap_or(FALL_THROUGH)))
}

/// Parse a whole listing. `file` is only used to annotate diagnostics.
pub fn parse_program(source: &str, file: Option<&str>) -> Result<AstProgram, Error> {
    let mut program = AstProgram::new();
    let mut errors = Vec::new();
    let mut offset = 0;

    for raw in source.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        let start = offset;
        offset += raw.len();

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        let (output, errs) = line_parser().parse(line).into_output_errors();
        errors.extend(errs.into_iter().map(|e| ParserError {
            file: file.map(str::to_string),
            start: start + e.span().start,
            end: start + e.span().end,
            message: e.to_string(),
        }));
        if let Some((stmt, jump)) = output {
            program.push_jump(stmt, jump);
        }
    }

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(Error::ParserErrors { errors })
    }
}

/// Parse a single expression.
pub fn parse_expr(source: &str) -> Result<Expr, Error> {
    let (output, errs) = expr_parser()
        .padded()
        .then_ignore(end())
        .parse(source)
        .into_output_errors();
    match output {
        Some(expr) if errs.is_empty() => Ok(expr),
        _ => Err(Error::ParserErrors {
            errors: errs
                .into_iter()
                .map(|e| ParserError {
                    file: None,
                    start: e.span().start,
                    end: e.span().end,
                    message: e.to_string(),
                })
                .collect(),
        }),
    }
}
