//! RcDoc-based pretty-printer with termcolor annotations for [`Term`].
//!
//! Terms are printed in infix notation with the minimum number of
//! parentheses, e.g. `:g#0 => :x#1 = :x#0 + 1`. Parentheses are colored by
//! nesting depth so matching pairs share a color.
use std::io::{self, Write};

use pretty::{FmtWrite, RcDoc, RenderAnnotated};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::{
    smtlib::real_to_smtlib,
    term::{Term, TermKind},
};

/// Styles used to annotate parts of the pretty-printed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Paren(u8),
    Keyword,
    Operator,
    Ident,
    Literal,
}

impl Style {
    fn to_color_spec(self) -> ColorSpec {
        let mut s = ColorSpec::new();
        match self {
            Style::Paren(depth) => {
                let fg = match depth % 6 {
                    0 => Color::Blue,
                    1 => Color::Green,
                    2 => Color::White,
                    3 => Color::Yellow,
                    4 => Color::Red,
                    _ => Color::Magenta,
                };
                s.set_fg(Some(fg)).set_dimmed(true);
            }
            Style::Keyword => {
                s.set_fg(Some(Color::Cyan)).set_bold(true);
            }
            Style::Operator => {
                s.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Style::Ident => {
                s.set_fg(Some(Color::Green)).set_bold(true);
            }
            Style::Literal => {
                s.set_fg(Some(Color::Magenta));
            }
        }
        s
    }
}

fn styled(style: Style, s: &'static str) -> RcDoc<'static, Style> {
    RcDoc::as_string(s).annotate(style)
}

fn lparen(depth: u8) -> RcDoc<'static, Style> {
    RcDoc::as_string("(").annotate(Style::Paren(depth))
}

fn rparen(depth: u8) -> RcDoc<'static, Style> {
    RcDoc::as_string(")").annotate(Style::Paren(depth))
}

fn kw(s: &'static str) -> RcDoc<'static, Style> {
    styled(Style::Keyword, s)
}

fn op(s: &'static str) -> RcDoc<'static, Style> {
    styled(Style::Operator, s)
}

fn precedence(kind: TermKind) -> u8 {
    use TermKind::*;

    match kind {
        Ite => 1,
        Implies => 2,
        Or => 3,
        And => 4,
        Not => 5,
        Eq | Lt | Le | Gt | Ge => 6,
        Add | Sub => 7,
        Mul | Div | IntDiv | Mod => 8,
        Neg => 9,
        ToReal => 10,
        Bool | Int | Real | Var => 255,
    }
}

fn requires_parens(current: TermKind, parent: TermKind) -> bool {
    let (cur, par) = (precedence(current), precedence(parent));
    // Non-associative operators always parenthesize a nested operand of the
    // same precedence.
    par > cur || (par == cur && (current != parent || matches!(current, TermKind::Implies | TermKind::Sub | TermKind::Div | TermKind::IntDiv | TermKind::Mod | TermKind::Eq | TermKind::Lt | TermKind::Le | TermKind::Gt | TermKind::Ge)))
}

fn child_doc(term: &Term, parent: TermKind, depth: u8) -> RcDoc<'static, Style> {
    if requires_parens(TermKind::from(term), parent) {
        lparen(depth)
            .append(to_doc_with_depth(term, depth + 1))
            .append(rparen(depth))
            .group()
    } else {
        to_doc_with_depth(term, depth)
    }
}

fn infix(
    lhs: &Term,
    symbol: &'static str,
    rhs: &Term,
    kind: TermKind,
    depth: u8,
) -> RcDoc<'static, Style> {
    child_doc(lhs, kind, depth)
        .append(RcDoc::space())
        .append(op(symbol))
        .append(RcDoc::line())
        .append(child_doc(rhs, kind, depth))
        .group()
}

fn nary(
    terms: &[Term],
    symbol: &'static str,
    empty: &'static str,
    kind: TermKind,
    depth: u8,
) -> RcDoc<'static, Style> {
    if terms.is_empty() {
        return kw(empty);
    }
    RcDoc::intersperse(
        terms.iter().map(|t| child_doc(t, kind, depth)),
        RcDoc::space().append(op(symbol)).append(RcDoc::line()),
    )
    .group()
}

fn to_doc_with_depth(term: &Term, depth: u8) -> RcDoc<'static, Style> {
    let kind = TermKind::from(term);
    match term {
        Term::Bool(true) => kw("true"),
        Term::Bool(false) => kw("false"),
        Term::Int(v) => RcDoc::as_string(v.to_string()).annotate(Style::Literal),
        Term::Real(v) => RcDoc::as_string(real_to_smtlib(v)).annotate(Style::Literal),
        Term::Var { name, .. } => RcDoc::as_string(name.clone()).annotate(Style::Ident),
        Term::Not(t) => op("not ").append(child_doc(t, kind, depth)).group(),
        Term::Neg(t) => op("-").append(child_doc(t, kind, depth)).group(),
        Term::ToReal(t) => kw("to_real")
            .append(lparen(depth))
            .append(to_doc_with_depth(t, depth + 1))
            .append(rparen(depth))
            .group(),
        Term::And(ts) => nary(ts, "and", "true", kind, depth),
        Term::Or(ts) => nary(ts, "or", "false", kind, depth),
        Term::Implies(l, r) => infix(l, "=>", r, kind, depth),
        Term::Eq(l, r) => infix(l, "=", r, kind, depth),
        Term::Lt(l, r) => infix(l, "<", r, kind, depth),
        Term::Le(l, r) => infix(l, "<=", r, kind, depth),
        Term::Gt(l, r) => infix(l, ">", r, kind, depth),
        Term::Ge(l, r) => infix(l, ">=", r, kind, depth),
        Term::Add(l, r) => infix(l, "+", r, kind, depth),
        Term::Sub(l, r) => infix(l, "-", r, kind, depth),
        Term::Mul(l, r) => infix(l, "*", r, kind, depth),
        Term::Div(l, r) => infix(l, "/", r, kind, depth),
        Term::IntDiv(l, r) => infix(l, "div", r, kind, depth),
        Term::Mod(l, r) => infix(l, "mod", r, kind, depth),
        Term::Ite(c, t, e) => kw("if")
            .append(RcDoc::space())
            .append(child_doc(c, kind, depth))
            .append(RcDoc::line())
            .append(kw("then"))
            .append(RcDoc::space())
            .append(child_doc(t, kind, depth))
            .append(RcDoc::line())
            .append(kw("else"))
            .append(RcDoc::space())
            .append(child_doc(e, kind, depth))
            .group()
            .nest(2),
    }
}

struct ColorWriter<'w, W: WriteColor + Write> {
    out: &'w mut W,
}

impl<'a, 'w, W: WriteColor + Write> RenderAnnotated<'a, Style> for ColorWriter<'w, W> {
    fn push_annotation(&mut self, ann: &'a Style) -> io::Result<()> {
        self.out.set_color(&ann.to_color_spec())
    }
    fn pop_annotation(&mut self) -> io::Result<()> {
        self.out.reset()
    }
}

impl<'w, W: WriteColor + Write> pretty::Render for ColorWriter<'w, W> {
    type Error = io::Error;
    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.out.write_all(s.as_bytes())?;
        Ok(s.len())
    }
    fn write_str_all(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }
    fn fail_doc(&self) -> Self::Error {
        io::Error::other("render failed")
    }
}

/// Width of the terminal, or 80 if it cannot be determined.
pub fn terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

pub trait PrettyTerm {
    fn pretty_doc(&self) -> RcDoc<'static, Style>;

    /// Render with colors to any termcolor writer at the given width.
    fn pretty_render_to<W: WriteColor + Write>(&self, width: usize, out: &mut W) -> io::Result<()>;

    /// Print to stdout with colors (TTY-aware) at the terminal width.
    fn pretty_print(&self) -> io::Result<()>;

    fn pretty_string(&self) -> String;
}

impl PrettyTerm for Term {
    fn pretty_doc(&self) -> RcDoc<'static, Style> {
        to_doc_with_depth(self, 0)
    }

    fn pretty_render_to<W: WriteColor + Write>(&self, width: usize, out: &mut W) -> io::Result<()> {
        let mut cw = ColorWriter { out };
        self.pretty_doc().render_raw(width, &mut cw)
    }

    fn pretty_print(&self) -> io::Result<()> {
        let stdout = StandardStream::stdout(ColorChoice::Auto);
        let mut stdout = stdout.lock();
        self.pretty_render_to(terminal_width(), &mut stdout)?;
        writeln!(stdout)
    }

    fn pretty_string(&self) -> String {
        let mut buf = String::new();
        let _ = self.pretty_doc().render_fmt(80, &mut buf);
        buf
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut w = FmtWrite::new(f);
        self.pretty_doc().render_raw(80, &mut w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Sort;

    #[test]
    fn minimal_parentheses() {
        let x = Term::var(":x", Sort::Int);
        let y = Term::var(":y", Sort::Int);
        let t = x.clone().add(y.clone()).mul(Term::int(2)).eq(x.clone().sub(y.clone().sub(Term::int(1))));
        assert_eq!(t.pretty_string(), "(:x + :y) * 2 = :x - (:y - 1)");

        let g = Term::var(":g", Sort::Bool);
        let guarded = g.clone().implies(Term::and(vec![g.clone().not(), x.gt(Term::int(-3))]));
        assert_eq!(guarded.to_string(), ":g => not :g and :x > -3");
    }

    #[test]
    fn colored_output_contains_the_text() {
        let t = Term::ite(
            Term::var(":c", Sort::Bool),
            Term::int(1),
            Term::int(2).neg(),
        );
        let mut buf = termcolor::Buffer::ansi();
        t.pretty_render_to(80, &mut buf).unwrap();
        let text = String::from_utf8(buf.into_inner()).unwrap();
        assert!(text.contains(":c"));
        assert!(text.contains("then"));
        assert_eq!(t.pretty_string(), "if :c then 1 else -2");
    }
}
