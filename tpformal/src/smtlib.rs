use std::collections::BTreeMap;

use bigdecimal::BigDecimal;

use crate::{sort::Sort, term::Term};

fn is_simple_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c)
}

/// Render a symbol, quoting it with `|...|` when it is not a simple symbol.
///
/// Program variables all start with `:`, which SMT-LIB reserves for keywords,
/// so in practice every variable ends up quoted.
pub fn quote_symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(is_simple_symbol_char);
    if simple {
        name.to_string()
    } else {
        format!("|{}|", name)
    }
}

/// Inverse of [`quote_symbol`].
pub fn unquote_symbol(symbol: &str) -> &str {
    symbol
        .strip_prefix('|')
        .and_then(|s| s.strip_suffix('|'))
        .unwrap_or(symbol)
}

fn int_to_smtlib(value: i64) -> String {
    if value < 0 {
        format!("(- {})", value.unsigned_abs())
    } else {
        value.to_string()
    }
}

/// Decimal literal in plain positional notation, e.g. `0.0175` or `(- 3.0)`.
pub fn real_to_smtlib(value: &BigDecimal) -> String {
    let (digits, scale) = value.as_bigint_and_exponent();
    let digits = digits.to_string();
    let (negative, digits) = match digits.strip_prefix('-') {
        Some(abs) => (true, abs.to_string()),
        None => (false, digits),
    };

    let plain = if scale <= 0 {
        format!("{}{}.0", digits, "0".repeat(scale.unsigned_abs() as usize))
    } else {
        let scale = scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        format!("{}.{}", int_part, frac_part)
    };

    if negative {
        format!("(- {})", plain)
    } else {
        plain
    }
}

fn nary(op: &str, terms: &[Term], empty: &str) -> String {
    match terms {
        [] => empty.to_string(),
        [single] => to_smtlib(single),
        _ => {
            let args: Vec<String> = terms.iter().map(to_smtlib).collect();
            format!("({} {})", op, args.join(" "))
        }
    }
}

fn binary(op: &str, lhs: &Term, rhs: &Term) -> String {
    format!("({} {} {})", op, to_smtlib(lhs), to_smtlib(rhs))
}

pub fn to_smtlib(term: &Term) -> String {
    match term {
        Term::Bool(b) => b.to_string(),
        Term::Int(v) => int_to_smtlib(*v),
        Term::Real(v) => real_to_smtlib(v),
        Term::Var { name, .. } => quote_symbol(name),
        Term::Not(t) => format!("(not {})", to_smtlib(t)),
        Term::And(ts) => nary("and", ts, "true"),
        Term::Or(ts) => nary("or", ts, "false"),
        Term::Implies(l, r) => binary("=>", l, r),
        Term::Eq(l, r) => binary("=", l, r),
        Term::Ite(c, t, e) => format!("(ite {} {} {})", to_smtlib(c), to_smtlib(t), to_smtlib(e)),
        Term::Neg(t) => format!("(- {})", to_smtlib(t)),
        Term::Add(l, r) => binary("+", l, r),
        Term::Sub(l, r) => binary("-", l, r),
        Term::Mul(l, r) => binary("*", l, r),
        Term::Div(l, r) => binary("/", l, r),
        Term::IntDiv(l, r) => binary("div", l, r),
        Term::Mod(l, r) => binary("mod", l, r),
        Term::Lt(l, r) => binary("<", l, r),
        Term::Le(l, r) => binary("<=", l, r),
        Term::Gt(l, r) => binary(">", l, r),
        Term::Ge(l, r) => binary(">=", l, r),
        Term::ToReal(t) => format!("(to_real {})", to_smtlib(t)),
    }
}

pub fn declare_const(name: &str, sort: Sort) -> String {
    format!("(declare-const {} {})", quote_symbol(name), sort)
}

pub fn assert(term: &Term) -> String {
    format!("(assert {})", to_smtlib(term))
}

pub fn get_value(names: &[&str]) -> String {
    let symbols: Vec<String> = names.iter().map(|n| quote_symbol(n)).collect();
    format!("(get-value ({}))", symbols.join(" "))
}

/// A complete, self-contained script: declarations, assertions and a
/// `(check-sat)` command.
pub fn script(declarations: &BTreeMap<String, Sort>, assertions: &[Term]) -> String {
    let mut out = String::new();
    out.push_str("(set-option :produce-models true)\n");
    for (name, sort) in declarations {
        out.push_str(&declare_const(name, *sort));
        out.push('\n');
    }
    for term in assertions {
        out.push_str(&assert(term));
        out.push('\n');
    }
    out.push_str("(check-sat)\n");
    out
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn symbols_are_quoted_when_needed() {
        assert_eq!(quote_symbol("x"), "x");
        assert_eq!(quote_symbol(":x#0"), "|:x#0|");
        assert_eq!(quote_symbol(":__turtle_x#3"), "|:__turtle_x#3|");
        assert_eq!(quote_symbol("0abc"), "|0abc|");
        assert_eq!(unquote_symbol("|:x#0|"), ":x#0");
        assert_eq!(unquote_symbol("plain"), "plain");
    }

    #[test]
    fn literals_follow_smtlib_syntax() {
        assert_eq!(to_smtlib(&Term::int(-5)), "(- 5)");
        assert_eq!(to_smtlib(&Term::int(i64::MIN)), "(- 9223372036854775808)");
        let r = |s: &str| real_to_smtlib(&BigDecimal::from_str(s).unwrap());
        assert_eq!(r("3"), "3.0");
        assert_eq!(r("0.0175"), "0.0175");
        assert_eq!(r("-2.5"), "(- 2.5)");
        assert_eq!(r("1E+3"), "1000.0");
        assert_eq!(r("0.001"), "0.001");
    }

    #[test]
    fn guarded_definition_renders() {
        let g = Term::var(":__branch_0#0", Sort::Bool);
        let x = Term::var(":x#1", Sort::Int);
        let t = g.implies(x.eq(Term::var(":x#0", Sort::Int).add(Term::int(1))));
        assert_eq!(to_smtlib(&t), "(=> |:__branch_0#0| (= |:x#1| (+ |:x#0| 1)))");
        assert_eq!(to_smtlib(&Term::and(vec![])), "true");
    }

    #[test]
    fn script_declares_everything() {
        let x = Term::var(":x#0", Sort::Int);
        let query = x.clone().gt(Term::int(0)).not();
        let script = script(&query.free_symbols(), &[query]);
        assert!(script.contains("(declare-const |:x#0| Int)"));
        assert!(script.contains("(assert (not (> |:x#0| 0)))"));
        assert!(script.trim_end().ends_with("(check-sat)"));
    }
}
