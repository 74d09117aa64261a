use std::{
    io::{BufRead, BufReader, Write},
    path::Path,
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use log::{debug, trace, warn};

use crate::{
    error::Error,
    sexpr::{self, SExpr},
    smtlib,
    solver::{Model, SatResult, Solver},
    sort::Sort,
    term::Term,
};

/// A solver process speaking SMT-LIB 2 on its standard streams.
///
/// The session runs with `:print-success` enabled so every command gets an
/// answer and errors are reported against the command that caused them.
pub struct SmtLibProcess {
    command: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SmtLibProcess {
    /// Spawn `command` with `args`. When `timeout_ms` is set, the matching
    /// per-query limit flag is appended for z3 and cvc5.
    pub fn spawn(command: &str, args: &[String], timeout_ms: Option<u64>) -> Result<Self, Error> {
        let mut args = args.to_vec();
        if let Some(ms) = timeout_ms {
            let program = Path::new(command)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(command);
            match program {
                "z3" => args.push(format!("-t:{}", ms)),
                "cvc5" => args.push(format!("--tlimit-per={}", ms)),
                other => warn!("No timeout flag known for solver `{}`, running without one", other),
            }
        }

        debug!("Spawning solver: {} {}", command, args.join(" "));
        let mut child = Command::new(command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::SolverNotFound {
                command: command.to_string(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(Error::Protocol {
                command: command.to_string(),
                response: "solver standard streams unavailable".to_string(),
            });
        };

        let mut solver = SmtLibProcess {
            command: command.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };
        solver.command("(set-option :print-success true)")?;
        solver.command("(set-option :produce-models true)")?;
        Ok(solver)
    }

    /// `z3 -in -smt2`.
    pub fn z3(timeout_ms: Option<u64>) -> Result<Self, Error> {
        Self::spawn("z3", &["-in".to_string(), "-smt2".to_string()], timeout_ms)
    }

    fn send(&mut self, line: &str) -> Result<(), Error> {
        trace!("smt> {}", line);
        writeln!(self.stdin, "{}", line)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Read one complete reply, which may span several lines.
    fn read_reply(&mut self, sent: &str) -> Result<String, Error> {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(Error::Protocol {
                    command: sent.to_string(),
                    response: format!("solver `{}` exited", self.command),
                });
            }
            if reply.is_empty() && line.trim().is_empty() {
                continue;
            }
            reply.push_str(&line);
            if sexpr::is_balanced(&reply) {
                let reply = reply.trim().to_string();
                trace!("smt< {}", reply);
                return Ok(reply);
            }
        }
    }

    fn query(&mut self, line: &str) -> Result<String, Error> {
        self.send(line)?;
        let reply = self.read_reply(line)?;
        match sexpr::error_message(&reply) {
            Some(message) => Err(Error::Solver(message)),
            None => Ok(reply),
        }
    }

    /// Send a command whose only valid answer is `success`.
    fn command(&mut self, line: &str) -> Result<(), Error> {
        let reply = self.query(line)?;
        if reply == "success" {
            Ok(())
        } else {
            Err(Error::Protocol {
                command: line.to_string(),
                response: reply,
            })
        }
    }

    fn reason_unknown(&mut self) -> String {
        let reply = match self.query("(get-info :reason-unknown)") {
            Ok(reply) => reply,
            Err(e) => return e.to_string(),
        };
        let parsed = sexpr::parse_sexprs(&reply).ok();
        let reason = parsed.as_ref().and_then(|exprs| match exprs.first()?.as_list()? {
            [_, SExpr::Str(s)] => Some(s.clone()),
            [_, SExpr::Atom(a)] => Some(a.clone()),
            _ => None,
        });
        reason.unwrap_or(reply)
    }
}

impl Solver for SmtLibProcess {
    fn name(&self) -> &str {
        &self.command
    }

    fn declare(&mut self, name: &str, sort: Sort) -> Result<(), Error> {
        self.command(&smtlib::declare_const(name, sort))
    }

    fn assert(&mut self, term: &Term) -> Result<(), Error> {
        self.command(&smtlib::assert(term))
    }

    fn check_sat(&mut self) -> Result<SatResult, Error> {
        let reply = self.query("(check-sat)")?;
        match reply.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" | "timeout" => Ok(SatResult::Unknown(self.reason_unknown())),
            _ => Err(Error::Protocol {
                command: "(check-sat)".to_string(),
                response: reply,
            }),
        }
    }

    fn model(&mut self, symbols: &[(&str, Sort)]) -> Result<Model, Error> {
        if symbols.is_empty() {
            return Ok(Model::default());
        }
        let names: Vec<&str> = symbols.iter().map(|(n, _)| *n).collect();
        let reply = self.query(&smtlib::get_value(&names))?;
        Ok(sexpr::parse_value_reply(&reply)?.into_iter().collect())
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.command("(reset-assertions)")
    }
}

impl Drop for SmtLibProcess {
    fn drop(&mut self) {
        let _ = self.send("(exit)");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z3_available() -> bool {
        Command::new("z3")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    #[test]
    fn missing_binary_is_reported() {
        let err = SmtLibProcess::spawn("definitely-not-a-solver-binary", &[], None)
            .err()
            .unwrap();
        assert!(matches!(err, Error::SolverNotFound { .. }));
    }

    #[test]
    fn z3_session_round_trip() {
        if !z3_available() {
            eprintln!("z3 not found on PATH, skipping");
            return;
        }
        let mut solver = SmtLibProcess::z3(Some(5_000)).unwrap();
        let x = Term::var(":x#0", Sort::Int);
        let r = Term::var(":r#0", Sort::Real);
        let result = solver
            .check_terms(&[
                x.clone().lt(Term::int(-4)),
                x.clone().gt(Term::int(-6)),
                r.clone().mul(Term::int(2).to_real()).eq(Term::int(1).to_real()),
            ])
            .unwrap();
        assert_eq!(result, SatResult::Sat);
        let model = solver.model(&[(":x#0", Sort::Int), (":r#0", Sort::Real)]).unwrap();
        assert_eq!(model.get_int(":x#0"), Some(-5));
        assert_eq!(
            model.get_real(":r#0"),
            Some(<bigdecimal::BigDecimal as std::str::FromStr>::from_str("0.5").unwrap())
        );

        solver.reset().unwrap();
        solver.declare(":b", Sort::Bool).unwrap();
        let b = Term::var(":b", Sort::Bool);
        solver.assert(&Term::and(vec![b.clone(), b.not()])).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn solver_errors_surface() {
        if !z3_available() {
            eprintln!("z3 not found on PATH, skipping");
            return;
        }
        let mut solver = SmtLibProcess::z3(None).unwrap();
        let err = solver.assert(&Term::var(":nope", Sort::Bool)).unwrap_err();
        assert!(matches!(err, Error::Solver(_)));
    }
}
