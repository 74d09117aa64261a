use std::{path::PathBuf, process::ExitCode};

use ariadne::{ColorGenerator, Config, IndexType, Label, Report, ReportKind, Source};
use clap::Parser as ClapParser;
use log::{LevelFilter, error, warn};
use tpcore::{
    TpResult,
    bmc::Verdict,
    config::{BmcConfig, TrigEncoding},
    pipeline::{Pipeline, spawn_solver},
};
use tpinstr::{
    parser::parse_program,
    utils::{Error as InstrError, ParserError},
};

const EXIT_SAFE: u8 = 0;
const EXIT_COUNTEREXAMPLE: u8 = 1;
const EXIT_UNKNOWN: u8 = 2;
const EXIT_ERROR: u8 = 3;

/// Check the assertions of a turtle IR listing for every input.
#[derive(ClapParser)]
#[command(version, about)]
pub struct Arguments {
    /// Path to the IR listing
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// `angle,cos,sin` CSV file; selects the angle-table trig encoding
    #[arg(long = "angle-conf")]
    angle_conf: Option<PathBuf>,

    /// Solver command, overriding the configuration
    #[arg(long)]
    solver: Option<String>,

    /// Solver timeout in milliseconds (0 disables it)
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the three-address code
    #[arg(long)]
    print_tac: bool,

    /// Print the SSA-form control flow graph
    #[arg(long)]
    print_ssa: bool,

    /// Print the SMT-LIB script before solving
    #[arg(long)]
    print_smt: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Arguments {
    fn bmc_config(&self) -> TpResult<BmcConfig> {
        let mut config = match &self.config {
            Some(path) => BmcConfig::load(path)?,
            None => BmcConfig::default(),
        };
        if let Some(table) = &self.angle_conf {
            config.trig.encoding = TrigEncoding::AngleTable;
            config.trig.table = Some(table.clone());
        }
        if let Some(solver) = &self.solver {
            config.solver.command = solver.clone();
        }
        match self.timeout {
            Some(0) => config.solver.timeout_ms = None,
            Some(ms) => config.solver.timeout_ms = Some(ms),
            None => {}
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn report_parser_errors(errors: &[ParserError], fallback: &str, source: &str) {
    let mut colors = ColorGenerator::new();
    let color = colors.next();
    for error in errors {
        let file = error.file.clone().unwrap_or_else(|| fallback.to_string());
        let span = (file.clone(), error.start..error.end);
        let printed = Report::build(ReportKind::Error, span.clone())
            .with_config(Config::default().with_index_type(IndexType::Byte))
            .with_message(&error.message)
            .with_label(
                Label::new(span)
                    .with_message("The error occurred here")
                    .with_color(color),
            )
            .finish()
            .eprint((file, Source::from(source)));
        if let Err(err) = printed {
            eprintln!("{}: {}", fallback, error.message);
            eprintln!("(could not render the report: {})", err);
        }
    }
}

fn run(args: &Arguments) -> TpResult<u8> {
    let display = args.input.display().to_string();
    let source = std::fs::read_to_string(&args.input)?;
    let ast = match parse_program(&source, Some(&display)) {
        Ok(ast) => ast,
        Err(InstrError::ParserErrors { errors }) => {
            eprintln!("Failed to parse listing from {}:", display);
            report_parser_errors(&errors, &display, &source);
            return Ok(EXIT_ERROR);
        }
        Err(err) => return Err(err.into()),
    };

    let config = args.bmc_config()?;
    let pipeline = Pipeline::new(config)?;
    let lowered = pipeline.lower(&ast)?;

    if lowered.tac.assert_count == 0 {
        warn!("{} has no assertion; it is trivially safe", display);
    }
    if args.print_tac {
        println!("; three-address code\n{}", lowered.tac.tac);
    }
    if args.print_ssa {
        println!("; SSA form\n{}", lowered.ssa);
    }

    let mut solver = spawn_solver(&pipeline.config().solver)?;
    let query = pipeline.encode(&lowered, &mut *solver)?;
    if args.print_smt {
        println!("{}", query.to_smtlib());
    }

    let artifacts = pipeline.check(lowered, query, &mut *solver)?;
    println!("{}", artifacts.verdict);
    Ok(match &artifacts.verdict {
        Verdict::Safe => EXIT_SAFE,
        Verdict::Counterexample { .. } => {
            if let Some(replay) = &artifacts.replay {
                for line in &replay.failed_asserts {
                    println!("assertion at TAC line {} fails", line);
                }
            }
            EXIT_COUNTEREXAMPLE
        }
        Verdict::Unknown { .. } => EXIT_UNKNOWN,
    })
}

fn main() -> ExitCode {
    let args = Arguments::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{}", err);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_the_defaults() {
        let args = Arguments::try_parse_from([
            "tpcheck",
            "prog.tl",
            "--angle-conf",
            "angles.csv",
            "--solver",
            "cvc5",
            "--timeout",
            "0",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);

        let config = args.bmc_config().unwrap();
        assert_eq!(config.trig.encoding, TrigEncoding::AngleTable);
        assert_eq!(config.trig.table, Some(PathBuf::from("angles.csv")));
        assert_eq!(config.solver.command, "cvc5");
        assert_eq!(config.solver.timeout_ms, None);
    }

    #[test]
    fn defaults_apply_without_flags() {
        let args = Arguments::try_parse_from(["tpcheck", "prog.tl"]).unwrap();
        assert_eq!(args.bmc_config().unwrap(), BmcConfig::default());
    }
}
