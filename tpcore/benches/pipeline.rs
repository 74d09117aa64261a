use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use tpcore::{
    bmc::{self, PathConditions},
    config::BmcConfig,
    pipeline::Pipeline,
    ssa::convert_to_ssa,
    tac::generate_tac,
};
use tpformal::simplify::canonicalize;
use tpinstr::{ast::AstProgram, cfg::Cfg, parser::parse_program};

/// A long loop-free program: a ladder of diamonds over a few variables, with
/// turtle motion sprinkled in.
fn ladder(rungs: usize) -> AstProgram {
    let mut rng = ChaCha20Rng::seed_from_u64(0x42);
    let mut lines = vec![":a = :in0".to_string(), ":b = :in1".to_string()];
    for _ in 0..rungs {
        let k = rng.random_range(-5..=5);
        lines.push(format!("cond (:a + {} > :b) [3]", k));
        lines.push(format!(":a = :a - {}", rng.random_range(1..=3)));
        lines.push("cond false [3]".to_string());
        lines.push(format!(":b = :b + :a * {}", rng.random_range(1..=3)));
        lines.push(format!("forward {}", rng.random_range(1..=20)));
        if rng.random_bool(0.3) {
            lines.push("assert (:a != :b) or pendown?".to_string());
        }
    }
    parse_program(&lines.join("\n"), None).expect("generated program parses")
}

fn bench_stages(c: &mut Criterion) {
    let ast = ladder(200);
    let config = BmcConfig::default();

    c.bench_function("tac_generation_200_rungs", |b| {
        b.iter(|| generate_tac(black_box(&ast)).unwrap())
    });

    let tac = generate_tac(&ast).unwrap().tac;
    c.bench_function("ssa_conversion_200_rungs", |b| {
        b.iter(|| {
            let mut cfg = Cfg::build(black_box(tac.clone())).unwrap();
            convert_to_ssa(&mut cfg).unwrap()
        })
    });

    let pipeline = Pipeline::new(config.clone()).unwrap();
    let ssa = pipeline.lower(&ast).unwrap().ssa;
    c.bench_function("path_conditions_200_rungs", |b| {
        b.iter(|| PathConditions::compute(black_box(&ssa), |t| Ok(canonicalize(t))).unwrap())
    });

    c.bench_function("smtlib_rendering_200_rungs", |b| {
        let query = {
            let mut solver = NoSolver;
            bmc::encode(&ssa, &config, &mut solver).unwrap()
        };
        b.iter(|| black_box(&query).to_smtlib())
    });
}

/// Only the default simplifier is exercised while encoding.
struct NoSolver;

impl tpformal::solver::Solver for NoSolver {
    fn name(&self) -> &str {
        "none"
    }
    fn declare(&mut self, _: &str, _: tpformal::sort::Sort) -> Result<(), tpformal::Error> {
        Ok(())
    }
    fn assert(&mut self, _: &tpformal::term::Term) -> Result<(), tpformal::Error> {
        Ok(())
    }
    fn check_sat(&mut self) -> Result<tpformal::solver::SatResult, tpformal::Error> {
        Ok(tpformal::solver::SatResult::Unknown("not a solver".into()))
    }
    fn model(
        &mut self,
        _: &[(&str, tpformal::sort::Sort)],
    ) -> Result<tpformal::solver::Model, tpformal::Error> {
        Ok(Default::default())
    }
    fn reset(&mut self) -> Result<(), tpformal::Error> {
        Ok(())
    }
}

criterion_group!(benches, bench_stages);
criterion_main!(benches);
