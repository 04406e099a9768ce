#![no_main]
use libfuzzer_sys::fuzz_target;

use dflow::fuzzing::{evaluate, ArbitraryProgram};
use dflow::oracle::MethodOracle;
use dflow::pass::SolverOptions;

const FUEL: u64 = 10000;

fuzz_target!(|input: ArbitraryProgram| {
    let _ = env_logger::try_init();
    let mut program = input.program;
    let method = input.method;
    let body = program.methods[method].body.unwrap();
    log::debug!("original:\n{}", program.display_stmt(body, ""));

    let args = [3, -5];
    let expected = match evaluate(&program, method, &args, FUEL) {
        Some(outcome) => outcome,
        None => {
            // Silently reject.
            log::trace!("Rejecting: original does not finish");
            return;
        }
    };

    let mut options = SolverOptions {
        verify: true,
        ..SolverOptions::default()
    };
    dflow::passes::optimize(&mut program, &MethodOracle, &mut options).unwrap();
    log::debug!("optimized:\n{}", program.display_stmt(body, ""));

    // Inlined copies may cost extra evaluation steps.
    let actual = evaluate(&program, method, &args, FUEL * 16);
    assert_eq!(Some(expected), actual);
});
