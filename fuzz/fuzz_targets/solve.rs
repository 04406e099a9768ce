#![no_main]
use libfuzzer_sys::fuzz_target;

use dflow::cfg::CfgBuilder;
use dflow::fuzzing::ArbitraryProgram;
use dflow::oracle::MethodOracle;
use dflow::pass::{propagate, solve};
use dflow::passes::inline_var::{InlineVarAnalysis, InlineVarFlowFunction};

fuzz_target!(|input: ArbitraryProgram| {
    let _ = env_logger::try_init();
    let program = &input.program;
    let body = program.methods[input.method].body.unwrap();
    log::debug!("body:\n{}", program.display_stmt(body, ""));

    let graph = CfgBuilder::build(program, body).unwrap();
    graph.verify().unwrap();

    let analysis = InlineVarAnalysis::new(&MethodOracle);
    let mut map = solve(&graph, program, &analysis);
    for line in map.dump(&graph, program) {
        log::trace!("{}", line);
    }

    // A converged map is a fixpoint.
    let flow = InlineVarFlowFunction::new(&MethodOracle);
    assert_eq!(propagate(&graph, program, &flow, &mut map, graph.nodes()), 0);
});
