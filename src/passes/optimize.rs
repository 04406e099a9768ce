//! Whole-program driver: runs the inline-variable rewrite over every
//! method body.

use crate::cfg::CfgBuilder;
use crate::ir::Program;
use crate::oracle::SideEffectOracle;
use crate::pass::{solve_integrated, SolverOptions};
use crate::passes::inline_var::InlineVarAnalysis;
use anyhow::{Context, Result};

/// Inlines known variable values into every method with a body.
/// Returns whether any method changed. The first failing method
/// aborts the run; methods already processed keep their rewrites.
pub fn optimize(
    program: &mut Program,
    oracle: &dyn SideEffectOracle,
    options: &mut SolverOptions,
) -> Result<bool> {
    let analysis = InlineVarAnalysis::new(oracle);
    let methods = program.bodies().map(|(method, _)| method).collect::<Vec<_>>();
    let mut changed = false;
    for method in methods {
        let name = program.methods[method].name.clone();
        let mut graph = CfgBuilder::build_method(program, method)
            .with_context(|| format!("building CFG of {}", name))?;
        if log::log_enabled!(log::Level::Trace) {
            for line in graph.dump(program, |_| None) {
                log::trace!("{}: {}", name, line);
            }
        }
        let method_changed = solve_integrated(&mut graph, program, &analysis, options)
            .with_context(|| format!("inlining variables in {}", name))?;
        log::debug!("optimize: {} changed = {}", name, method_changed);
        changed |= method_changed;
    }
    Ok(changed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::AnalysisError;
    use crate::ir::{BinaryOp, Type};
    use crate::oracle::MethodOracle;

    #[test]
    fn optimizes_every_body() {
        let _ = env_logger::try_init();
        let mut program = Program::new();
        let a = program.param("a", Type::Int);
        let i = program.local("i", Type::Int);
        let k = program.local("k", Type::Int);

        let first = program.method("first", Type::Int, false);
        let read = program.var_ref(a);
        let two = program.int(2);
        let value = program.binary(BinaryOp::Mul, read, two);
        let decl = program.decl(i, Some(value));
        let use_i = program.var_ref(i);
        let ret = program.ret(Some(use_i));
        let body = program.block(vec![decl, ret]);
        program.set_body(first, body);

        program.method("external", Type::Void, false);

        let second = program.method("second", Type::Int, false);
        let seven = program.int(7);
        let decl = program.decl(k, Some(seven));
        let use_k = program.var_ref(k);
        let ret = program.ret(Some(use_k));
        let body = program.block(vec![decl, ret]);
        program.set_body(second, body);

        let changed = optimize(&mut program, &MethodOracle, &mut SolverOptions::default()).unwrap();
        assert!(changed);
        assert_eq!(program.body_lines(first), vec!["int i = a * 2;", "return a * 2;"]);
        assert_eq!(program.body_lines(second), vec!["int k = 7;", "return 7;"]);
        assert!(!optimize(&mut program, &MethodOracle, &mut SolverOptions::default()).unwrap());
    }

    #[test]
    fn errors_name_the_method() {
        let mut program = Program::new();
        let m = program.method("broken", Type::Void, false);
        let one = program.int(1);
        let two = program.int(2);
        let assign = program.assign(one, two);
        let stmt = program.expr_stmt(assign);
        let body = program.block(vec![stmt]);
        program.set_body(m, body);

        let err = optimize(&mut program, &MethodOracle, &mut SolverOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("broken"));
        assert!(matches!(
            err.root_cause().downcast_ref::<AnalysisError>(),
            Some(AnalysisError::Unsupported(_))
        ));
    }
}
