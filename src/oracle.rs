//! Side-effect and trackability queries consumed by analyses.

use crate::ir::{Expr, ExprDef, Program, Var, VarKind};

/// Answers purity questions about IR. Implementations must be
/// deterministic for a fixed program and safe to share between
/// threads analyzing different methods.
pub trait SideEffectOracle: Sync {
    /// May evaluating `expr` (including all its subexpressions) have
    /// an observable side effect?
    fn may_have_side_effects(&self, program: &Program, expr: Expr) -> bool;

    /// May this single call expression have an observable side
    /// effect, ignoring its operands?
    fn call_has_side_effects(&self, program: &Program, call: Expr) -> bool;

    /// Can an analysis track the value of `var`? Locals and
    /// parameters can; fields cannot.
    fn is_trackable(&self, program: &Program, var: Var) -> bool {
        matches!(program.vars[var].kind, VarKind::Local | VarKind::Param)
    }
}

/// The default oracle: a call is side-effect free iff its target is
/// declared `pure`; constructors and every form of assignment have
/// side effects.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodOracle;

impl SideEffectOracle for MethodOracle {
    fn may_have_side_effects(&self, program: &Program, expr: Expr) -> bool {
        let mut effects = false;
        program.walk_expr(expr, &mut |sub, def| {
            effects |= match def {
                ExprDef::Assign(..) | ExprDef::CompoundAssign(..) | ExprDef::Increment(..) => true,
                ExprDef::Call(..) | ExprDef::NewInstance(_) => {
                    self.call_has_side_effects(program, sub)
                }
                _ => false,
            };
        });
        effects
    }

    fn call_has_side_effects(&self, program: &Program, call: Expr) -> bool {
        match &program.exprs[call] {
            &ExprDef::Call(method, ..) => !program.methods[method].pure,
            ExprDef::NewInstance(_) => true,
            _ => false,
        }
    }
}
