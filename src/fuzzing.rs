//! Fuzzing-specific utilities: a random program generator and a
//! reference evaluator for differential testing of rewrites.
//!
//! Public/exported only for access by fuzzers.

use crate::ir::*;
use fxhash::FxHashMap;
use libfuzzer_sys::arbitrary;

const MAX_DEPTH: u32 = 3;
const MAX_STMTS: u32 = 5;

/// A program with one method `run(p0, p1)` over `int` locals and
/// parameters, calling one pure and one side-effecting helper.
#[derive(Debug)]
pub struct ArbitraryProgram {
    pub program: Program,
    pub method: Method,
    pub params: Vec<Var>,
}

struct Gen<'u, 'a> {
    u: &'u mut arbitrary::Unstructured<'a>,
    program: Program,
    vars: Vec<Var>,
    pure: Method,
    effect: Method,
}

impl<'u, 'a> Gen<'u, 'a> {
    fn var(&mut self) -> arbitrary::Result<Var> {
        Ok(*self.u.choose(&self.vars)?)
    }

    fn expr(&mut self, depth: u32) -> arbitrary::Result<Expr> {
        let choice = if depth >= MAX_DEPTH {
            self.u.int_in_range(0..=1)?
        } else {
            self.u.int_in_range(0..=5)?
        };
        Ok(match choice {
            0 => {
                let value = self.u.int_in_range(-4..=4)?;
                self.program.int(value)
            }
            1 => {
                let var = self.var()?;
                self.program.var_ref(var)
            }
            2 | 3 => {
                let op = *self
                    .u
                    .choose(&[BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Lt])?;
                let lhs = self.expr(depth + 1)?;
                let rhs = self.expr(depth + 1)?;
                self.program.binary(op, lhs, rhs)
            }
            4 => {
                let arg = self.expr(depth + 1)?;
                self.program.call(self.pure, None, vec![arg])
            }
            _ => self.program.call(self.effect, None, vec![]),
        })
    }

    fn stmt(&mut self, depth: u32) -> arbitrary::Result<Stmt> {
        let choice = if depth >= MAX_DEPTH {
            self.u.int_in_range(0..=2)?
        } else {
            self.u.int_in_range(0..=4)?
        };
        Ok(match choice {
            0 => {
                let var = self.var()?;
                let value = self.expr(depth)?;
                self.program.decl(var, Some(value))
            }
            1 => {
                let var = self.var()?;
                let target = self.program.var_ref(var);
                let value = self.expr(depth)?;
                let assign = self.program.assign(target, value);
                self.program.expr_stmt(assign)
            }
            2 => {
                let var = self.var()?;
                let target = self.program.var_ref(var);
                let increment = self
                    .program
                    .add_expr(ExprDef::Increment(IncrementOp::PostInc, target));
                self.program.expr_stmt(increment)
            }
            3 => {
                let cond = self.expr(depth)?;
                let then = self.block(depth + 1)?;
                let els = if self.u.arbitrary()? {
                    Some(self.block(depth + 1)?)
                } else {
                    None
                };
                self.program.if_stmt(cond, then, els)
            }
            _ => {
                let cond = self.expr(depth)?;
                let body = self.block(depth + 1)?;
                self.program.while_stmt(cond, body)
            }
        })
    }

    fn block(&mut self, depth: u32) -> arbitrary::Result<Stmt> {
        let count = self.u.int_in_range(0..=MAX_STMTS)?;
        let mut stmts = vec![];
        for _ in 0..count {
            stmts.push(self.stmt(depth)?);
        }
        Ok(self.program.block(stmts))
    }
}

impl<'a> arbitrary::Arbitrary<'a> for ArbitraryProgram {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut program = Program::new();
        let params = vec![
            program.param("p0", Type::Int),
            program.param("p1", Type::Int),
        ];
        let mut vars = params.clone();
        for name in &["a", "b", "c"] {
            vars.push(program.local(name, Type::Int));
        }
        let pure = program.method("mix", Type::Int, true);
        let effect = program.method("tick", Type::Int, false);
        let method = program.method("run", Type::Int, false);
        program.methods[method].params = params.clone();

        let mut gen = Gen {
            u,
            program,
            vars,
            pure,
            effect,
        };
        let body = gen.block(0)?;
        let ret_var = gen.var()?;
        let value = gen.program.var_ref(ret_var);
        let ret = gen.program.ret(Some(value));
        if let StmtDef::Block(stmts) = &mut gen.program.stmts[body] {
            stmts.push(ret);
        }
        let mut program = gen.program;
        program.set_body(method, body);
        Ok(ArbitraryProgram {
            program,
            method,
            params,
        })
    }
}

/// Observable result of running a method: its return value and the
/// sequence of side-effecting calls it made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub value: Option<i64>,
    pub effects: Vec<i64>,
}

struct Eval<'a> {
    program: &'a Program,
    env: FxHashMap<Var, i64>,
    effects: Vec<i64>,
    fuel: u64,
}

enum Flow {
    Normal,
    Return(Option<i64>),
}

impl<'a> Eval<'a> {
    fn stmt(&mut self, stmt: Stmt) -> Option<Flow> {
        self.fuel = self.fuel.checked_sub(1)?;
        let program = self.program;
        match &program.stmts[stmt] {
            StmtDef::Block(stmts) => {
                for &child in stmts {
                    if let Flow::Return(value) = self.stmt(child)? {
                        return Some(Flow::Return(value));
                    }
                }
            }
            &StmtDef::Decl(var, init) => {
                if let Some(init) = init {
                    let value = self.expr(init)?;
                    self.env.insert(var, value);
                }
            }
            &StmtDef::Expr(expr) => {
                self.expr(expr)?;
            }
            &StmtDef::If(cond, then, els) => {
                if self.expr(cond)? != 0 {
                    return self.stmt(then);
                } else if let Some(els) = els {
                    return self.stmt(els);
                }
            }
            &StmtDef::While(cond, body) => {
                while self.expr(cond)? != 0 {
                    if let Flow::Return(value) = self.stmt(body)? {
                        return Some(Flow::Return(value));
                    }
                }
            }
            &StmtDef::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.expr(value)?),
                    None => None,
                };
                return Some(Flow::Return(value));
            }
        }
        Some(Flow::Normal)
    }

    fn read(&self, var: Var) -> i64 {
        self.env.get(&var).cloned().unwrap_or(0)
    }

    fn expr(&mut self, expr: Expr) -> Option<i64> {
        self.fuel = self.fuel.checked_sub(1)?;
        let program = self.program;
        Some(match &program.exprs[expr] {
            &ExprDef::Int(value) => value,
            &ExprDef::Bool(value) => value as i64,
            ExprDef::Null => 0,
            &ExprDef::VarRef(var) => self.read(var),
            &ExprDef::Unary(op, operand) => {
                let value = self.expr(operand)?;
                match op {
                    UnaryOp::Neg => value.wrapping_neg(),
                    UnaryOp::Not => (value == 0) as i64,
                }
            }
            &ExprDef::Binary(op, lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                binary(op, lhs, rhs)?
            }
            &ExprDef::Assign(lhs, rhs) => {
                let var = program.lvalue_var(lhs)?;
                let value = self.expr(rhs)?;
                self.env.insert(var, value);
                value
            }
            &ExprDef::CompoundAssign(op, lhs, rhs) => {
                let var = program.lvalue_var(lhs)?;
                let old = self.read(var);
                let rhs = self.expr(rhs)?;
                let value = binary(op, old, rhs)?;
                self.env.insert(var, value);
                value
            }
            &ExprDef::Increment(op, lhs) => {
                let var = program.lvalue_var(lhs)?;
                let old = self.read(var);
                let new = match op {
                    IncrementOp::PreInc | IncrementOp::PostInc => old.wrapping_add(1),
                    IncrementOp::PreDec | IncrementOp::PostDec => old.wrapping_sub(1),
                };
                self.env.insert(var, new);
                match op {
                    IncrementOp::PreInc | IncrementOp::PreDec => new,
                    IncrementOp::PostInc | IncrementOp::PostDec => old,
                }
            }
            ExprDef::Call(method, None, args) => {
                let mut values = vec![];
                for &arg in args {
                    values.push(self.expr(arg)?);
                }
                let sum = values.iter().fold(0i64, |acc, v| acc.wrapping_add(*v));
                if program.methods[*method].pure {
                    sum.wrapping_mul(31).wrapping_add(7)
                } else {
                    let ticket = self.effects.len() as i64;
                    self.effects.push(sum);
                    ticket
                }
            }
            ExprDef::FieldRef(..)
            | ExprDef::Call(_, Some(_), _)
            | ExprDef::NewInstance(_)
            | ExprDef::NewArray(..) => return None,
        })
    }
}

fn binary(op: BinaryOp, lhs: i64, rhs: i64) -> Option<i64> {
    Some(match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div => lhs.checked_div(rhs)?,
        BinaryOp::Rem => lhs.checked_rem(rhs)?,
        BinaryOp::Lt => (lhs < rhs) as i64,
        BinaryOp::Le => (lhs <= rhs) as i64,
        BinaryOp::Gt => (lhs > rhs) as i64,
        BinaryOp::Ge => (lhs >= rhs) as i64,
        BinaryOp::Eq => (lhs == rhs) as i64,
        BinaryOp::Ne => (lhs != rhs) as i64,
        BinaryOp::BitAnd => lhs & rhs,
        BinaryOp::BitOr => lhs | rhs,
    })
}

/// Runs `method` with `args` bound to its parameters. Returns `None`
/// if evaluation runs out of `fuel`, divides by zero or meets a
/// construct the evaluator does not model.
pub fn evaluate(program: &Program, method: Method, args: &[i64], fuel: u64) -> Option<Outcome> {
    let decl = &program.methods[method];
    let body = decl.body?;
    let mut eval = Eval {
        program,
        env: FxHashMap::default(),
        effects: vec![],
        fuel,
    };
    for (&param, &arg) in decl.params.iter().zip(args.iter()) {
        eval.env.insert(param, arg);
    }
    let value = match eval.stmt(body)? {
        Flow::Return(value) => value,
        Flow::Normal => None,
    };
    Some(Outcome {
        value,
        effects: eval.effects,
    })
}
