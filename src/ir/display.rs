//! Displaying IR as Java-like source.

use super::{Expr, ExprDef, IncrementOp, Method, Program, Stmt, StmtDef};

use std::fmt::{Display, Formatter, Result as FmtResult};

const PREC_ASSIGN: u8 = 1;
const PREC_UNARY: u8 = 13;
const PREC_POSTFIX: u8 = 14;
const PREC_PRIMARY: u8 = 15;

pub struct ExprDisplay<'a>(pub(crate) &'a Program, pub(crate) Expr);

impl<'a> ExprDisplay<'a> {
    fn precedence(&self, expr: Expr) -> u8 {
        match &self.0.exprs[expr] {
            ExprDef::Assign(..) | ExprDef::CompoundAssign(..) => PREC_ASSIGN,
            ExprDef::Binary(op, ..) => op.precedence(),
            ExprDef::Unary(..) => PREC_UNARY,
            ExprDef::Increment(IncrementOp::PreInc, _)
            | ExprDef::Increment(IncrementOp::PreDec, _) => PREC_UNARY,
            ExprDef::Increment(..) => PREC_POSTFIX,
            _ => PREC_PRIMARY,
        }
    }

    /// Writes `expr`, parenthesized if it binds looser than `min`.
    fn operand(&self, f: &mut Formatter, expr: Expr, min: u8) -> FmtResult {
        if self.precedence(expr) < min {
            write!(f, "(")?;
            self.write(f, expr)?;
            write!(f, ")")
        } else {
            self.write(f, expr)
        }
    }

    fn write(&self, f: &mut Formatter, expr: Expr) -> FmtResult {
        let program = self.0;
        match &program.exprs[expr] {
            ExprDef::Int(value) => write!(f, "{}", value),
            ExprDef::Bool(value) => write!(f, "{}", value),
            ExprDef::Null => write!(f, "null"),
            &ExprDef::VarRef(var) => write!(f, "{}", program.var_name(var)),
            &ExprDef::FieldRef(instance, field) => {
                self.operand(f, instance, PREC_POSTFIX)?;
                write!(f, ".{}", program.var_name(field))
            }
            &ExprDef::Unary(op, operand) => {
                write!(f, "{}", op.symbol())?;
                self.operand(f, operand, PREC_UNARY)
            }
            &ExprDef::Binary(op, lhs, rhs) => {
                let prec = op.precedence();
                self.operand(f, lhs, prec)?;
                write!(f, " {} ", op.symbol())?;
                self.operand(f, rhs, prec + 1)
            }
            &ExprDef::Assign(lhs, rhs) => {
                self.operand(f, lhs, PREC_ASSIGN + 1)?;
                write!(f, " = ")?;
                self.operand(f, rhs, PREC_ASSIGN)
            }
            &ExprDef::CompoundAssign(op, lhs, rhs) => {
                self.operand(f, lhs, PREC_ASSIGN + 1)?;
                write!(f, " {}= ", op.symbol())?;
                self.operand(f, rhs, PREC_ASSIGN)
            }
            &ExprDef::Increment(op, lhs) => match op {
                IncrementOp::PreInc => {
                    write!(f, "++")?;
                    self.operand(f, lhs, PREC_UNARY)
                }
                IncrementOp::PreDec => {
                    write!(f, "--")?;
                    self.operand(f, lhs, PREC_UNARY)
                }
                IncrementOp::PostInc => {
                    self.operand(f, lhs, PREC_POSTFIX)?;
                    write!(f, "++")
                }
                IncrementOp::PostDec => {
                    self.operand(f, lhs, PREC_POSTFIX)?;
                    write!(f, "--")
                }
            },
            ExprDef::Call(method, instance, args) => {
                if let Some(instance) = instance {
                    self.operand(f, *instance, PREC_POSTFIX)?;
                    write!(f, ".")?;
                }
                write!(f, "{}(", program.methods[*method].name)?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.operand(f, arg, PREC_ASSIGN)?;
                }
                write!(f, ")")
            }
            ExprDef::NewInstance(class) => write!(f, "new {}()", class),
            ExprDef::NewArray(ty, size) => {
                write!(f, "new {}[", ty)?;
                self.write(f, *size)?;
                write!(f, "]")
            }
        }
    }
}

impl<'a> Display for ExprDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        self.write(f, self.1)
    }
}

pub struct StmtDisplay<'a>(pub(crate) &'a Program, pub(crate) Stmt, pub(crate) &'a str);

impl<'a> StmtDisplay<'a> {
    fn write(&self, f: &mut Formatter, stmt: Stmt, indent: &str) -> FmtResult {
        let program = self.0;
        match &program.stmts[stmt] {
            StmtDef::Block(stmts) => {
                writeln!(f, "{}{{", indent)?;
                self.write_all(f, stmts, indent)?;
                writeln!(f, "{}}}", indent)
            }
            &StmtDef::Decl(var, init) => {
                let def = &program.vars[var];
                write!(f, "{}{} {}", indent, def.ty, def.name)?;
                if let Some(init) = init {
                    write!(f, " = {}", program.display_expr(init))?;
                }
                writeln!(f, ";")
            }
            &StmtDef::Expr(expr) => writeln!(f, "{}{};", indent, program.display_expr(expr)),
            &StmtDef::Return(value) => match value {
                Some(value) => writeln!(f, "{}return {};", indent, program.display_expr(value)),
                None => writeln!(f, "{}return;", indent),
            },
            &StmtDef::If(cond, then, els) => {
                writeln!(f, "{}if ({}) {{", indent, program.display_expr(cond))?;
                self.write_nested(f, then, indent)?;
                if let Some(els) = els {
                    writeln!(f, "{}}} else {{", indent)?;
                    self.write_nested(f, els, indent)?;
                }
                writeln!(f, "{}}}", indent)
            }
            &StmtDef::While(cond, body) => {
                writeln!(f, "{}while ({}) {{", indent, program.display_expr(cond))?;
                self.write_nested(f, body, indent)?;
                writeln!(f, "{}}}", indent)
            }
        }
    }

    fn write_all(&self, f: &mut Formatter, stmts: &[Stmt], indent: &str) -> FmtResult {
        let inner = format!("{}  ", indent);
        for &stmt in stmts {
            self.write(f, stmt, &inner)?;
        }
        Ok(())
    }

    /// Writes the body of a braced construct: a block's statements are
    /// spliced in directly, anything else is indented one level.
    fn write_nested(&self, f: &mut Formatter, stmt: Stmt, indent: &str) -> FmtResult {
        match &self.0.stmts[stmt] {
            StmtDef::Block(stmts) => self.write_all(f, stmts, indent),
            _ => self.write(f, stmt, &format!("{}  ", indent)),
        }
    }
}

impl<'a> Display for StmtDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        self.write(f, self.1, self.2)
    }
}

impl Program {
    pub fn display_expr(&self, expr: Expr) -> ExprDisplay<'_> {
        ExprDisplay(self, expr)
    }

    pub fn display_stmt<'a>(&'a self, stmt: Stmt, indent: &'a str) -> StmtDisplay<'a> {
        StmtDisplay(self, stmt, indent)
    }

    /// Source lines of a method body, without the body's own braces.
    pub fn body_lines(&self, method: Method) -> Vec<String> {
        let body = match self.methods[method].body {
            Some(body) => body,
            None => return vec![],
        };
        let text = match &self.stmts[body] {
            StmtDef::Block(stmts) => stmts
                .iter()
                .map(|&stmt| self.display_stmt(stmt, "").to_string())
                .collect::<String>(),
            _ => self.display_stmt(body, "").to_string(),
        };
        text.lines().map(|line| line.to_owned()).collect()
    }
}
