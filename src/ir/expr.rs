use super::{Expr, Method, Program, Type, Var};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncrementOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
        }
    }

    /// Java operator precedence; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::BitOr => 5,
            BinaryOp::BitAnd => 7,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 9,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExprDef {
    Int(i64),
    Bool(bool),
    Null,
    /// Read of a local, parameter or static field.
    VarRef(Var),
    /// `instance.field`
    FieldRef(Expr, Var),
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
    /// `lhs = rhs`; `lhs` is a `VarRef` or `FieldRef`.
    Assign(Expr, Expr),
    /// `lhs op= rhs`
    CompoundAssign(BinaryOp, Expr, Expr),
    /// `++lhs`, `lhs--`, ...
    Increment(IncrementOp, Expr),
    Call(Method, Option<Expr>, Vec<Expr>),
    /// `new C()`: allocation plus a constructor call.
    NewInstance(String),
    /// `new T[size]`
    NewArray(Type, Expr),
}

impl ExprDef {
    /// Visits direct operands in evaluation order.
    pub fn visit_operands<F: FnMut(Expr)>(&self, mut f: F) {
        match self {
            ExprDef::Int(_)
            | ExprDef::Bool(_)
            | ExprDef::Null
            | ExprDef::VarRef(_)
            | ExprDef::NewInstance(_) => {}
            &ExprDef::FieldRef(instance, _) => f(instance),
            &ExprDef::Unary(_, operand) => f(operand),
            &ExprDef::Binary(_, lhs, rhs)
            | &ExprDef::Assign(lhs, rhs)
            | &ExprDef::CompoundAssign(_, lhs, rhs) => {
                f(lhs);
                f(rhs);
            }
            &ExprDef::Increment(_, lhs) => f(lhs),
            ExprDef::Call(_, instance, args) => {
                if let Some(instance) = instance {
                    f(*instance);
                }
                for &arg in args {
                    f(arg);
                }
            }
            &ExprDef::NewArray(_, size) => f(size),
        }
    }

    pub fn update_operands<F: FnMut(&mut Expr)>(&mut self, mut f: F) {
        match self {
            ExprDef::Int(_)
            | ExprDef::Bool(_)
            | ExprDef::Null
            | ExprDef::VarRef(_)
            | ExprDef::NewInstance(_) => {}
            ExprDef::FieldRef(instance, _) => f(instance),
            ExprDef::Unary(_, operand) => f(operand),
            ExprDef::Binary(_, lhs, rhs)
            | ExprDef::Assign(lhs, rhs)
            | ExprDef::CompoundAssign(_, lhs, rhs) => {
                f(lhs);
                f(rhs);
            }
            ExprDef::Increment(_, lhs) => f(lhs),
            ExprDef::Call(_, instance, args) => {
                if let Some(instance) = instance {
                    f(instance);
                }
                for arg in args {
                    f(arg);
                }
            }
            ExprDef::NewArray(_, size) => f(size),
        }
    }

    pub fn is_allocation(&self) -> bool {
        matches!(self, ExprDef::NewInstance(_) | ExprDef::NewArray(..))
    }
}

impl Program {
    /// Pre-order walk over `expr` and all of its subexpressions.
    pub fn walk_expr<F: FnMut(Expr, &ExprDef)>(&self, expr: Expr, f: &mut F) {
        let def = &self.exprs[expr];
        f(expr, def);
        def.visit_operands(|operand| self.walk_expr(operand, f));
    }

    /// Does `expr` read or write `var` anywhere inside it?
    pub fn references_var(&self, expr: Expr, var: Var) -> bool {
        let mut found = false;
        self.walk_expr(expr, &mut |_, def| match def {
            &ExprDef::VarRef(v) | &ExprDef::FieldRef(_, v) if v == var => found = true,
            _ => {}
        });
        found
    }

    /// Does `expr` allocate anywhere inside it?
    pub fn contains_allocation(&self, expr: Expr) -> bool {
        let mut found = false;
        self.walk_expr(expr, &mut |_, def| found |= def.is_allocation());
        found
    }

    /// The variable written by an assignment target, if the target
    /// names one.
    pub fn lvalue_var(&self, lhs: Expr) -> Option<Var> {
        match self.exprs[lhs] {
            ExprDef::VarRef(var) | ExprDef::FieldRef(_, var) => Some(var),
            _ => None,
        }
    }
}
