//! Intermediate representation for method bodies.
//!
//! The IR is a small Java-like AST held in arenas on `Program`. All
//! cross-references are entity handles, so the CFG can point back at
//! the construct a node came from without owning it, and a rewrite
//! that replaces a subexpression is a plain write into the arena.

use crate::declare_entity;
use crate::entity::EntityVec;

mod display;
mod expr;
mod rewrite;
mod stmt;

pub use display::*;
pub use expr::*;
pub use stmt::*;

declare_entity!(Var, "var");
declare_entity!(Method, "method");
declare_entity!(Expr, "expr");
declare_entity!(Stmt, "stmt");

/// A source-level type, used only for printing declarations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Boolean,
    Void,
    Class(String),
    Array(Box<Type>),
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Boolean => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
            Type::Class(name) => write!(f, "{}", name),
            Type::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// A method-local variable.
    Local,
    /// A method parameter.
    Param,
    /// A static or instance field. Fields are never tracked by
    /// value-propagation analyses, since any call or aliased write
    /// may change them.
    Field,
}

#[derive(Clone, Debug)]
pub struct VarDef {
    pub name: String,
    pub ty: Type,
    pub kind: VarKind,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: String,
    pub ret: Type,
    pub params: Vec<Var>,
    /// Declared free of side effects. Consulted by the default
    /// side-effect oracle.
    pub pure: bool,
    /// Method body, if this method has one.
    pub body: Option<Stmt>,
}

/// A whole program: arenas for every IR entity, shared by all
/// method bodies.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub vars: EntityVec<Var, VarDef>,
    pub methods: EntityVec<Method, MethodDecl>,
    pub exprs: EntityVec<Expr, ExprDef>,
    pub stmts: EntityVec<Stmt, StmtDef>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    fn add_var(&mut self, name: &str, ty: Type, kind: VarKind) -> Var {
        let var = self.vars.push(VarDef {
            name: name.to_owned(),
            ty,
            kind,
        });
        log::trace!("add_var: {} ({:?}) -> {}", name, kind, var);
        var
    }

    pub fn local(&mut self, name: &str, ty: Type) -> Var {
        self.add_var(name, ty, VarKind::Local)
    }

    pub fn param(&mut self, name: &str, ty: Type) -> Var {
        self.add_var(name, ty, VarKind::Param)
    }

    pub fn field(&mut self, name: &str, ty: Type) -> Var {
        self.add_var(name, ty, VarKind::Field)
    }

    /// Declares a method without a body.
    pub fn method(&mut self, name: &str, ret: Type, pure: bool) -> Method {
        self.methods.push(MethodDecl {
            name: name.to_owned(),
            ret,
            params: vec![],
            pure,
            body: None,
        })
    }

    pub fn set_body(&mut self, method: Method, body: Stmt) {
        self.methods[method].body = Some(body);
    }

    pub fn add_expr(&mut self, def: ExprDef) -> Expr {
        self.exprs.push(def)
    }

    pub fn add_stmt(&mut self, def: StmtDef) -> Stmt {
        self.stmts.push(def)
    }

    pub fn var_name(&self, var: Var) -> &str {
        &self.vars[var].name[..]
    }

    /// Methods that have a body, in declaration order.
    pub fn bodies(&self) -> impl Iterator<Item = (Method, Stmt)> + '_ {
        self.methods
            .entries()
            .filter_map(|(method, decl)| decl.body.map(|body| (method, body)))
    }
}

/// Shorthands for building IR by hand.
impl Program {
    pub fn int(&mut self, value: i64) -> Expr {
        self.add_expr(ExprDef::Int(value))
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.add_expr(ExprDef::Bool(value))
    }

    pub fn var_ref(&mut self, var: Var) -> Expr {
        self.add_expr(ExprDef::VarRef(var))
    }

    pub fn field_ref(&mut self, instance: Expr, field: Var) -> Expr {
        self.add_expr(ExprDef::FieldRef(instance, field))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.add_expr(ExprDef::Binary(op, lhs, rhs))
    }

    pub fn assign(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.add_expr(ExprDef::Assign(lhs, rhs))
    }

    pub fn call(&mut self, method: Method, instance: Option<Expr>, args: Vec<Expr>) -> Expr {
        self.add_expr(ExprDef::Call(method, instance, args))
    }

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Stmt {
        self.add_stmt(StmtDef::Block(stmts))
    }

    pub fn decl(&mut self, var: Var, init: Option<Expr>) -> Stmt {
        self.add_stmt(StmtDef::Decl(var, init))
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.add_stmt(StmtDef::Expr(expr))
    }

    pub fn ret(&mut self, value: Option<Expr>) -> Stmt {
        self.add_stmt(StmtDef::Return(value))
    }

    pub fn if_stmt(&mut self, cond: Expr, then: Stmt, els: Option<Stmt>) -> Stmt {
        self.add_stmt(StmtDef::If(cond, then, els))
    }

    pub fn while_stmt(&mut self, cond: Expr, body: Stmt) -> Stmt {
        self.add_stmt(StmtDef::While(cond, body))
    }
}
