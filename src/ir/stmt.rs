use super::{Expr, Stmt, Var};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StmtDef {
    Block(Vec<Stmt>),
    /// `T var = init;`
    Decl(Var, Option<Expr>),
    Expr(Expr),
    If(Expr, Stmt, Option<Stmt>),
    While(Expr, Stmt),
    Return(Option<Expr>),
}

impl StmtDef {
    /// Visits the expressions directly owned by this statement.
    pub fn visit_exprs<F: FnMut(Expr)>(&self, mut f: F) {
        match self {
            StmtDef::Block(_) => {}
            StmtDef::Decl(_, init) => {
                if let Some(init) = init {
                    f(*init);
                }
            }
            &StmtDef::Expr(expr) => f(expr),
            &StmtDef::If(cond, ..) | &StmtDef::While(cond, _) => f(cond),
            StmtDef::Return(value) => {
                if let Some(value) = value {
                    f(*value);
                }
            }
        }
    }

    pub fn update_exprs<F: FnMut(&mut Expr)>(&mut self, mut f: F) {
        match self {
            StmtDef::Block(_) => {}
            StmtDef::Decl(_, init) => {
                if let Some(init) = init {
                    f(init);
                }
            }
            StmtDef::Expr(expr) => f(expr),
            StmtDef::If(cond, ..) | StmtDef::While(cond, _) => f(cond),
            StmtDef::Return(value) => {
                if let Some(value) = value {
                    f(value);
                }
            }
        }
    }

    /// Visits nested statements.
    pub fn visit_children<F: FnMut(Stmt)>(&self, mut f: F) {
        match self {
            StmtDef::Block(stmts) => {
                for &stmt in stmts {
                    f(stmt);
                }
            }
            &StmtDef::If(_, then, els) => {
                f(then);
                if let Some(els) = els {
                    f(els);
                }
            }
            &StmtDef::While(_, body) => f(body),
            StmtDef::Decl(..) | StmtDef::Expr(_) | StmtDef::Return(_) => {}
        }
    }
}
