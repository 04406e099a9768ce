//! Deep clone and deep substitution over the IR arenas.

use super::{Expr, Program, Stmt};

impl Program {
    /// Deep-clones `expr` into fresh arena slots and returns the new
    /// root. No slot of the clone is shared with the original, so the
    /// clone may be placed anywhere in the tree.
    pub fn clone_expr(&mut self, expr: Expr) -> Expr {
        let mut def = self.exprs[expr].clone();
        def.update_operands(|operand| *operand = self.clone_expr(*operand));
        let cloned = self.add_expr(def);
        log::trace!("clone_expr: {} -> {}", expr, cloned);
        cloned
    }

    /// Deep-visits `root` and every statement and expression beneath
    /// it, pointing each slot that refers to `target` at
    /// `replacement` instead. Returns the number of slots rewritten.
    pub fn replace_expr(&mut self, root: Stmt, target: Expr, replacement: Expr) -> usize {
        let mut count = 0;
        let mut def = self.stmts[root].clone();
        def.update_exprs(|slot| {
            if *slot == target {
                *slot = replacement;
                count += 1;
            } else {
                count += self.replace_in_expr(*slot, target, replacement);
            }
        });
        self.stmts[root] = def;

        let mut children = vec![];
        self.stmts[root].visit_children(|child| children.push(child));
        for child in children {
            count += self.replace_expr(child, target, replacement);
        }
        count
    }

    fn replace_in_expr(&mut self, expr: Expr, target: Expr, replacement: Expr) -> usize {
        let mut count = 0;
        let mut def = self.exprs[expr].clone();
        def.update_operands(|slot| {
            if *slot == target {
                *slot = replacement;
                count += 1;
            } else {
                count += self.replace_in_expr(*slot, target, replacement);
            }
        });
        self.exprs[expr] = def;
        count
    }
}
