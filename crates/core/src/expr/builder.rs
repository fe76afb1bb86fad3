use log::trace;
use tabula_primitives::TableId;
use tabula_types::Datum;

use crate::db::Db;
use crate::error::{ExprError, Result};
use crate::expr::node::{build_node, reference_target, result_type, Node};
use crate::expr::{Expression, Operator};

/// Builds expressions by post-order pushes.
///
/// Operands are pushed first, then the operator pops them and pushes the
/// combined node. Type errors are detected at `push_operator` or
/// `release`, never later. `begin_subexpression` opens a scope against
/// the table referenced by the node on top of the stack; columns pushed
/// inside resolve against that table, and `end_subexpression` collapses
/// the scope into a dereference node.
pub struct ExpressionBuilder<'db> {
    db: &'db Db,
    table: TableId,
    stack: Vec<Node>,
    subexpression: Option<Box<ExpressionBuilder<'db>>>,
}

impl<'db> ExpressionBuilder<'db> {
    pub fn new(db: &'db Db, table: TableId) -> Result<Self> {
        db.table(table)?;
        Ok(ExpressionBuilder {
            db,
            table,
            stack: Vec::new(),
            subexpression: None,
        })
    }

    /// The table of the innermost open scope.
    pub fn table(&self) -> TableId {
        match &self.subexpression {
            Some(inner) => inner.table(),
            None => self.table,
        }
    }

    /// Pushes a typed constant. The typeless `Datum::Na` is rejected;
    /// push a typed N/A (e.g. `Int::na()`) instead.
    pub fn push_constant(&mut self, value: Datum) -> Result<()> {
        if let Some(inner) = &mut self.subexpression {
            return inner.push_constant(value);
        }
        if value.data_type().is_none() {
            return Err(ExprError::NaConstant.into());
        }
        self.stack.push(Node::Constant(value));
        Ok(())
    }

    /// Pushes the `_id` pseudo column (the record's row id, Int).
    pub fn push_row_id(&mut self) -> Result<()> {
        if let Some(inner) = &mut self.subexpression {
            return inner.push_row_id();
        }
        self.stack.push(Node::RowId);
        Ok(())
    }

    /// Pushes the `_score` pseudo column (the record's score, Float).
    pub fn push_score(&mut self) -> Result<()> {
        if let Some(inner) = &mut self.subexpression {
            return inner.push_score();
        }
        self.stack.push(Node::Score);
        Ok(())
    }

    /// Pushes a column of the current scope's table by name. The names
    /// `_id` and `_score` resolve to the pseudo columns.
    pub fn push_column(&mut self, name: &str) -> Result<()> {
        if let Some(inner) = &mut self.subexpression {
            return inner.push_column(name);
        }
        match name {
            "_id" => self.push_row_id(),
            "_score" => self.push_score(),
            _ => {
                let column = self.db.table(self.table)?.column(name)?;
                self.stack.push(Node::Column {
                    table: self.table,
                    column: column.id(),
                    data_type: column.data_type(),
                });
                Ok(())
            }
        }
    }

    /// Pops the operator's operands off the stack, type-checks, and
    /// pushes the combined node.
    pub fn push_operator(&mut self, op: Operator) -> Result<()> {
        if let Some(inner) = &mut self.subexpression {
            return inner.push_operator(op);
        }
        let required = if op.is_unary() { 1 } else { 2 };
        if self.stack.len() < required {
            return Err(ExprError::MissingOperands {
                required,
                found: self.stack.len(),
            }
            .into());
        }
        let types: Vec<_> = self.stack[self.stack.len() - required..]
            .iter()
            .map(Node::data_type)
            .collect();
        let data_type = result_type(op, &types)?;
        let operands = self.stack.split_off(self.stack.len() - required);
        self.stack.push(build_node(op, data_type, operands));
        Ok(())
    }

    /// Opens a scope over the table referenced by the top-of-stack node.
    pub fn begin_subexpression(&mut self) -> Result<()> {
        if let Some(inner) = &mut self.subexpression {
            return inner.begin_subexpression();
        }
        let Some(top) = self.stack.last() else {
            return Err(ExprError::MissingOperands {
                required: 1,
                found: 0,
            }
            .into());
        };
        let Some(target) = reference_target(top, self.db) else {
            return Err(ExprError::NotAReference.into());
        };
        self.subexpression = Some(Box::new(ExpressionBuilder::new(self.db, target)?));
        Ok(())
    }

    /// Collapses the innermost scope into a dereference node on the
    /// enclosing stack.
    pub fn end_subexpression(&mut self) -> Result<()> {
        match &mut self.subexpression {
            None => Err(ExprError::NoSubexpression.into()),
            Some(inner) if inner.subexpression.is_some() => inner.end_subexpression(),
            Some(inner) => {
                if inner.stack.len() != 1 {
                    return Err(ExprError::UnbalancedStack(inner.stack.len()).into());
                }
                let expr = inner.stack.pop().expect("length checked");
                let table = inner.table;
                self.subexpression = None;
                let ref_node = self.stack.pop().expect("checked at begin_subexpression");
                let data_type = expr.data_type();
                self.stack.push(Node::Dereference {
                    ref_node: Box::new(ref_node),
                    table,
                    expr: Box::new(expr),
                    data_type,
                });
                Ok(())
            }
        }
    }

    /// Drops everything, including open scopes.
    pub fn clear(&mut self) {
        self.subexpression = None;
        self.stack.clear();
    }

    /// Completes the expression. The stack must hold exactly one node
    /// and no scope may be open.
    pub fn release(&mut self) -> Result<Expression> {
        if self.subexpression.is_some() {
            return Err(ExprError::OpenSubexpression.into());
        }
        if self.stack.len() != 1 {
            return Err(ExprError::UnbalancedStack(self.stack.len()).into());
        }
        let root = self.stack.pop().expect("length checked");
        trace!("released expression of type {}", root.data_type());
        Ok(Expression::new(self.table, root))
    }
}
