//! Compilation errors.
//!
//! Every variant is a configuration error: the statement or the dialect
//! choice is wrong, and retrying will not help.

use thiserror::Error;

use crate::compiler::CompileKind;
use crate::statement::Operator;

/// Errors raised while compiling a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The dialect has no syntax for this kind of statement.
    #[error("{kind} is not supported by the {dialect} dialect")]
    Unsupported {
        kind: CompileKind,
        dialect: &'static str,
    },

    /// No table was given.
    #[error("cannot compile {0} without a table")]
    MissingTable(CompileKind),

    /// A write was compiled without data.
    #[error("{0} requires a non-empty data payload")]
    MissingPayload(CompileKind),

    /// An upsert was compiled without update assignments.
    #[error("upsert requires at least one update assignment")]
    MissingUpsert,

    /// `ON CONFLICT` needs to know which columns conflict.
    #[error("the {0} dialect requires a conflict target for upserts")]
    MissingConflictTarget(&'static str),

    /// An operator was paired with an operand shape it cannot take.
    #[error("operator {operator} {reason}")]
    InvalidOperand {
        operator: Operator,
        reason: &'static str,
    },

    /// A record column holds something that is not a value.
    #[error("column {0} must be assigned a value or raw expression")]
    InvalidValue(String),
}
