//! Program intermediate form and loader for the weft model checker
//!
//! This crate defines the executable form that `weft-check` explores: a
//! fixed set of straight-line threads over shared integer variables and
//! mutexes ([`ast`]), the `.weft` textual format ([`syntax`]), and
//! source-form rendering ([`pretty`]).

pub mod ast;
pub mod pretty;
pub mod syntax;

pub use ast::{
    BinOp, Expr, LockId, Op, Program, Reg, ThreadDef, ThreadId, UnOp, ValidateError, VarId,
};
pub use syntax::{parse, ParseError};

use std::path::Path;
use thiserror::Error;

/// Error from loading a program: parse, validation, or I/O.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Invalid(#[from] ValidateError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parse and validate a program from source text.
pub fn load_str(input: &str) -> Result<Program, LoadError> {
    let program = parse(input)?;
    program.validate()?;
    Ok(program)
}

/// Parse and validate a program from a file.
pub fn load_path(path: impl AsRef<Path>) -> Result<Program, LoadError> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&input)
}
