//! Front end for a procedural CSG scene description language.
//!
//! Source text goes in, an owned [`Program`] comes out, or a positioned
//! [`ParseError`]. Evaluation and rendering belong to the consumer.

pub mod config;
pub mod errors;
pub mod lexer;
pub mod parser;

pub use errors::{ErrorKind, ParseError, Position};
pub use parser::ast::{
    BinaryOperator, ColorName, CommandName, CsgOperator, Expr, ObjectKind, Program, Statement,
    TransformKind,
};
pub use parser::{parse, Parser};
