//! MSL, the motion scripting language.
//!
//! Script text goes through [`compile`] and comes out as a flat sequence of
//! [`Command`]s. Two surface syntaxes are accepted and may be mixed freely:
//!
//! ```text
//! // MSL call form
//! FUNC(PICK){ Z(100); G(1); }
//! LOOP(3){ X(10, d250); CALL(PICK); }
//! GROUPSYNC(X(500), Y(200), s1200)
//!
//! # legacy word form
//! X100 Y20 F1500
//! SPEED X1500 Y1200
//! ```

mod command;
mod compiler;
mod lexer;
mod parser;
mod render;

pub use command::{Action, Command, DeviceVerb, GroupCommand, MoveCommand};
pub use compiler::{compile, CompiledScript, Compiler, CompilerOptions, Function, FunctionTable};
pub use render::render;
