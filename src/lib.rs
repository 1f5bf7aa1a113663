//! An argparse-style command line parser.
//!
//! Declare the arguments a program accepts (positional and optional), then
//! run the parser over the raw tokens to produce a flat attribute bag (the
//! [`Namespace`]) keyed by each argument's destination. Usage and help text
//! are derived from the same declarations.
//!
//! ### Example
//! ```
//! use clarg::{Arg, ArgType, ArgumentParser, Nargs, Value};
//!
//! let mut parser = ArgumentParser::new("concat")
//!     .description("Concatenate the inputs into the output.");
//! parser
//!     .add_argument(["-r", "--repeat"], Arg::store().type_(ArgType::Int).default(Value::Int(1)))
//!     .unwrap();
//! parser
//!     .add_argument(["input"], Arg::store().nargs(Nargs::AtLeastOne))
//!     .unwrap();
//! parser.add_argument(["output"], Arg::store()).unwrap();
//!
//! let namespace = parser
//!     .parse_tokens(&["--repeat", "2", "a.txt", "b.txt", "out.txt"])
//!     .unwrap();
//! assert_eq!(namespace.get_int("repeat"), Some(2));
//! assert_eq!(namespace.get_str("output"), Some("out.txt"));
//! ```
#![deny(missing_docs)]

mod action;
mod api;
mod constant;
mod container;
mod matcher;
mod model;
mod namespace;
mod parser;

pub use action::{ActionTag, CustomAction};
pub use api::{Arg, SubparsersSpec};
pub use constant::SUPPRESS;
pub use container::{ConflictHandler, GroupId, MutexId, Registered, SubparsersId};
pub use model::{ArgType, Nargs, Value};
pub use namespace::Namespace;
pub use parser::{
    ArgumentParser, ConfigError, ConsoleInterface, FormatterKind, ParseError, ParserOptions,
    UserInterface,
};

#[cfg(test)]
#[macro_use]
extern crate assert_matches;
