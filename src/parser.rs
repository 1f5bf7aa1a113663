mod base;
mod interface;
mod printer;

pub use base::{ArgumentParser, ConfigError, ParseError, ParserOptions};
pub use interface::{ConsoleInterface, UserInterface};
pub use printer::FormatterKind;

pub(crate) use base::Raise;

#[cfg(test)]
pub(crate) use interface::util;
