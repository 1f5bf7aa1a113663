mod core;
mod model;

pub(crate) use self::core::TokenMatcher;
pub(crate) use self::model::{nargs_pattern, OptionTuple};
