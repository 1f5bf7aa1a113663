use std::rc::Rc;

use crate::action::{ActionTag, CustomAction};
use crate::model::{ArgType, Nargs, Value};

pub(crate) enum ActionSelect {
    /// Resolved through the container's `action` registry at declaration time.
    Named(String),
    Tag(ActionTag),
    Custom(Rc<dyn CustomAction>),
}

pub(crate) enum TypeSelect {
    /// Resolved through the container's `type` registry at declaration time.
    Named(String),
    Typed(ArgType),
}

/// The declaration of a single argument, consumed by
/// [`ArgumentParser::add_argument`](crate::ArgumentParser::add_argument).
///
/// An `Arg` starts from an action variant constructor and is refined with the
/// chainable attribute methods.
///
/// ### Example
/// ```
/// use clarg::{Arg, ArgType, ArgumentParser, Value};
///
/// let mut parser = ArgumentParser::new("program");
/// parser
///     .add_argument(["-r", "--retries"], Arg::store().type_(ArgType::Int).default(Value::Int(3)))
///     .unwrap();
/// let namespace = parser.parse_tokens(&["--retries", "5"]).unwrap();
/// assert_eq!(namespace.get_int("retries"), Some(5));
/// ```
pub struct Arg {
    pub(crate) action: ActionSelect,
    pub(crate) nargs: Option<Nargs>,
    pub(crate) constant: Option<Value>,
    pub(crate) default: Option<Value>,
    pub(crate) type_: Option<TypeSelect>,
    pub(crate) choices: Option<Vec<Value>>,
    pub(crate) required: Option<bool>,
    pub(crate) help: Option<String>,
    pub(crate) metavar: Option<String>,
    pub(crate) dest: Option<String>,
    pub(crate) version: Option<String>,
}

impl Arg {
    fn tagged(tag: ActionTag) -> Self {
        Self {
            action: ActionSelect::Tag(tag),
            nargs: None,
            constant: None,
            default: None,
            type_: None,
            choices: None,
            required: None,
            help: None,
            metavar: None,
            dest: None,
            version: None,
        }
    }

    /// Store the coerced value(s) at the destination.
    pub fn store() -> Self {
        Self::tagged(ActionTag::Store)
    }

    /// Store a fixed constant when the option is given.
    pub fn store_const(constant: Value) -> Self {
        Self::tagged(ActionTag::StoreConst).constant(constant)
    }

    /// Store `true` when given; the destination defaults to `false`.
    pub fn store_true() -> Self {
        Self::tagged(ActionTag::StoreTrue)
    }

    /// Store `false` when given; the destination defaults to `true`.
    pub fn store_false() -> Self {
        Self::tagged(ActionTag::StoreFalse)
    }

    /// Append the coerced value(s) to the list at the destination.
    pub fn append() -> Self {
        Self::tagged(ActionTag::Append)
    }

    /// Append a fixed constant to the list at the destination.
    pub fn append_const(constant: Value) -> Self {
        Self::tagged(ActionTag::AppendConst).constant(constant)
    }

    /// Count occurrences of the option.
    pub fn count() -> Self {
        Self::tagged(ActionTag::Count)
    }

    /// Print the version text and exit with status `0`.
    pub fn version(text: impl Into<String>) -> Self {
        let mut arg = Self::tagged(ActionTag::Version);
        arg.version.replace(text.into());
        arg
    }

    /// Select the action by registry name (ex: `"store"`, `"append"`, `"help"`).
    pub fn with_action(name: impl Into<String>) -> Self {
        let mut arg = Self::tagged(ActionTag::Store);
        arg.action = ActionSelect::Named(name.into());
        arg
    }

    /// Supply a user action implementing the [`CustomAction`] contract.
    pub fn custom(handler: impl CustomAction + 'static) -> Self {
        let mut arg = Self::tagged(ActionTag::Store);
        arg.action = ActionSelect::Custom(Rc::new(handler));
        arg
    }

    /// The arity of the argument.
    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs.replace(nargs);
        self
    }

    /// The constant used by the zero-arity forms and the `?` arity.
    pub fn constant(mut self, constant: Value) -> Self {
        self.constant.replace(constant);
        self
    }

    /// The value produced when the argument is absent.
    pub fn default(mut self, default: Value) -> Self {
        self.default.replace(default);
        self
    }

    /// The coercion applied to each raw value.
    pub fn type_(mut self, type_: ArgType) -> Self {
        self.type_.replace(TypeSelect::Typed(type_));
        self
    }

    /// Select the coercion by registry name (ex: `"int"`, `"float"`).
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_.replace(TypeSelect::Named(name.into()));
        self
    }

    /// Restrict the coerced values to a finite set.
    pub fn choices(mut self, choices: impl IntoIterator<Item = Value>) -> Self {
        self.choices.replace(choices.into_iter().collect());
        self
    }

    /// Whether the argument must be given (optionals only).
    pub fn required(mut self, required: bool) -> Self {
        self.required.replace(required);
        self
    }

    /// The help message; [`SUPPRESS`](crate::SUPPRESS) hides the argument.
    ///
    /// `%name%` tokens are substituted by the help formatter from the
    /// argument's own attributes plus `%program%`.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help.replace(help.into());
        self
    }

    /// The display name used for the argument's values in usage and help.
    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar.replace(metavar.into());
        self
    }

    /// Override the destination key in the result namespace.
    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest.replace(dest.into());
        self
    }
}

/// The declaration of a sub-parser dispatch argument, consumed by
/// [`ArgumentParser::add_subparsers`](crate::ArgumentParser::add_subparsers).
pub struct SubparsersSpec {
    pub(crate) dest: Option<String>,
    pub(crate) prog: Option<String>,
    pub(crate) required: bool,
    pub(crate) help: Option<String>,
    pub(crate) metavar: Option<String>,
}

impl Default for SubparsersSpec {
    fn default() -> Self {
        Self {
            dest: None,
            prog: None,
            required: false,
            help: None,
            metavar: None,
        }
    }
}

impl SubparsersSpec {
    /// Record the selected sub-command name at this destination.
    /// Without a destination the selection is not materialized.
    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest.replace(dest.into());
        self
    }

    /// The program prefix used in sub-command usage lines.
    /// Defaults to the owning parser's program name.
    pub fn prog(mut self, prog: impl Into<String>) -> Self {
        self.prog.replace(prog.into());
        self
    }

    /// Whether selecting a sub-command is mandatory.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// The help message shown for the dispatch argument.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help.replace(help.into());
        self
    }

    /// The display name used for the dispatch argument in usage and help.
    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar.replace(metavar.into());
        self
    }
}
