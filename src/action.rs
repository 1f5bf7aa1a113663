use std::rc::Rc;

use crate::constant::SUPPRESS;
use crate::model::{ArgType, Nargs, Value};
use crate::namespace::Namespace;
use crate::parser::{ArgumentParser, ParseError, Raise, UserInterface};

/// The closed set of action names resolvable through the `action` registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTag {
    /// Store the coerced value(s) at the destination.
    Store,
    /// Store a fixed constant.
    StoreConst,
    /// Store `true`.
    StoreTrue,
    /// Store `false`.
    StoreFalse,
    /// Append the coerced value(s) to the list at the destination.
    Append,
    /// Append a fixed constant.
    AppendConst,
    /// Count occurrences.
    Count,
    /// Print help and exit.
    Help,
    /// Print the version text and exit.
    Version,
}

/// The contract for user supplied actions.
///
/// A custom action receives the owning parser, the result namespace, the
/// already-coerced values, and the option string it was invoked through (if
/// any). Returning an error surfaces it through the parser's error boundary.
pub trait CustomAction {
    /// Perform the action's side effect on the namespace.
    fn apply(
        &self,
        parser: &ArgumentParser,
        namespace: &mut Namespace,
        values: Value,
        option_string: Option<&str>,
    ) -> Result<(), String>;
}

pub(crate) struct SubCommand {
    pub(crate) name: String,
    pub(crate) help: Option<String>,
    pub(crate) parser: ArgumentParser,
}

pub(crate) struct SubParsers {
    pub(crate) commands: Vec<SubCommand>,
    pub(crate) prog: Option<String>,
}

impl SubParsers {
    pub(crate) fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|sc| sc.name.as_str()).collect()
    }

    pub(crate) fn find(&self, name: &str) -> Option<&SubCommand> {
        self.commands.iter().find(|sc| sc.name == name)
    }
}

pub(crate) enum ActionKind {
    Store,
    StoreConst,
    StoreTrue,
    StoreFalse,
    Append,
    AppendConst,
    Count,
    Help,
    Version,
    SubParsers(SubParsers),
    Custom(Rc<dyn CustomAction>),
}

impl ActionKind {
    // store-const/true/false, append-const, count, help and version never consume values
    pub(crate) fn zero_arity(&self) -> bool {
        matches!(
            self,
            ActionKind::StoreConst
                | ActionKind::StoreTrue
                | ActionKind::StoreFalse
                | ActionKind::AppendConst
                | ActionKind::Count
                | ActionKind::Help
                | ActionKind::Version
        )
    }
}

/// One declared argument: its identity, arity, coercion, and namespace effect.
pub(crate) struct Action {
    pub(crate) kind: ActionKind,
    pub(crate) option_strings: Vec<String>,
    pub(crate) dest: String,
    pub(crate) nargs: Option<Nargs>,
    pub(crate) constant: Option<Value>,
    pub(crate) default: Value,
    pub(crate) type_: ArgType,
    pub(crate) choices: Option<Vec<Value>>,
    pub(crate) required: bool,
    pub(crate) help: Option<String>,
    pub(crate) metavar: Option<String>,
    pub(crate) version: Option<String>,
}

impl Action {
    /// An action is positional iff it has no option strings.
    pub(crate) fn is_positional(&self) -> bool {
        self.option_strings.is_empty()
    }

    /// The arity used for matching: the zero-arity kinds and the sub-parser
    /// dispatch pin their own, everything else reads the declaration.
    pub(crate) fn effective_nargs(&self) -> Option<Nargs> {
        if self.kind.zero_arity() {
            Some(Nargs::Exactly(0))
        } else if matches!(self.kind, ActionKind::SubParsers(_)) {
            Some(Nargs::Parser)
        } else {
            self.nargs
        }
    }

    pub(crate) fn hidden(&self) -> bool {
        matches!(&self.help, Some(help) if help == SUPPRESS)
    }

    /// The name used to refer to this action in error messages.
    pub(crate) fn display_name(&self) -> String {
        if !self.option_strings.is_empty() {
            self.option_strings.join("/")
        } else if let Some(metavar) = &self.metavar {
            metavar.clone()
        } else {
            self.dest.clone()
        }
    }

    pub(crate) fn apply(
        &self,
        parser: &ArgumentParser,
        user_interface: &dyn UserInterface,
        namespace: &mut Namespace,
        values: Value,
        option_string: Option<&str>,
        extras: &mut Vec<String>,
    ) -> Result<(), Raise> {
        match &self.kind {
            ActionKind::Store => {
                namespace.set(&self.dest, values);
            }
            ActionKind::StoreConst => {
                namespace.set(&self.dest, self.constant.clone().unwrap_or(Value::None));
            }
            ActionKind::StoreTrue => {
                namespace.set(&self.dest, Value::Bool(true));
            }
            ActionKind::StoreFalse => {
                namespace.set(&self.dest, Value::Bool(false));
            }
            ActionKind::Append => {
                self.append(namespace, values);
            }
            ActionKind::AppendConst => {
                self.append(namespace, self.constant.clone().unwrap_or(Value::None));
            }
            ActionKind::Count => {
                let count = match namespace.get(&self.dest) {
                    Some(Value::Int(n)) => *n,
                    _ => 0,
                };
                namespace.set(&self.dest, Value::Int(count + 1));
            }
            ActionKind::Help => {
                user_interface.print(parser.format_help());
                return Err(Raise::Exit(0));
            }
            ActionKind::Version => {
                let text = self
                    .version
                    .clone()
                    .or_else(|| parser.version_text().map(String::from))
                    .unwrap_or_default();
                user_interface.print(text.replace("%program%", parser.program()));
                return Err(Raise::Exit(0));
            }
            ActionKind::SubParsers(sub_parsers) => {
                return self.delegate(sub_parsers, user_interface, namespace, values, extras);
            }
            ActionKind::Custom(handler) => {
                handler
                    .apply(parser, namespace, values, option_string)
                    .map_err(|message| {
                        Raise::Error(ParseError::argument(self.display_name(), message))
                    })?;
            }
        }

        Ok(())
    }

    fn append(&self, namespace: &mut Namespace, value: Value) {
        let mut items = match namespace.get(&self.dest) {
            Some(Value::List(items)) => items.clone(),
            _ => Vec::default(),
        };
        items.push(value);
        namespace.set(&self.dest, Value::List(items));
    }

    fn delegate(
        &self,
        sub_parsers: &SubParsers,
        user_interface: &dyn UserInterface,
        namespace: &mut Namespace,
        values: Value,
        extras: &mut Vec<String>,
    ) -> Result<(), Raise> {
        let items = match values {
            Value::List(items) => items,
            other => vec![other],
        };
        let mut tokens = items.iter().map(|v| v.to_string());
        let name = match tokens.next() {
            Some(name) => name,
            None => {
                return Err(Raise::Error(ParseError::argument(
                    self.display_name(),
                    "expected one argument".to_string(),
                )));
            }
        };

        if self.dest != SUPPRESS {
            namespace.set(&self.dest, Value::Str(name.clone()));
        }

        let sub_command = sub_parsers.find(&name).ok_or_else(|| {
            Raise::Error(ParseError::argument(
                self.display_name(),
                format!(
                    "unknown parser '{name}' (choices: {})",
                    sub_parsers.names().join(", ")
                ),
            ))
        })?;

        let remaining: Vec<String> = tokens.collect();
        let leftover = sub_command
            .parser
            .parse_known_into(&remaining, namespace, user_interface)
            .map_err(Raise::Exit)?;
        extras.extend(leftover);
        Ok(())
    }
}
