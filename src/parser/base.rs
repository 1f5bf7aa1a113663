use std::env;

use thiserror::Error;

use crate::action::{Action, ActionKind, SubCommand, SubParsers};
use crate::api::{Arg, SubparsersSpec};
use crate::constant::{DEFAULT_PREFIX_CHARS, HELP_MESSAGE, HELP_NAME, HELP_SHORT, SUPPRESS};
use crate::container::{
    ActionContainer, ConflictHandler, Group, GroupId, MutexGroup, MutexId, Registered, SubparsersId,
};
use crate::matcher::TokenMatcher;
use crate::model::{ArgType, Value};
use crate::namespace::Namespace;
use crate::parser::interface::{ConsoleInterface, UserInterface};
use crate::parser::printer::{terminal_width, FormatterKind, HelpFormatter};

/// An impossible configuration, raised at declaration time.
#[derive(Debug, Error)]
#[error("Config error: {0}")]
pub struct ConfigError(pub(crate) String);

/// A failure to interpret the input tokens, raised at parse time and routed
/// through the parser's error boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A failure attributable to one declared argument.
    #[error("argument {argument}: {message}")]
    Argument {
        /// The offending argument, rendered as `-x/--xxx` (or its dest).
        argument: String,
        /// The failure description.
        message: String,
    },

    /// A failure not attributable to a single argument.
    #[error("{0}")]
    General(String),
}

impl ParseError {
    pub(crate) fn argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        ParseError::Argument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub(crate) fn general(message: impl Into<String>) -> Self {
        ParseError::General(message.into())
    }
}

/// The two ways a parse run stops early: an error still to be rendered, or a
/// deliberate exit (help/version, or a child parser that already reported).
#[derive(Debug)]
pub(crate) enum Raise {
    Error(ParseError),
    Exit(i32),
}

/// Construction-time options for [`ArgumentParser::with_options`].
pub struct ParserOptions {
    /// Add the automatic `-h`/`--help` option. Defaults to `true`.
    pub add_help: bool,
    /// The characters that introduce options. Defaults to `"-"`.
    pub prefix_chars: String,
    /// The policy for duplicate option strings. Defaults to
    /// [`ConflictHandler::Error`].
    pub conflict_handler: ConflictHandler,
    /// Recognize unambiguous abbreviations of long options. Defaults to `true`.
    pub allow_abbrev: bool,
    /// The container-wide fallback default value.
    pub argument_default: Option<Value>,
    /// The characters that introduce argument-file tokens (ex: `"@"` for
    /// `@args.txt`). Off by default.
    pub fromfile_prefix_chars: Option<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            add_help: true,
            prefix_chars: DEFAULT_PREFIX_CHARS.to_string(),
            conflict_handler: ConflictHandler::Error,
            allow_abbrev: true,
            argument_default: None,
            fromfile_prefix_chars: None,
        }
    }
}

/// The command line parser: a declaration registry plus the matching engine
/// driving it.
///
/// Declare arguments with [`ArgumentParser::add_argument`] and friends, then
/// run one of the parse entry points. Parsing is a pure function of the
/// declarations and the input tokens: it produces a fresh [`Namespace`] (and,
/// for the known-variant, the leftover tokens).
///
/// ### Example
/// ```
/// use clarg::{Arg, ArgumentParser};
///
/// let mut parser = ArgumentParser::new("frobnicate");
/// parser.add_argument(["-v", "--verbose"], Arg::store_true()).unwrap();
/// parser.add_argument(["path"], Arg::store()).unwrap();
///
/// let namespace = parser.parse_tokens(&["--verbose", "in.txt"]).unwrap();
/// assert_eq!(namespace.get_bool("verbose"), Some(true));
/// assert_eq!(namespace.get_str("path"), Some("in.txt"));
/// ```
pub struct ArgumentParser {
    container: ActionContainer,
    program: String,
    usage: Option<String>,
    description: Option<String>,
    epilog: Option<String>,
    formatter: FormatterKind,
    version: Option<String>,
    allow_abbrev: bool,
    fromfile_prefix_chars: Option<String>,
    interface: Box<dyn UserInterface>,
}

impl ArgumentParser {
    /// Create a parser with the default options (automatic help, `-` prefix).
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_options(program, ParserOptions::default())
    }

    /// Create a parser with explicit construction options.
    pub fn with_options(program: impl Into<String>, options: ParserOptions) -> Self {
        let mut container = ActionContainer::new(
            options.prefix_chars,
            options.conflict_handler,
            options.argument_default,
        );

        if options.add_help {
            let prefix = if container.prefix_chars.contains('-') {
                '-'
            } else {
                container
                    .prefix_chars
                    .chars()
                    .next()
                    .expect("internal error - the prefix alphabet cannot be empty")
            };
            container
                .add_argument(
                    vec![
                        format!("{prefix}{HELP_SHORT}"),
                        format!("{prefix}{prefix}{HELP_NAME}"),
                    ],
                    Arg::with_action("help")
                        .default(Value::suppress())
                        .help(HELP_MESSAGE),
                    None,
                    None,
                )
                .expect("internal error - the automatic help option must install");
        }

        Self {
            container,
            program: program.into(),
            usage: None,
            description: None,
            epilog: None,
            formatter: FormatterKind::Default,
            version: None,
            allow_abbrev: options.allow_abbrev,
            fromfile_prefix_chars: options.fromfile_prefix_chars,
            interface: Box::new(ConsoleInterface::default()),
        }
    }

    /// Document the description shown between the usage line and the
    /// argument listings.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description.replace(description.into());
        self
    }

    /// Document the epilog shown after the argument listings.
    pub fn epilog(mut self, epilog: impl Into<String>) -> Self {
        self.epilog.replace(epilog.into());
        self
    }

    /// Override the generated usage line. `%program%` expands to the program
    /// name.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage.replace(usage.into());
        self
    }

    /// Select the help formatter variant.
    pub fn formatter(mut self, formatter: FormatterKind) -> Self {
        self.formatter = formatter;
        self
    }

    /// The version text used by the `version` action when the declaration
    /// carries none. `%program%` expands to the program name.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version.replace(version.into());
        self
    }

    /// Inject the stream handles (stdout/stderr by default).
    pub fn interface(mut self, interface: Box<dyn UserInterface>) -> Self {
        self.interface = interface;
        self
    }

    /// Flatten `parent`'s declarations into this parser: actions, groups,
    /// mutex groups, and defaults are merged at construction; no runtime
    /// link remains. Build parents with `add_help: false` to avoid the
    /// automatic help options colliding.
    pub fn parent(mut self, parent: ArgumentParser) -> Result<Self, ConfigError> {
        self.container.add_container_actions(parent.container)?;
        Ok(self)
    }

    /// Bind a handler into the container registry (categories `action` and
    /// `type` are consulted by [`Arg::with_action`] and [`Arg::type_name`]).
    pub fn register(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        entry: Registered,
    ) {
        self.container.register(category, name, entry);
    }

    /// Merge into the defaults map; overwrites the default of any declared
    /// action with a matching destination.
    pub fn set_defaults<S: Into<String>>(&mut self, pairs: impl IntoIterator<Item = (S, Value)>) {
        self.container
            .set_defaults(pairs.into_iter().map(|(dest, value)| (dest.into(), value)));
    }

    /// The effective default for a destination, if any.
    pub fn get_default(&self, dest: &str) -> Option<Value> {
        self.container.get_default(dest)
    }

    /// Declare an argument. Positional iff `tokens` is empty (requires
    /// [`Arg::dest`]) or its single element does not start with a prefix
    /// character. Returns the action's index.
    pub fn add_argument<I, S>(&mut self, tokens: I, arg: Arg) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        self.container.add_argument(tokens, arg, None, None)
    }

    /// Create a titled argument group; arguments added to it are listed
    /// under its own help section.
    pub fn add_argument_group(
        &mut self,
        title: impl Into<String>,
        description: Option<&str>,
    ) -> GroupId {
        self.container.groups.push(Group {
            title: Some(title.into()),
            description: description.map(String::from),
            members: Vec::default(),
        });
        GroupId(self.container.groups.len() - 1)
    }

    /// Declare an argument listed under the given group's help section.
    pub fn add_argument_to_group<I, S>(
        &mut self,
        group: GroupId,
        tokens: I,
        arg: Arg,
    ) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        self.container.add_argument(tokens, arg, Some(group.0), None)
    }

    /// Create a mutually exclusive group: at most one member may be given
    /// with a non-default value, and a required group must see one.
    pub fn add_mutually_exclusive_group(&mut self, required: bool) -> MutexId {
        self.container.mutex_groups.push(MutexGroup {
            required,
            members: Vec::default(),
        });
        MutexId(self.container.mutex_groups.len() - 1)
    }

    /// Declare an argument as a member of the given mutually exclusive
    /// group. Members must be non-required optionals.
    pub fn add_argument_to_mutex<I, S>(
        &mut self,
        mutex: MutexId,
        tokens: I,
        arg: Arg,
    ) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        self.container.add_argument(tokens, arg, None, Some(mutex.0))
    }

    /// Declare the sub-parser dispatch argument. At most one per parser.
    pub fn add_subparsers(&mut self, spec: SubparsersSpec) -> Result<SubparsersId, ConfigError> {
        if self
            .container
            .actions
            .iter()
            .any(|action| matches!(action.kind, ActionKind::SubParsers(_)))
        {
            return Err(ConfigError(
                "cannot have multiple subparser arguments".to_string(),
            ));
        }

        let action = Action {
            kind: ActionKind::SubParsers(SubParsers {
                commands: Vec::default(),
                prog: spec.prog,
            }),
            option_strings: Vec::default(),
            dest: spec.dest.unwrap_or_else(|| SUPPRESS.to_string()),
            nargs: None,
            constant: None,
            default: Value::None,
            type_: ArgType::Auto,
            choices: None,
            required: spec.required,
            help: spec.help,
            metavar: spec.metavar,
            version: None,
        };
        let index = self.container.install(action, None, None)?;
        Ok(SubparsersId(index))
    }

    /// Register a named sub-command and return its parser for configuration.
    /// The child's program name is `"{program} {name}"`.
    pub fn add_parser(
        &mut self,
        id: SubparsersId,
        name: impl Into<String>,
        help: Option<&str>,
    ) -> Result<&mut ArgumentParser, ConfigError> {
        let name = name.into();
        let prefix_chars = self.container.prefix_chars.clone();
        let formatter = self.formatter;
        let root_program = self.program.clone();

        let action = self
            .container
            .actions
            .get_mut(id.0)
            .ok_or_else(|| ConfigError("unknown subparsers identifier".to_string()))?;
        let sub_parsers = match &mut action.kind {
            ActionKind::SubParsers(sub_parsers) => sub_parsers,
            _ => {
                return Err(ConfigError(
                    "the identifier does not refer to a subparsers argument".to_string(),
                ));
            }
        };

        if sub_parsers.find(&name).is_some() {
            return Err(ConfigError(format!(
                "sub-command '{name}' is already declared"
            )));
        }

        let program = format!(
            "{prog} {name}",
            prog = sub_parsers.prog.clone().unwrap_or(root_program)
        );
        let mut child = ArgumentParser::with_options(
            program,
            ParserOptions {
                prefix_chars,
                ..ParserOptions::default()
            },
        );
        child.formatter = formatter;

        sub_parsers.commands.push(SubCommand {
            name,
            help: help.map(String::from),
            parser: child,
        });
        let slot = sub_parsers
            .commands
            .last_mut()
            .expect("internal error - the sub-command was just pushed");
        Ok(&mut slot.parser)
    }

    /// Run against the process argument list (skipping the program entry).
    /// Exits the process on error (status `1`), help, and version (status
    /// `0`).
    pub fn parse(self) -> Namespace {
        let tokens: Vec<String> = env::args().skip(1).collect();
        let token_refs: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        match self.parse_tokens(token_refs.as_slice()) {
            Ok(namespace) => namespace,
            Err(code) => std::process::exit(code),
        }
    }

    /// Run against explicit tokens; errors if any token goes unrecognized.
    ///
    /// `Err` carries the would-be exit status: `0` after help/version output,
    /// `1` after an error (usage + message on the error stream).
    pub fn parse_tokens(&self, tokens: &[&str]) -> Result<Namespace, i32> {
        let (namespace, extras) = self.parse_known_tokens(tokens)?;
        if !extras.is_empty() {
            return Err(self.fail(
                &*self.interface,
                ParseError::general(format!("unrecognized arguments: {}", extras.join(" "))),
            ));
        }
        Ok(namespace)
    }

    /// Run against explicit tokens, surfacing unrecognized extras instead of
    /// erroring on them.
    pub fn parse_known_tokens(&self, tokens: &[&str]) -> Result<(Namespace, Vec<String>), i32> {
        let owned: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let mut namespace = Namespace::default();
        let extras = self.parse_known_into(&owned, &mut namespace, &*self.interface)?;
        Ok((namespace, extras))
    }

    /// The shared parse path: also the entry point for sub-parser
    /// delegation, which reuses the caller's namespace and interface.
    pub(crate) fn parse_known_into(
        &self,
        tokens: &[String],
        namespace: &mut Namespace,
        user_interface: &dyn UserInterface,
    ) -> Result<Vec<String>, i32> {
        match self.try_parse(tokens, namespace, user_interface) {
            Ok(extras) => Ok(extras),
            Err(Raise::Error(error)) => Err(self.fail(user_interface, error)),
            Err(Raise::Exit(code)) => Err(code),
        }
    }

    pub(crate) fn try_parse(
        &self,
        tokens: &[String],
        namespace: &mut Namespace,
        user_interface: &dyn UserInterface,
    ) -> Result<Vec<String>, Raise> {
        let tokens = match &self.fromfile_prefix_chars {
            Some(prefix_chars) => expand_argument_files(prefix_chars, tokens)?,
            None => tokens.to_vec(),
        };
        self.seed_defaults(namespace)?;
        TokenMatcher::new(self, tokens)?.consume(namespace, user_interface)
    }

    // Defaults are written once, before matching; string defaults coerce
    // through the action's type.
    fn seed_defaults(&self, namespace: &mut Namespace) -> Result<(), Raise> {
        for action in &self.container.actions {
            if action.dest == SUPPRESS
                || namespace.contains(&action.dest)
                || action.default.is_suppress()
            {
                continue;
            }
            let value = match &action.default {
                Value::Str(raw) => action.type_.convert(raw).map_err(|message| {
                    Raise::Error(ParseError::argument(action.display_name(), message))
                })?,
                other => other.clone(),
            };
            namespace.set(&action.dest, value);
        }

        for (dest, value) in &self.container.defaults {
            if !namespace.contains(dest) {
                namespace.set(dest, value.clone());
            }
        }

        Ok(())
    }

    fn fail(&self, user_interface: &dyn UserInterface, error: ParseError) -> i32 {
        user_interface.print_error(self.format_usage().trim_end().to_string());
        user_interface.print_error(format!(
            "{program}: error: {error}",
            program = self.program
        ));
        1
    }

    /// Render the usage line.
    pub fn format_usage(&self) -> String {
        let mut formatter =
            HelpFormatter::new(self.formatter, self.program.clone(), terminal_width());
        formatter.add_usage(self.usage.as_deref(), &self.container);
        formatter.format_help()
    }

    /// Render the full help message.
    pub fn format_help(&self) -> String {
        let mut formatter =
            HelpFormatter::new(self.formatter, self.program.clone(), terminal_width());
        formatter.add_usage(self.usage.as_deref(), &self.container);
        formatter.add_text(self.description.as_deref());
        for index in 0..self.container.groups.len() {
            let (title, description) = {
                let group = &self.container.groups[index];
                (group.title.clone(), group.description.clone())
            };
            formatter.start_section(title);
            formatter.add_text(description.as_deref());
            let members = self.container.groups[index].members.clone();
            formatter.add_arguments(&members, &self.container);
            formatter.end_section();
        }
        formatter.add_text(self.epilog.as_deref());
        formatter.format_help()
    }

    /// Write the usage line to the output stream.
    pub fn print_usage(&self) {
        self.interface.print(self.format_usage().trim_end().to_string());
    }

    /// Write the full help message to the output stream.
    pub fn print_help(&self) {
        self.interface.print(self.format_help().trim_end().to_string());
    }

    pub(crate) fn container(&self) -> &ActionContainer {
        &self.container
    }

    pub(crate) fn program(&self) -> &str {
        &self.program
    }

    pub(crate) fn allow_abbrev(&self) -> bool {
        self.allow_abbrev
    }

    pub(crate) fn version_text(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

fn expand_argument_files(prefix_chars: &str, tokens: &[String]) -> Result<Vec<String>, Raise> {
    let mut expanded = Vec::default();

    for token in tokens {
        match token.chars().next() {
            Some(first) if prefix_chars.contains(first) => {
                let path = &token[first.len_utf8()..];
                let content = std::fs::read_to_string(path).map_err(|error| {
                    Raise::Error(ParseError::general(format!("can't open '{path}': {error}")))
                })?;
                // One token per line, expanded recursively.
                let lines: Vec<String> = content.lines().map(String::from).collect();
                expanded.extend(expand_argument_files(prefix_chars, &lines)?);
            }
            _ => expanded.push(token.clone()),
        }
    }

    Ok(expanded)
}
