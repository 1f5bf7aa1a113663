use std::collections::HashMap;

use regex::Regex;

use crate::action::{Action, ActionKind, ActionTag};
use crate::api::{ActionSelect, Arg, TypeSelect};
use crate::model::{ArgType, Nargs, Value};
use crate::parser::ConfigError;

// A token that looks like a negative number is only an option if some declared
// option also looks like one.
const NEGATIVE_NUMBER_PATTERN: &str = r"^-\d+$|^-\d*\.\d+$";

/// Identifies an argument group created by
/// [`ArgumentParser::add_argument_group`](crate::ArgumentParser::add_argument_group).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupId(pub(crate) usize);

/// Identifies a mutually exclusive group created by
/// [`ArgumentParser::add_mutually_exclusive_group`](crate::ArgumentParser::add_mutually_exclusive_group).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexId(pub(crate) usize);

/// Identifies a sub-parser dispatch argument created by
/// [`ArgumentParser::add_subparsers`](crate::ArgumentParser::add_subparsers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubparsersId(pub(crate) usize);

/// The policy applied when two declarations claim the same option string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictHandler {
    /// Reject the new declaration.
    Error,
    /// Strip the claimed strings from the prior declaration, dropping it
    /// entirely once stripped bare.
    Resolve,
}

/// A handler bound into the container registry via
/// [`ArgumentParser::register`](crate::ArgumentParser::register).
pub enum Registered {
    /// An entry for the `action` category.
    Action(ActionTag),
    /// An entry for the `type` category.
    Type(ArgType),
}

pub(crate) struct Group {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) members: Vec<usize>,
}

pub(crate) struct MutexGroup {
    pub(crate) required: bool,
    pub(crate) members: Vec<usize>,
}

pub(crate) const POSITIONALS_GROUP: usize = 0;
pub(crate) const OPTIONS_GROUP: usize = 1;

/// The registry of declared arguments: the action list, the option-string
/// index, the defaults store, group memberships, and the conflict policy.
pub(crate) struct ActionContainer {
    pub(crate) actions: Vec<Action>,
    pub(crate) option_index: HashMap<String, usize>,
    registries: HashMap<String, HashMap<String, Registered>>,
    pub(crate) defaults: HashMap<String, Value>,
    pub(crate) groups: Vec<Group>,
    pub(crate) mutex_groups: Vec<MutexGroup>,
    pub(crate) prefix_chars: String,
    conflict_handler: ConflictHandler,
    argument_default: Option<Value>,
    pub(crate) has_negative_number_optionals: bool,
    negative_number_matcher: Regex,
}

impl ActionContainer {
    pub(crate) fn new(
        prefix_chars: String,
        conflict_handler: ConflictHandler,
        argument_default: Option<Value>,
    ) -> Self {
        let mut registries = HashMap::default();
        let mut actions: HashMap<String, Registered> = HashMap::default();
        actions.insert("store".to_string(), Registered::Action(ActionTag::Store));
        actions.insert(
            "store_const".to_string(),
            Registered::Action(ActionTag::StoreConst),
        );
        actions.insert(
            "store_true".to_string(),
            Registered::Action(ActionTag::StoreTrue),
        );
        actions.insert(
            "store_false".to_string(),
            Registered::Action(ActionTag::StoreFalse),
        );
        actions.insert("append".to_string(), Registered::Action(ActionTag::Append));
        actions.insert(
            "append_const".to_string(),
            Registered::Action(ActionTag::AppendConst),
        );
        actions.insert("count".to_string(), Registered::Action(ActionTag::Count));
        actions.insert("help".to_string(), Registered::Action(ActionTag::Help));
        actions.insert("version".to_string(), Registered::Action(ActionTag::Version));
        registries.insert("action".to_string(), actions);

        let mut types: HashMap<String, Registered> = HashMap::default();
        types.insert("auto".to_string(), Registered::Type(ArgType::Auto));
        types.insert("int".to_string(), Registered::Type(ArgType::Int));
        types.insert("float".to_string(), Registered::Type(ArgType::Float));
        types.insert("str".to_string(), Registered::Type(ArgType::Str));
        registries.insert("type".to_string(), types);

        Self {
            actions: Vec::default(),
            option_index: HashMap::default(),
            registries,
            defaults: HashMap::default(),
            groups: vec![
                Group {
                    title: Some("positional arguments".to_string()),
                    description: None,
                    members: Vec::default(),
                },
                Group {
                    title: Some("options".to_string()),
                    description: None,
                    members: Vec::default(),
                },
            ],
            mutex_groups: Vec::default(),
            prefix_chars,
            conflict_handler,
            argument_default,
            has_negative_number_optionals: false,
            negative_number_matcher: Regex::new(NEGATIVE_NUMBER_PATTERN)
                .expect("internal error - the negative number pattern must compile"),
        }
    }

    /// Bind a handler into the registry. Unknown categories and names are
    /// permitted; they stay resolvable under the name given here.
    pub(crate) fn register(&mut self, category: impl Into<String>, name: impl Into<String>, entry: Registered) {
        self.registries
            .entry(category.into())
            .or_default()
            .insert(name.into(), entry);
    }

    /// Merge into the defaults map, overwriting the default of any
    /// already-declared action whose destination matches.
    pub(crate) fn set_defaults(&mut self, pairs: impl IntoIterator<Item = (String, Value)>) {
        for (dest, value) in pairs {
            for action in self.actions.iter_mut() {
                if action.dest == dest {
                    action.default = value.clone();
                }
            }
            self.defaults.insert(dest, value);
        }
    }

    pub(crate) fn get_default(&self, dest: &str) -> Option<Value> {
        for action in &self.actions {
            if action.dest == dest && action.default != Value::None {
                return Some(action.default.clone());
            }
        }
        self.defaults.get(dest).cloned()
    }

    pub(crate) fn is_prefixed(&self, token: &str) -> bool {
        token
            .chars()
            .next()
            .map(|c| self.prefix_chars.contains(c))
            .unwrap_or(false)
    }

    pub(crate) fn looks_negative_number(&self, token: &str) -> bool {
        self.negative_number_matcher.is_match(token)
    }

    /// Declare an argument. Classifies it as positional or optional, infers
    /// the destination, resolves the action and type through the registries,
    /// applies the conflict policy, and indexes the option strings.
    pub(crate) fn add_argument(
        &mut self,
        tokens: Vec<String>,
        arg: Arg,
        group: Option<usize>,
        mutex: Option<usize>,
    ) -> Result<usize, ConfigError> {
        let positional = match tokens.as_slice() {
            [] => true,
            [single] => !self.is_prefixed(single),
            _ => tokens.iter().any(|t| !self.is_prefixed(t)),
        };

        if positional && tokens.len() > 1 {
            return Err(ConfigError(format!(
                "invalid option strings {tokens:?}: each must start with a character in '{chars}'",
                chars = self.prefix_chars
            )));
        }

        let kind = self.resolve_action(&arg)?;
        let type_ = self.resolve_type(&arg)?;

        let (option_strings, dest, required) = if positional {
            self.classify_positional(&tokens, &arg)?
        } else {
            self.classify_optional(&tokens, &arg)?
        };

        if mutex.is_some() {
            if option_strings.is_empty() || required {
                return Err(ConfigError(
                    "mutually exclusive arguments must be optional".to_string(),
                ));
            }
        }

        validate_shape(&kind, &arg, &dest)?;

        let default = match &arg.default {
            Some(value) => value.clone(),
            None => match self.defaults.get(&dest) {
                Some(value) => value.clone(),
                None => match (&kind, &self.argument_default) {
                    (ActionKind::StoreTrue, _) => Value::Bool(false),
                    (ActionKind::StoreFalse, _) => Value::Bool(true),
                    (_, Some(value)) => value.clone(),
                    (_, None) => Value::None,
                },
            },
        };

        let action = Action {
            kind,
            option_strings,
            dest,
            nargs: arg.nargs,
            constant: arg.constant,
            default,
            type_,
            choices: arg.choices,
            required,
            help: arg.help,
            metavar: arg.metavar,
            version: arg.version,
        };

        let index = self.install(action, group, mutex)?;
        Ok(index)
    }

    /// Append a fully built action, running the conflict check and updating
    /// every index. Also the entry point for parent-parser composition.
    pub(crate) fn install(
        &mut self,
        action: Action,
        group: Option<usize>,
        mutex: Option<usize>,
    ) -> Result<usize, ConfigError> {
        self.check_conflicts(&action)?;

        let index = self.actions.len();
        for option_string in &action.option_strings {
            self.option_index.insert(option_string.clone(), index);
            if self.negative_number_matcher.is_match(option_string) {
                self.has_negative_number_optionals = true;
            }
        }

        let group = group.unwrap_or(if action.is_positional() {
            POSITIONALS_GROUP
        } else {
            OPTIONS_GROUP
        });
        self.groups[group].members.push(index);

        if let Some(mutex) = mutex {
            self.mutex_groups[mutex].members.push(index);
        }

        self.actions.push(action);
        Ok(index)
    }

    fn classify_positional(
        &self,
        tokens: &[String],
        arg: &Arg,
    ) -> Result<(Vec<String>, String, bool), ConfigError> {
        if arg.required.is_some() {
            return Err(ConfigError(
                "'required' is an invalid argument for positionals".to_string(),
            ));
        }

        let dest = match (&arg.dest, tokens.first()) {
            (Some(dest), _) => dest.clone(),
            (None, Some(token)) => token.replace('-', "_"),
            (None, None) => {
                return Err(ConfigError(
                    "a positional declared without tokens requires a dest".to_string(),
                ));
            }
        };

        let default_declared = arg.default.is_some();
        let required = match arg.nargs {
            Some(Nargs::Optional) => false,
            Some(Nargs::Any) if default_declared => false,
            _ => true,
        };

        Ok((Vec::default(), dest, required))
    }

    fn classify_optional(
        &self,
        tokens: &[String],
        arg: &Arg,
    ) -> Result<(Vec<String>, String, bool), ConfigError> {
        for token in tokens {
            if !self.is_prefixed(token) {
                return Err(ConfigError(format!(
                    "invalid option string '{token}': must start with a character in '{chars}'",
                    chars = self.prefix_chars
                )));
            }
        }

        let dest = match &arg.dest {
            Some(dest) => dest.clone(),
            None => {
                // Prefer the first long option string for the destination.
                let source = tokens
                    .iter()
                    .find(|t| self.is_long(t))
                    .or_else(|| tokens.first())
                    .expect("internal error - optionals must have at least one token");
                let stripped: String = source
                    .chars()
                    .skip_while(|c| self.prefix_chars.contains(*c))
                    .collect();
                if stripped.is_empty() {
                    return Err(ConfigError(format!(
                        "dest= is required for options like '{source}'"
                    )));
                }
                stripped.replace('-', "_")
            }
        };

        Ok((tokens.to_vec(), dest, arg.required.unwrap_or(false)))
    }

    pub(crate) fn is_long(&self, token: &str) -> bool {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(first), Some(second)) => {
                self.prefix_chars.contains(first) && self.prefix_chars.contains(second)
            }
            _ => false,
        }
    }

    fn check_conflicts(&mut self, action: &Action) -> Result<(), ConfigError> {
        let conflicting: Vec<String> = action
            .option_strings
            .iter()
            .filter(|os| self.option_index.contains_key(*os))
            .cloned()
            .collect();

        if conflicting.is_empty() {
            return Ok(());
        }

        match self.conflict_handler {
            ConflictHandler::Error => Err(ConfigError(format!(
                "argument {name}: conflicting option string(s): {strings}",
                name = action.display_name(),
                strings = conflicting.join(", ")
            ))),
            ConflictHandler::Resolve => {
                for option_string in conflicting {
                    let prior = *self
                        .option_index
                        .get(&option_string)
                        .expect("internal error - conflicting string must be indexed");
                    self.option_index.remove(&option_string);
                    self.actions[prior]
                        .option_strings
                        .retain(|os| os != &option_string);
                    if self.actions[prior].option_strings.is_empty() {
                        self.remove_action(prior);
                    }
                }
                Ok(())
            }
        }
    }

    // Removal shifts every index above the removed slot; fix all the views.
    fn remove_action(&mut self, index: usize) {
        self.actions.remove(index);

        let shift = |i: &mut usize| {
            if *i > index {
                *i -= 1;
            }
        };
        self.option_index.retain(|_, i| *i != index);
        for i in self.option_index.values_mut() {
            shift(i);
        }
        for group in self.groups.iter_mut() {
            group.members.retain(|i| *i != index);
            for i in group.members.iter_mut() {
                shift(i);
            }
        }
        for mutex_group in self.mutex_groups.iter_mut() {
            mutex_group.members.retain(|i| *i != index);
            for i in mutex_group.members.iter_mut() {
                shift(i);
            }
        }
    }

    fn resolve_action(&self, arg: &Arg) -> Result<ActionKind, ConfigError> {
        match &arg.action {
            ActionSelect::Tag(tag) => Ok(kind_from_tag(*tag)),
            ActionSelect::Custom(handler) => Ok(ActionKind::Custom(handler.clone())),
            ActionSelect::Named(name) => {
                match self.registries.get("action").and_then(|r| r.get(name)) {
                    Some(Registered::Action(tag)) => Ok(kind_from_tag(*tag)),
                    Some(Registered::Type(_)) => Err(ConfigError(format!(
                        "registry entry '{name}' is not an action"
                    ))),
                    None => Err(ConfigError(format!("unknown action '{name}'"))),
                }
            }
        }
    }

    fn resolve_type(&self, arg: &Arg) -> Result<ArgType, ConfigError> {
        match &arg.type_ {
            None => Ok(ArgType::Auto),
            Some(TypeSelect::Typed(type_)) => Ok(type_.clone()),
            Some(TypeSelect::Named(name)) => {
                match self.registries.get("type").and_then(|r| r.get(name)) {
                    Some(Registered::Type(type_)) => Ok(type_.clone()),
                    Some(Registered::Action(_)) => {
                        Err(ConfigError(format!("registry entry '{name}' is not a type")))
                    }
                    None => Err(ConfigError(format!("unknown type '{name}'"))),
                }
            }
        }
    }

    /// Flatten `other` into this container: groups are re-created by title,
    /// mutex groups re-created, and every action re-added into the
    /// corresponding group. Used by parent-parser composition.
    pub(crate) fn add_container_actions(&mut self, other: ActionContainer) -> Result<(), ConfigError> {
        let mut group_map: HashMap<usize, usize> = HashMap::default();
        for (other_index, other_group) in other.groups.iter().enumerate() {
            let matching: Vec<usize> = self
                .groups
                .iter()
                .enumerate()
                .filter(|(_, g)| g.title == other_group.title)
                .map(|(i, _)| i)
                .collect();
            let target = match matching.as_slice() {
                [] => {
                    self.groups.push(Group {
                        title: other_group.title.clone(),
                        description: other_group.description.clone(),
                        members: Vec::default(),
                    });
                    self.groups.len() - 1
                }
                [single] => *single,
                _ => {
                    return Err(ConfigError(format!(
                        "cannot merge actions - two groups are named '{title}'",
                        title = other_group.title.clone().unwrap_or_default()
                    )));
                }
            };
            group_map.insert(other_index, target);
        }

        let mut mutex_map: HashMap<usize, usize> = HashMap::default();
        for (other_index, other_mutex) in other.mutex_groups.iter().enumerate() {
            self.mutex_groups.push(MutexGroup {
                required: other_mutex.required,
                members: Vec::default(),
            });
            mutex_map.insert(other_index, self.mutex_groups.len() - 1);
        }

        let memberships: Vec<(Option<usize>, Option<usize>)> = (0..other.actions.len())
            .map(|index| {
                let group = other
                    .groups
                    .iter()
                    .position(|g| g.members.contains(&index))
                    .and_then(|g| group_map.get(&g).copied());
                let mutex = other
                    .mutex_groups
                    .iter()
                    .position(|g| g.members.contains(&index))
                    .and_then(|g| mutex_map.get(&g).copied());
                (group, mutex)
            })
            .collect();

        for (action, (group, mutex)) in other.actions.into_iter().zip(memberships) {
            self.install(action, group, mutex)?;
        }

        for (dest, value) in other.defaults {
            self.defaults.entry(dest).or_insert(value);
        }

        Ok(())
    }

    pub(crate) fn positionals(&self) -> Vec<usize> {
        (0..self.actions.len())
            .filter(|i| self.actions[*i].is_positional())
            .collect()
    }

    pub(crate) fn optionals(&self) -> Vec<usize> {
        (0..self.actions.len())
            .filter(|i| !self.actions[*i].is_positional())
            .collect()
    }

    /// Per action, the sibling actions it may not be combined with.
    pub(crate) fn conflict_map(&self) -> HashMap<usize, Vec<usize>> {
        let mut conflicts: HashMap<usize, Vec<usize>> = HashMap::default();
        for mutex_group in &self.mutex_groups {
            for member in &mutex_group.members {
                let siblings: Vec<usize> = mutex_group
                    .members
                    .iter()
                    .filter(|other| *other != member)
                    .copied()
                    .collect();
                conflicts.entry(*member).or_default().extend(siblings);
            }
        }
        conflicts
    }

    pub(crate) fn mutex_of(&self, index: usize) -> Option<usize> {
        self.mutex_groups
            .iter()
            .position(|g| g.members.contains(&index))
    }
}

fn kind_from_tag(tag: ActionTag) -> ActionKind {
    match tag {
        ActionTag::Store => ActionKind::Store,
        ActionTag::StoreConst => ActionKind::StoreConst,
        ActionTag::StoreTrue => ActionKind::StoreTrue,
        ActionTag::StoreFalse => ActionKind::StoreFalse,
        ActionTag::Append => ActionKind::Append,
        ActionTag::AppendConst => ActionKind::AppendConst,
        ActionTag::Count => ActionKind::Count,
        ActionTag::Help => ActionKind::Help,
        ActionTag::Version => ActionKind::Version,
    }
}

fn validate_shape(kind: &ActionKind, arg: &Arg, dest: &str) -> Result<(), ConfigError> {
    if kind.zero_arity() && arg.nargs.is_some() {
        return Err(ConfigError(format!(
            "argument {dest}: nargs is not allowed with a zero-arity action"
        )));
    }

    if matches!(kind, ActionKind::Store | ActionKind::Append) {
        if matches!(arg.nargs, Some(Nargs::Exactly(0))) {
            return Err(ConfigError(format!(
                "argument {dest}: nargs for store/append actions must be != 0"
            )));
        }
        if arg.constant.is_some() && arg.nargs != Some(Nargs::Optional) {
            return Err(ConfigError(format!(
                "argument {dest}: nargs must be '?' to supply a constant"
            )));
        }
    }

    if dest.is_empty() {
        return Err(ConfigError("dest must not be empty".to_string()));
    }

    Ok(())
}
