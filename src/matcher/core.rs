use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;

use crate::action::Action;
use crate::matcher::{nargs_pattern, OptionTuple};
use crate::model::{Nargs, Value};
use crate::namespace::Namespace;
use crate::parser::{ArgumentParser, ParseError, Raise, UserInterface};

#[cfg(feature = "debug")]
use tracing::debug;

/// One matching run: distributes the raw tokens among the declared optionals
/// and positionals under the per-action arity rules, invoking each action as
/// its tokens are settled.
///
/// The substrate is a pattern string with one character per token: `O` for a
/// recognized (or option-looking) optional, `A` for a positional value, `-`
/// for the `--` delimiter. Arity fragments are matched against it, anchored
/// at the cursor.
pub(crate) struct TokenMatcher<'p> {
    parser: &'p ArgumentParser,
    tokens: Vec<String>,
    pattern: String,
    option_tuples: BTreeMap<usize, OptionTuple>,
    conflicts: HashMap<usize, Vec<usize>>,
    seen: HashSet<usize>,
    seen_non_default: HashSet<usize>,
    extras: Vec<String>,
}

impl<'p> TokenMatcher<'p> {
    pub(crate) fn new(parser: &'p ArgumentParser, tokens: Vec<String>) -> Result<Self, Raise> {
        let mut pattern = String::with_capacity(tokens.len());
        let mut option_tuples = BTreeMap::default();
        let mut all_positional = false;

        for (index, token) in tokens.iter().enumerate() {
            if all_positional {
                pattern.push('A');
            } else if token == "--" {
                // Everything after the delimiter is positional.
                pattern.push('-');
                all_positional = true;
            } else {
                match parse_optional(parser, token)? {
                    Some(tuple) => {
                        option_tuples.insert(index, tuple);
                        pattern.push('O');
                    }
                    None => pattern.push('A'),
                }
            }
        }

        #[cfg(feature = "debug")]
        {
            debug!("Matched tokens {tokens:?} to the pattern '{pattern}'.");
        }

        Ok(Self {
            conflicts: parser.container().conflict_map(),
            parser,
            tokens,
            pattern,
            option_tuples,
            seen: HashSet::default(),
            seen_non_default: HashSet::default(),
            extras: Vec::default(),
        })
    }

    /// Run the alternating positional/optional consumption loop, then the
    /// post-loop requirement checks. Returns the unrecognized extras.
    pub(crate) fn consume(
        mut self,
        namespace: &mut Namespace,
        user_interface: &dyn UserInterface,
    ) -> Result<Vec<String>, Raise> {
        let mut positionals = self.parser.container().positionals();
        let mut cursor = 0;

        while let Some(next_option) = self.next_option_index(cursor) {
            if cursor != next_option {
                let end =
                    self.consume_positionals(cursor, &mut positionals, namespace, user_interface)?;
                if end > cursor {
                    // A positional (ex: a sub-parser dispatch) may have run
                    // past the option; re-derive the next option index.
                    cursor = end;
                    continue;
                }
            }

            if cursor != next_option {
                self.extras
                    .extend_from_slice(&self.tokens[cursor..next_option]);
                cursor = next_option;
            }

            cursor = self.consume_optional(cursor, namespace, user_interface)?;
        }

        let stop = self.consume_positionals(cursor, &mut positionals, namespace, user_interface)?;
        self.extras.extend_from_slice(&self.tokens[stop..]);

        self.check_requirements(&positionals)?;
        Ok(self.extras)
    }

    fn next_option_index(&self, cursor: usize) -> Option<usize> {
        self.option_tuples.range(cursor..).next().map(|(i, _)| *i)
    }

    /// Match as many of the remaining positionals as possible against the
    /// pattern from `cursor`, progressively trimming the tail until a match
    /// is found; invoke each matched positional over its token slice.
    fn consume_positionals(
        &mut self,
        mut cursor: usize,
        positionals: &mut Vec<usize>,
        namespace: &mut Namespace,
        user_interface: &dyn UserInterface,
    ) -> Result<usize, Raise> {
        let counts = self.match_arguments_partial(positionals, cursor);

        for (action_index, count) in positionals.iter().zip(counts.iter()) {
            let values = self.tokens[cursor..cursor + count].to_vec();
            cursor += count;
            self.take_action(*action_index, &values, None, namespace, user_interface)?;
        }

        positionals.drain(..counts.len());
        Ok(cursor)
    }

    fn match_arguments_partial(&self, positionals: &[usize], cursor: usize) -> Vec<usize> {
        let parser = self.parser;
        let slice = &self.pattern[cursor..];

        for take in (1..=positionals.len()).rev() {
            let joined: String = positionals[..take]
                .iter()
                .map(|index| nargs_pattern(&parser.container().actions[*index]))
                .collect();
            let matcher = Regex::new(&format!("^{joined}"))
                .expect("internal error - arity fragments must compile");
            if let Some(captures) = matcher.captures(slice) {
                return (1..=take)
                    .map(|group| captures.get(group).map(|m| m.as_str().len()).unwrap_or(0))
                    .collect();
            }
        }

        Vec::default()
    }

    /// Consume the optional recorded at `cursor`, walking short-option
    /// clusters out of an explicit value when necessary.
    fn consume_optional(
        &mut self,
        cursor: usize,
        namespace: &mut Namespace,
        user_interface: &dyn UserInterface,
    ) -> Result<usize, Raise> {
        let parser = self.parser;
        let tuple = self
            .option_tuples
            .get(&cursor)
            .cloned()
            .expect("internal error - the cursor must sit on a recorded optional");

        let OptionTuple {
            mut action,
            mut option_string,
            mut explicit,
        } = tuple;
        let mut invocations: Vec<(usize, Vec<String>, String)> = Vec::default();
        let stop;

        loop {
            let action_index = match action {
                Some(index) => index,
                None => {
                    // Option-looking, but unknown here; it may belong to a
                    // child parser.
                    self.extras.push(self.tokens[cursor].clone());
                    return Ok(cursor + 1);
                }
            };

            match explicit.take() {
                Some(explicit_value) => {
                    let count = self.match_argument(action_index, "A")?;

                    if count == 0 && !parser.container().is_long(&option_string) {
                        // A zero-arity short option: the explicit value is a
                        // cluster of further short options (ex: -xvf=X).
                        invocations.push((action_index, Vec::default(), option_string.clone()));

                        let prefix = option_string
                            .chars()
                            .next()
                            .expect("internal error - option strings cannot be empty");
                        let mut remainder = explicit_value.chars();
                        let head = match remainder.next() {
                            Some(head) => head,
                            None => {
                                return Err(self.ignored_explicit(action_index, &explicit_value));
                            }
                        };
                        let next_option_string = format!("{prefix}{head}");
                        let mut tail: String = remainder.collect();
                        // A '=' at the transition delimits the next option's value.
                        if let Some(stripped) = tail.strip_prefix('=') {
                            tail = stripped.to_string();
                        }

                        match parser.container().option_index.get(&next_option_string) {
                            Some(next_action) => {
                                action = Some(*next_action);
                                option_string = next_option_string;
                                explicit = if tail.is_empty() { None } else { Some(tail) };
                            }
                            None => {
                                return Err(self.ignored_explicit(action_index, &explicit_value));
                            }
                        }
                    } else if count == 1 {
                        stop = cursor + 1;
                        invocations.push((action_index, vec![explicit_value], option_string.clone()));
                        break;
                    } else {
                        return Err(self.ignored_explicit(action_index, &explicit_value));
                    }
                }
                None => {
                    let count = self.match_argument_at(action_index, cursor + 1)?;
                    stop = cursor + 1 + count;
                    let values = self.tokens[cursor + 1..stop].to_vec();
                    invocations.push((action_index, values, option_string.clone()));
                    break;
                }
            }
        }

        for (action_index, values, option_string) in invocations {
            self.take_action(
                action_index,
                &values,
                Some(&option_string),
                namespace,
                user_interface,
            )?;
        }

        Ok(stop)
    }

    fn ignored_explicit(&self, action_index: usize, explicit_value: &str) -> Raise {
        let action = &self.parser.container().actions[action_index];
        Raise::Error(ParseError::argument(
            action.display_name(),
            format!("ignored explicit argument '{explicit_value}'"),
        ))
    }

    fn match_argument_at(&self, action_index: usize, cursor: usize) -> Result<usize, Raise> {
        let slice = self.pattern[cursor..].to_string();
        self.match_argument(action_index, &slice)
    }

    /// The length of the action's arity match against the pattern slice, or
    /// the arity error when it cannot match.
    fn match_argument(&self, action_index: usize, slice: &str) -> Result<usize, Raise> {
        let action = &self.parser.container().actions[action_index];
        let fragment = nargs_pattern(action);
        let matcher = Regex::new(&format!("^{fragment}"))
            .expect("internal error - arity fragments must compile");

        match matcher.captures(slice) {
            Some(captures) => Ok(captures
                .get(1)
                .map(|m| m.as_str().len())
                .unwrap_or(0)),
            None => {
                let message = match action.effective_nargs() {
                    None => "expected one argument".to_string(),
                    Some(Nargs::Optional) => "expected at most one argument".to_string(),
                    Some(Nargs::AtLeastOne) => "expected at least one argument".to_string(),
                    Some(Nargs::Exactly(1)) => "expected 1 argument".to_string(),
                    Some(other) => format!("expected {other} arguments"),
                };
                Err(Raise::Error(ParseError::argument(
                    action.display_name(),
                    message,
                )))
            }
        }
    }

    /// Coerce, validate, and shape the raw values, run the mutual-exclusion
    /// check, and invoke the action's side effect.
    fn take_action(
        &mut self,
        action_index: usize,
        raw_values: &[String],
        option_string: Option<&str>,
        namespace: &mut Namespace,
        user_interface: &dyn UserInterface,
    ) -> Result<(), Raise> {
        let parser = self.parser;
        let action = &parser.container().actions[action_index];
        self.seen.insert(action_index);

        let values = self.shape_values(action, raw_values)?;

        // Actions that produce their default don't count as "present" for
        // the mutual-exclusion checks.
        if values != action.default {
            self.seen_non_default.insert(action_index);
            if let Some(siblings) = self.conflicts.get(&action_index) {
                for sibling in siblings {
                    if self.seen_non_default.contains(sibling) {
                        return Err(Raise::Error(ParseError::argument(
                            action.display_name(),
                            format!(
                                "not allowed with argument {}",
                                parser.container().actions[*sibling].display_name()
                            ),
                        )));
                    }
                }
            }
        }

        if values.is_suppress() {
            return Ok(());
        }

        action.apply(
            parser,
            user_interface,
            namespace,
            values,
            option_string,
            &mut self.extras,
        )
    }

    fn shape_values(&self, action: &Action, raw_values: &[String]) -> Result<Value, Raise> {
        let nargs = action.effective_nargs();

        let mut strings: Vec<&str> = raw_values.iter().map(String::as_str).collect();
        if !matches!(nargs, Some(Nargs::Parser) | Some(Nargs::Remainder)) {
            if let Some(position) = strings.iter().position(|s| *s == "--") {
                strings.remove(position);
            }
        }

        match nargs {
            Some(Nargs::Optional) => match strings.as_slice() {
                [single] => {
                    let value = self.convert(action, single)?;
                    self.check_choice(action, &value)?;
                    Ok(value)
                }
                _ => {
                    let value = if action.is_positional() {
                        action.default.clone()
                    } else {
                        action.constant.clone().unwrap_or(Value::None)
                    };
                    if let Value::Str(raw) = &value {
                        if !value.is_suppress() {
                            let converted = self.convert(action, &raw.clone())?;
                            self.check_choice(action, &converted)?;
                            return Ok(converted);
                        }
                    }
                    Ok(value)
                }
            },
            Some(Nargs::Any) if strings.is_empty() && action.is_positional() => {
                if action.default != Value::None {
                    Ok(action.default.clone())
                } else {
                    Ok(Value::List(Vec::default()))
                }
            }
            None => {
                let single = strings
                    .first()
                    .expect("internal error - the unset arity matches exactly one value");
                let value = self.convert(action, single)?;
                self.check_choice(action, &value)?;
                Ok(value)
            }
            Some(Nargs::Remainder) => {
                let items = strings
                    .iter()
                    .map(|raw| self.convert(action, raw))
                    .collect::<Result<Vec<Value>, Raise>>()?;
                Ok(Value::List(items))
            }
            Some(Nargs::Parser) => {
                let items = strings
                    .iter()
                    .map(|raw| self.convert(action, raw))
                    .collect::<Result<Vec<Value>, Raise>>()?;
                if let Some(first) = items.first() {
                    self.check_choice(action, first)?;
                }
                Ok(Value::List(items))
            }
            _ => {
                let items = strings
                    .iter()
                    .map(|raw| self.convert(action, raw))
                    .collect::<Result<Vec<Value>, Raise>>()?;
                for item in &items {
                    self.check_choice(action, item)?;
                }
                Ok(Value::List(items))
            }
        }
    }

    fn convert(&self, action: &Action, raw: &str) -> Result<Value, Raise> {
        action
            .type_
            .convert(raw)
            .map_err(|message| Raise::Error(ParseError::argument(action.display_name(), message)))
    }

    fn check_choice(&self, action: &Action, value: &Value) -> Result<(), Raise> {
        if let Some(choices) = &action.choices {
            if !choices.contains(value) {
                let rendered: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                return Err(Raise::Error(ParseError::argument(
                    action.display_name(),
                    format!(
                        "invalid choice: '{value}' (choose from {})",
                        rendered.join(", ")
                    ),
                )));
            }
        }
        Ok(())
    }

    fn check_requirements(&self, positionals: &[usize]) -> Result<(), Raise> {
        let container = self.parser.container();

        // A non-required positional left unmatched (ex: an omitted optional
        // sub-parser dispatch) is not an error.
        if positionals
            .iter()
            .any(|index| container.actions[*index].required)
        {
            return Err(Raise::Error(ParseError::general(
                "too few arguments".to_string(),
            )));
        }

        for (index, action) in container.actions.iter().enumerate() {
            if action.required && !self.seen.contains(&index) {
                return Err(Raise::Error(ParseError::general(format!(
                    "argument {} is required",
                    action.display_name()
                ))));
            }
        }

        for mutex_group in &container.mutex_groups {
            if mutex_group.required
                && !mutex_group
                    .members
                    .iter()
                    .any(|member| self.seen_non_default.contains(member))
            {
                let names: Vec<String> = mutex_group
                    .members
                    .iter()
                    .map(|member| &container.actions[*member])
                    .filter(|action| !action.hidden())
                    .map(|action| action.display_name())
                    .collect();
                return Err(Raise::Error(ParseError::general(format!(
                    "one of the arguments {} is required",
                    names.join(" ")
                ))));
            }
        }

        Ok(())
    }
}

/// Interpret a candidate token as an optional, per the recognition ladder:
/// verbatim index hit, `=`-delimited explicit value, prefix abbreviation,
/// then the negative-number and whitespace escapes.
fn parse_optional(parser: &ArgumentParser, token: &str) -> Result<Option<OptionTuple>, Raise> {
    let container = parser.container();

    if token.is_empty() || !container.is_prefixed(token) {
        return Ok(None);
    }

    if let Some(index) = container.option_index.get(token) {
        return Ok(Some(OptionTuple::known(*index, token, None)));
    }

    if token.chars().count() == 1 {
        return Ok(None);
    }

    if let Some((prefix, tail)) = token.split_once('=') {
        if let Some(index) = container.option_index.get(prefix) {
            return Ok(Some(OptionTuple::known(
                *index,
                prefix,
                Some(tail.to_string()),
            )));
        }
    }

    let mut tuples = option_tuples_for(parser, token);
    if tuples.len() > 1 {
        let matches: Vec<&str> = tuples.iter().map(|t| t.option_string.as_str()).collect();
        return Err(Raise::Error(ParseError::general(format!(
            "ambiguous option: {token} could match {}",
            matches.join(", ")
        ))));
    }
    if let Some(tuple) = tuples.pop() {
        return Ok(Some(tuple));
    }

    if container.looks_negative_number(token) && !container.has_negative_number_optionals {
        return Ok(None);
    }

    if token.contains(' ') {
        return Ok(None);
    }

    // Syntactically optional-looking, but with no known action; it may be a
    // positional value for a child parser.
    Ok(Some(OptionTuple::unknown(token)))
}

fn option_tuples_for(parser: &ArgumentParser, token: &str) -> Vec<OptionTuple> {
    let container = parser.container();
    let mut result = Vec::default();

    // Deterministic candidate order for the ambiguity message.
    let mut known: Vec<(&String, &usize)> = container.option_index.iter().collect();
    known.sort_by(|a, b| a.0.cmp(b.0));

    if container.is_long(token) {
        // Tokens with two prefix characters only split at the '='.
        if parser.allow_abbrev() {
            let (prefix, explicit) = match token.split_once('=') {
                Some((prefix, tail)) => (prefix, Some(tail.to_string())),
                None => (token, None),
            };
            for (option_string, index) in known {
                if option_string.starts_with(prefix) {
                    result.push(OptionTuple::known(*index, option_string, explicit.clone()));
                }
            }
        }
    } else {
        // A single character option may be concatenated with its value; a
        // multi character option always keeps its value separate.
        let chars: Vec<char> = token.chars().collect();
        let short_prefix: String = chars[..2].iter().collect();
        let short_explicit: String = chars[2..].iter().collect();

        for (option_string, index) in known {
            if option_string == &short_prefix {
                result.push(OptionTuple::known(
                    *index,
                    option_string,
                    Some(short_explicit.clone()),
                ));
            } else if parser.allow_abbrev() && option_string.starts_with(token) {
                result.push(OptionTuple::known(*index, option_string, None));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Arg;
    use crate::parser::util::InMemoryInterface;
    use crate::parser::{ArgumentParser, ParserOptions};
    use rstest::rstest;

    fn run(parser: &ArgumentParser, tokens: &[&str]) -> Result<(Namespace, Vec<String>), Raise> {
        let owned: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let mut namespace = Namespace::default();
        let interface = InMemoryInterface::default();
        let extras = parser.try_parse(&owned, &mut namespace, &interface)?;
        Ok((namespace, extras))
    }

    fn bare_parser() -> ArgumentParser {
        ArgumentParser::with_options(
            "program",
            ParserOptions {
                add_help: false,
                ..ParserOptions::default()
            },
        )
    }

    #[rstest]
    #[case(vec!["-f", "baz"])]
    #[case(vec!["--foo", "baz"])]
    #[case(vec!["--foo=baz"])]
    #[case(vec!["-f=baz"])]
    #[case(vec!["-fbaz"])]
    fn option_forms_equivalent(#[case] tokens: Vec<&str>) {
        // Setup
        let mut parser = bare_parser();
        parser.add_argument(["-f", "--foo"], Arg::store()).unwrap();

        // Execute
        let (namespace, extras) = run(&parser, tokens.as_slice()).unwrap();

        // Verify
        assert_eq!(namespace.get_str("foo"), Some("baz"));
        assert_eq!(extras, Vec::<String>::default());
    }

    #[test]
    fn abbreviation_unique() {
        let mut parser = bare_parser();
        parser.add_argument(["--foobar"], Arg::store()).unwrap();
        parser.add_argument(["--foonly"], Arg::store()).unwrap();

        let (namespace, _) = run(&parser, &["--foob", "x"]).unwrap();
        assert_eq!(namespace.get_str("foobar"), Some("x"));
    }

    #[test]
    fn abbreviation_ambiguous() {
        let mut parser = bare_parser();
        parser.add_argument(["--foo"], Arg::store()).unwrap();
        parser.add_argument(["--foobar"], Arg::store()).unwrap();

        let error = run(&parser, &["--fo", "x"]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(
                parse_error.to_string(),
                "ambiguous option: --fo could match --foo, --foobar"
            );
        });
    }

    #[test]
    fn abbreviation_disabled() {
        let mut parser = ArgumentParser::with_options(
            "program",
            ParserOptions {
                add_help: false,
                allow_abbrev: false,
                ..ParserOptions::default()
            },
        );
        parser.add_argument(["--foobar"], Arg::store()).unwrap();

        let (namespace, extras) = run(&parser, &["--foob", "x"]).unwrap();
        assert_eq!(namespace.get("foobar"), Some(&Value::None));
        assert_eq!(extras, vec!["--foob".to_string(), "x".to_string()]);
    }

    #[test]
    fn short_cluster() {
        let mut parser = bare_parser();
        parser.add_argument(["-a"], Arg::store_true()).unwrap();
        parser.add_argument(["-b"], Arg::store_true()).unwrap();
        parser.add_argument(["-c"], Arg::store_true()).unwrap();

        let (clustered, _) = run(&parser, &["-abc"]).unwrap();
        let (separate, _) = run(&parser, &["-a", "-b", "-c"]).unwrap();
        assert_eq!(clustered, separate);
        assert_eq!(clustered.get_bool("a"), Some(true));
        assert_eq!(clustered.get_bool("b"), Some(true));
        assert_eq!(clustered.get_bool("c"), Some(true));
    }

    #[test]
    fn short_cluster_with_value() {
        let mut parser = bare_parser();
        parser.add_argument(["-x"], Arg::store_true()).unwrap();
        parser.add_argument(["-v"], Arg::store_true()).unwrap();
        parser.add_argument(["-f"], Arg::store()).unwrap();

        let (namespace, _) = run(&parser, &["-xvf=X"]).unwrap();
        assert_eq!(namespace.get_bool("x"), Some(true));
        assert_eq!(namespace.get_bool("v"), Some(true));
        assert_eq!(namespace.get_str("f"), Some("X"));
    }

    #[test]
    fn ignored_explicit_argument() {
        let mut parser = bare_parser();
        parser.add_argument(["-x"], Arg::store_true()).unwrap();

        let error = run(&parser, &["-x=5"]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(
                parse_error.to_string(),
                "argument -x: ignored explicit argument '5'"
            );
        });
    }

    #[test]
    fn double_dash_switches_to_positional() {
        let mut parser = bare_parser();
        parser.add_argument(["-x"], Arg::store_true()).unwrap();
        parser.add_argument(["value"], Arg::store()).unwrap();

        let (namespace, extras) = run(&parser, &["--", "-x"]).unwrap();
        assert_eq!(namespace.get_str("value"), Some("-x"));
        assert_eq!(namespace.get_bool("x"), Some(false));
        assert_eq!(extras, Vec::<String>::default());
    }

    #[rstest]
    #[case(vec!["-1"], "-1")]
    #[case(vec!["-2.5"], "-2.5")]
    fn negative_number_positional(#[case] tokens: Vec<&str>, #[case] expected: &str) {
        let mut parser = bare_parser();
        parser.add_argument(["value"], Arg::store()).unwrap();

        let (namespace, _) = run(&parser, tokens.as_slice()).unwrap();
        assert_eq!(namespace.get_str("value"), Some(expected));
    }

    #[test]
    fn negative_number_option_wins_when_declared() {
        let mut parser = bare_parser();
        parser
            .add_argument(["-1"], Arg::store().dest("one"))
            .unwrap();

        let (namespace, _) = run(&parser, &["-1", "x"]).unwrap();
        assert_eq!(namespace.get_str("one"), Some("x"));
    }

    #[test]
    fn whitespace_token_is_positional() {
        let mut parser = bare_parser();
        parser.add_argument(["value"], Arg::store()).unwrap();

        let (namespace, _) = run(&parser, &["-has a space"]).unwrap();
        assert_eq!(namespace.get_str("value"), Some("-has a space"));
    }

    #[test]
    fn unknown_option_goes_to_extras() {
        let mut parser = bare_parser();
        parser.add_argument(["-x"], Arg::store_true()).unwrap();

        let (namespace, extras) = run(&parser, &["-x", "--mystery", "-y"]).unwrap();
        assert_eq!(namespace.get_bool("x"), Some(true));
        assert_eq!(extras, vec!["--mystery".to_string(), "-y".to_string()]);
    }

    #[test]
    fn remainder_preserves_everything() {
        let mut parser = bare_parser();
        parser.add_argument(["-x"], Arg::store_true()).unwrap();
        parser
            .add_argument(["rest"], Arg::store().nargs(Nargs::Remainder))
            .unwrap();

        let (namespace, extras) = run(&parser, &["-x", "a", "--unknown", "-x", "b"]).unwrap();
        assert_eq!(
            namespace.get("rest"),
            Some(&Value::List(vec![
                Value::Str("a".to_string()),
                Value::Str("--unknown".to_string()),
                Value::Str("-x".to_string()),
                Value::Str("b".to_string()),
            ]))
        );
        assert_eq!(extras, Vec::<String>::default());
    }

    #[rstest]
    #[case(vec![], Value::List(vec![]))]
    #[case(vec!["a"], Value::List(vec![Value::Str("a".to_string())]))]
    #[case(
        vec!["a", "b"],
        Value::List(vec![Value::Str("a".to_string()), Value::Str("b".to_string())])
    )]
    fn any_arity_shapes(#[case] tokens: Vec<&str>, #[case] expected: Value) {
        let mut parser = bare_parser();
        parser
            .add_argument(["items"], Arg::store().nargs(Nargs::Any))
            .unwrap();

        let (namespace, _) = run(&parser, tokens.as_slice()).unwrap();
        assert_eq!(namespace.get("items"), Some(&expected));
    }

    #[test]
    fn any_arity_empty_yields_declared_default() {
        let mut parser = bare_parser();
        parser
            .add_argument(
                ["items"],
                Arg::store()
                    .nargs(Nargs::Any)
                    .default(Value::Str("fallback".to_string())),
            )
            .unwrap();

        let (namespace, _) = run(&parser, &[]).unwrap();
        assert_eq!(namespace.get_str("items"), Some("fallback"));
    }

    #[test]
    fn exact_arity() {
        let mut parser = bare_parser();
        parser
            .add_argument(["pair"], Arg::store().nargs(Nargs::Exactly(2)))
            .unwrap();

        let (namespace, _) = run(&parser, &["a", "b"]).unwrap();
        assert_eq!(
            namespace.get("pair"),
            Some(&Value::List(vec![
                Value::Str("a".to_string()),
                Value::Str("b".to_string()),
            ]))
        );

        let error = run(&parser, &["a"]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(parse_error.to_string(), "too few arguments");
        });
    }

    #[test]
    fn optional_wrong_arity() {
        let mut parser = bare_parser();
        parser
            .add_argument(["--pair"], Arg::store().nargs(Nargs::Exactly(2)))
            .unwrap();

        let error = run(&parser, &["--pair", "a"]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(parse_error.to_string(), "argument --pair: expected 2 arguments");
        });
    }

    #[test]
    fn interleaved_positionals_and_optionals() {
        let mut parser = bare_parser();
        parser.add_argument(["-x"], Arg::store()).unwrap();
        parser.add_argument(["first"], Arg::store()).unwrap();
        parser
            .add_argument(["rest"], Arg::store().nargs(Nargs::AtLeastOne))
            .unwrap();

        let (namespace, _) = run(&parser, &["a", "-x", "1", "b", "c"]).unwrap();
        assert_eq!(namespace.get_str("first"), Some("a"));
        assert_eq!(namespace.get_str("x"), Some("1"));
        assert_eq!(
            namespace.get("rest"),
            Some(&Value::List(vec![
                Value::Str("b".to_string()),
                Value::Str("c".to_string()),
            ]))
        );
    }

    #[test]
    fn mutex_violation() {
        let mut parser = bare_parser();
        let mutex = parser.add_mutually_exclusive_group(false);
        parser
            .add_argument_to_mutex(mutex, ["-a"], Arg::store_true())
            .unwrap();
        parser
            .add_argument_to_mutex(mutex, ["-b"], Arg::store_true())
            .unwrap();

        run(&parser, &["-a"]).unwrap();
        run(&parser, &["-b"]).unwrap();

        let error = run(&parser, &["-a", "-b"]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(parse_error.to_string(), "argument -b: not allowed with argument -a");
        });
    }

    #[test]
    fn mutex_required_unsatisfied() {
        let mut parser = bare_parser();
        let mutex = parser.add_mutually_exclusive_group(true);
        parser
            .add_argument_to_mutex(mutex, ["-a"], Arg::store_true())
            .unwrap();
        parser
            .add_argument_to_mutex(mutex, ["-b"], Arg::store_true())
            .unwrap();

        let error = run(&parser, &[]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(parse_error.to_string(), "one of the arguments -a -b is required");
        });
    }

    #[test]
    fn required_option_missing() {
        let mut parser = bare_parser();
        parser
            .add_argument(["-r", "--required"], Arg::store().required(true))
            .unwrap();

        let error = run(&parser, &[]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(parse_error.to_string(), "argument -r/--required is required");
        });
    }

    #[test]
    fn choices_validated_after_coercion() {
        let mut parser = bare_parser();
        parser
            .add_argument(
                ["--level"],
                Arg::store()
                    .type_(crate::model::ArgType::Int)
                    .choices([Value::Int(1), Value::Int(2)]),
            )
            .unwrap();

        let (namespace, _) = run(&parser, &["--level", "2"]).unwrap();
        assert_eq!(namespace.get_int("level"), Some(2));

        let error = run(&parser, &["--level", "3"]).unwrap_err();
        assert_matches!(error, Raise::Error(parse_error) => {
            assert_eq!(
                parse_error.to_string(),
                "argument --level: invalid choice: '3' (choose from 1, 2)"
            );
        });
    }

    #[test]
    fn optional_arity_explicit_and_absent() {
        let mut parser = bare_parser();
        parser
            .add_argument(
                ["--mode"],
                Arg::store()
                    .nargs(Nargs::Optional)
                    .constant(Value::Str("flagged".to_string()))
                    .default(Value::Str("off".to_string())),
            )
            .unwrap();

        let (namespace, _) = run(&parser, &[]).unwrap();
        assert_eq!(namespace.get_str("mode"), Some("off"));

        let (namespace, _) = run(&parser, &["--mode"]).unwrap();
        assert_eq!(namespace.get_str("mode"), Some("flagged"));

        let (namespace, _) = run(&parser, &["--mode", "on"]).unwrap();
        assert_eq!(namespace.get_str("mode"), Some("on"));
    }
}
