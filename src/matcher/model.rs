use crate::action::Action;
use crate::model::Nargs;

/// The interpretation of one option-looking token: the matched action (none
/// for a syntactically optional token with no known action), the option
/// string it matched through, and an `=`-delimited explicit value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OptionTuple {
    pub(crate) action: Option<usize>,
    pub(crate) option_string: String,
    pub(crate) explicit: Option<String>,
}

impl OptionTuple {
    pub(crate) fn known(action: usize, option_string: impl Into<String>, explicit: Option<String>) -> Self {
        Self {
            action: Some(action),
            option_string: option_string.into(),
            explicit,
        }
    }

    pub(crate) fn unknown(option_string: impl Into<String>) -> Self {
        Self {
            action: None,
            option_string: option_string.into(),
            explicit: None,
        }
    }
}

/// The regex fragment an action's arity compiles to, matched against the
/// O/A/- pattern string. Optionals may not absorb `--`, so their fragments
/// drop the `-` parts.
pub(crate) fn nargs_pattern(action: &Action) -> String {
    let fragment = match action.effective_nargs() {
        // the unset arity is assumed to be a single value
        None => "(-*A-*)".to_string(),
        Some(Nargs::Optional) => "(-*A?-*)".to_string(),
        Some(Nargs::Any) => "(-*[A-]*)".to_string(),
        Some(Nargs::AtLeastOne) => "(-*A[A-]*)".to_string(),
        Some(Nargs::Remainder) => "([-AO]*)".to_string(),
        Some(Nargs::Parser) => "(-*A[-AO]*)".to_string(),
        Some(Nargs::Exactly(n)) => format!("(-*{}-*)", vec!["A"; n].join("-*")),
    };

    if action.is_positional() {
        fragment
    } else {
        fragment.replace("-*", "").replace('-', "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, SubParsers};
    use crate::model::{ArgType, Value};
    use rstest::rstest;

    fn action(option_strings: Vec<String>, nargs: Option<Nargs>) -> Action {
        Action {
            kind: ActionKind::Store,
            option_strings,
            dest: "value".to_string(),
            nargs,
            constant: None,
            default: Value::None,
            type_: ArgType::Auto,
            choices: None,
            required: false,
            help: None,
            metavar: None,
            version: None,
        }
    }

    #[rstest]
    #[case(None, "(-*A-*)")]
    #[case(Some(Nargs::Optional), "(-*A?-*)")]
    #[case(Some(Nargs::Any), "(-*[A-]*)")]
    #[case(Some(Nargs::AtLeastOne), "(-*A[A-]*)")]
    #[case(Some(Nargs::Remainder), "([-AO]*)")]
    #[case(Some(Nargs::Parser), "(-*A[-AO]*)")]
    #[case(Some(Nargs::Exactly(1)), "(-*A-*)")]
    #[case(Some(Nargs::Exactly(3)), "(-*A-*A-*A-*)")]
    fn positional_fragments(#[case] nargs: Option<Nargs>, #[case] expected: &str) {
        let subject = action(Vec::default(), nargs);
        assert_eq!(nargs_pattern(&subject), expected);
    }

    #[rstest]
    #[case(None, "(A)")]
    #[case(Some(Nargs::Optional), "(A?)")]
    #[case(Some(Nargs::Any), "([A]*)")]
    #[case(Some(Nargs::AtLeastOne), "(A[A]*)")]
    #[case(Some(Nargs::Remainder), "([AO]*)")]
    #[case(Some(Nargs::Exactly(2)), "(AA)")]
    fn optional_fragments(#[case] nargs: Option<Nargs>, #[case] expected: &str) {
        let subject = action(vec!["--value".to_string()], nargs);
        assert_eq!(nargs_pattern(&subject), expected);
    }

    #[test]
    fn zero_arity_fragment() {
        let mut subject = action(vec!["--value".to_string()], None);
        subject.kind = ActionKind::StoreTrue;
        assert_eq!(nargs_pattern(&subject), "()");
    }

    #[test]
    fn sub_parsers_fragment() {
        let mut subject = action(Vec::default(), None);
        subject.kind = ActionKind::SubParsers(SubParsers {
            commands: Vec::default(),
            prog: None,
        });
        assert_eq!(nargs_pattern(&subject), "(-*A[-AO]*)");
    }
}
