use std::cmp;
use std::collections::HashSet;
use std::env;

use regex::Regex;

use crate::action::{Action, ActionKind};
use crate::constant::{COLUMNS_ENV, DEFAULT_WIDTH, INDENT_INCREMENT, MAX_HELP_POSITION, SUPPRESS};
use crate::container::ActionContainer;
use crate::model::Nargs;

/// The line width available to the formatter: the `COLUMNS` environment
/// hint minus a 2 column margin, else 78.
pub(crate) fn terminal_width() -> usize {
    env::var(COLUMNS_ENV)
        .ok()
        .and_then(|columns| columns.trim().parse::<usize>().ok())
        .map(|columns| columns.saturating_sub(2))
        .unwrap_or(DEFAULT_WIDTH)
}

/// The help formatter variants. They share the layout engine and differ only
/// in wrapping and default-annotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    /// Wrap everything.
    Default,
    /// Preserve the description and epilog verbatim.
    RawDescription,
    /// Preserve all help text verbatim.
    RawText,
    /// Append ` (default: …)` to help that does not mention `%default%`.
    ArgumentDefaults,
}

impl FormatterKind {
    /// Resolve a formatter by its conventional name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "HelpFormatter" => Some(FormatterKind::Default),
            "RawDescriptionHelpFormatter" => Some(FormatterKind::RawDescription),
            "RawTextHelpFormatter" => Some(FormatterKind::RawText),
            "ArgumentDefaultsHelpFormatter" => Some(FormatterKind::ArgumentDefaults),
            _ => None,
        }
    }

    fn raw_description(&self) -> bool {
        matches!(self, FormatterKind::RawDescription | FormatterKind::RawText)
    }

    fn raw_help(&self) -> bool {
        matches!(self, FormatterKind::RawText)
    }
}

struct ActionEntry {
    invocation: String,
    help: Option<String>,
    indent: usize,
    subactions: Vec<ActionEntry>,
}

enum Item {
    Text { text: String, indent: usize },
    Usage(String),
    Entry(ActionEntry),
    Section(Section),
}

struct Section {
    heading: Option<String>,
    indent: usize,
    items: Vec<Item>,
}

/// The help layout engine: a tree of sections buffering usage, text, and
/// argument rows, rendered depth-first with an emergent help column.
pub(crate) struct HelpFormatter {
    kind: FormatterKind,
    prog: String,
    width: usize,
    current_indent: usize,
    action_max_length: usize,
    root: Vec<Item>,
    stack: Vec<Section>,
}

impl HelpFormatter {
    pub(crate) fn new(kind: FormatterKind, prog: String, width: usize) -> Self {
        Self {
            kind,
            prog,
            width,
            current_indent: 0,
            action_max_length: 0,
            root: Vec::default(),
            stack: Vec::default(),
        }
    }

    fn push_item(&mut self, item: Item) {
        match self.stack.last_mut() {
            Some(section) => section.items.push(item),
            None => self.root.push(item),
        }
    }

    pub(crate) fn start_section(&mut self, heading: Option<String>) {
        let indent = self.current_indent;
        self.current_indent += INDENT_INCREMENT;
        self.stack.push(Section {
            heading,
            indent,
            items: Vec::default(),
        });
    }

    pub(crate) fn end_section(&mut self) {
        let section = self
            .stack
            .pop()
            .expect("internal error - end_section without a matching start_section");
        self.current_indent -= INDENT_INCREMENT;
        self.push_item(Item::Section(section));
    }

    pub(crate) fn add_text(&mut self, text: Option<&str>) {
        match text {
            Some(text) if text != SUPPRESS => {
                let text = text.replace("%program%", &self.prog);
                let indent = self.current_indent;
                self.push_item(Item::Text { text, indent });
            }
            _ => {}
        }
    }

    pub(crate) fn add_usage(&mut self, usage: Option<&str>, container: &ActionContainer) {
        let rendered = self.format_usage_string(usage, container);
        self.push_item(Item::Usage(rendered));
    }

    pub(crate) fn add_argument(&mut self, action: &Action) {
        if action.hidden() {
            return;
        }

        let invocation = self.format_action_invocation(action);
        let mut subactions = Vec::default();
        if let ActionKind::SubParsers(sub_parsers) = &action.kind {
            for command in &sub_parsers.commands {
                subactions.push(ActionEntry {
                    invocation: command.name.clone(),
                    help: command.help.clone(),
                    indent: self.current_indent + INDENT_INCREMENT,
                    subactions: Vec::default(),
                });
            }
        }

        let mut invocation_length = invocation.chars().count();
        for subaction in &subactions {
            invocation_length = cmp::max(invocation_length, subaction.invocation.chars().count());
        }
        self.action_max_length = cmp::max(
            self.action_max_length,
            invocation_length + self.current_indent,
        );

        let entry = ActionEntry {
            invocation,
            help: self.expand_help(action),
            indent: self.current_indent,
            subactions,
        };
        self.push_item(Item::Entry(entry));
    }

    pub(crate) fn add_arguments(&mut self, members: &[usize], container: &ActionContainer) {
        for index in members {
            self.add_argument(&container.actions[*index]);
        }
    }

    /// Render the buffered tree: depth-first, with triple line breaks
    /// collapsed and the outer ones stripped.
    pub(crate) fn format_help(mut self) -> String {
        while !self.stack.is_empty() {
            self.end_section();
        }
        let rendered = self.render_items(&self.root);
        let long_breaks =
            Regex::new(r"\n\n\n+").expect("internal error - the break pattern must compile");
        let collapsed = long_breaks.replace_all(&rendered, "\n\n");
        format!("{}\n", collapsed.trim_matches('\n'))
    }

    fn render_items(&self, items: &[Item]) -> String {
        items.iter().map(|item| self.render_item(item)).collect()
    }

    fn render_item(&self, item: &Item) -> String {
        match item {
            Item::Usage(rendered) => rendered.clone(),
            Item::Text { text, indent } => self.format_text(text, *indent),
            Item::Entry(entry) => self.format_action(entry),
            Item::Section(section) => {
                let inner = self.render_items(&section.items);
                if inner.is_empty() {
                    return String::default();
                }
                match &section.heading {
                    Some(heading) if heading != SUPPRESS => format!(
                        "\n{:indent$}{heading}:\n{inner}\n",
                        "",
                        indent = section.indent
                    ),
                    _ => format!("\n{inner}\n"),
                }
            }
        }
    }

    fn format_text(&self, text: &str, indent: usize) -> String {
        let text_width = cmp::max(self.width.saturating_sub(indent), 11);
        let pad = " ".repeat(indent);

        let filled = if self.kind.raw_description() {
            text.lines()
                .map(|line| format!("{pad}{line}"))
                .collect::<Vec<String>>()
                .join("\n")
        } else {
            let collapsed = text.split_whitespace().collect::<Vec<&str>>().join(" ");
            chunk(&collapsed, text_width)
                .into_iter()
                .map(|line| format!("{pad}{line}"))
                .collect::<Vec<String>>()
                .join("\n")
        };

        format!("{filled}\n\n")
    }

    /// One argument row: header in the first column, help inlined when the
    /// header fits, broken onto the next line otherwise.
    fn format_action(&self, entry: &ActionEntry) -> String {
        let help_position = cmp::min(self.action_max_length + 2, MAX_HELP_POSITION);
        let help_width = cmp::max(self.width.saturating_sub(help_position), 11);
        let action_width = help_position.saturating_sub(entry.indent + 2);

        let has_help = entry
            .help
            .as_ref()
            .map(|help| !help.trim().is_empty())
            .unwrap_or(false);

        let mut parts = String::default();
        let mut indent_first = 0;

        if !has_help {
            parts.push_str(&format!(
                "{:indent$}{}\n",
                "",
                entry.invocation,
                indent = entry.indent
            ));
        } else if entry.invocation.chars().count() <= action_width {
            parts.push_str(&format!(
                "{:indent$}{:<action_width$}  ",
                "",
                entry.invocation,
                indent = entry.indent
            ));
        } else {
            parts.push_str(&format!(
                "{:indent$}{}\n",
                "",
                entry.invocation,
                indent = entry.indent
            ));
            indent_first = help_position;
        }

        if has_help {
            let help = entry
                .help
                .as_ref()
                .expect("internal error - has_help guards the access");
            let lines = self.split_lines(help, help_width);
            match lines.split_first() {
                Some((first, rest)) => {
                    parts.push_str(&format!("{:indent_first$}{first}\n", ""));
                    for line in rest {
                        parts.push_str(&format!("{:help_position$}{line}\n", ""));
                    }
                }
                None => parts.push('\n'),
            }
        }

        for subaction in &entry.subactions {
            parts.push_str(&self.format_action(subaction));
        }

        parts
    }

    fn split_lines(&self, text: &str, width: usize) -> Vec<String> {
        if self.kind.raw_help() {
            text.lines().map(String::from).collect()
        } else {
            let collapsed = text.split_whitespace().collect::<Vec<&str>>().join(" ");
            chunk(&collapsed, width)
        }
    }

    fn format_action_invocation(&self, action: &Action) -> String {
        if action.is_positional() {
            return self.metavar_for(action);
        }

        let args = self.format_args(action);
        if args.is_empty() {
            action.option_strings.join(", ")
        } else {
            action
                .option_strings
                .iter()
                .map(|option_string| format!("{option_string} {args}"))
                .collect::<Vec<String>>()
                .join(", ")
        }
    }

    /// Metavar resolution: explicit wins, else the choice set, else the
    /// destination (upper-cased for optionals).
    fn metavar_for(&self, action: &Action) -> String {
        if let Some(metavar) = &action.metavar {
            return metavar.clone();
        }
        if let Some(choices) = &action.choices {
            let rendered: Vec<String> = choices.iter().map(|choice| choice.to_string()).collect();
            return format!("{{{}}}", rendered.join(","));
        }
        if let ActionKind::SubParsers(sub_parsers) = &action.kind {
            return format!("{{{}}}", sub_parsers.names().join(","));
        }
        if action.is_positional() {
            action.dest.clone()
        } else {
            action.dest.to_ascii_uppercase()
        }
    }

    fn format_args(&self, action: &Action) -> String {
        let metavar = self.metavar_for(action);
        match action.effective_nargs() {
            None => metavar,
            Some(Nargs::Optional) => format!("[{metavar}]"),
            Some(Nargs::Any) => format!("[{metavar} [{metavar} ...]]"),
            Some(Nargs::AtLeastOne) => format!("{metavar} [{metavar} ...]"),
            Some(Nargs::Remainder) => "...".to_string(),
            Some(Nargs::Parser) => format!("{metavar} ..."),
            Some(Nargs::Exactly(0)) => String::default(),
            Some(Nargs::Exactly(n)) => vec![metavar; n].join(" "),
        }
    }

    /// `%name%` interpolation over the action's attributes plus the program
    /// name; SUPPRESS-valued attributes are dropped from the table.
    fn expand_help(&self, action: &Action) -> Option<String> {
        let mut help = action.help.clone()?;

        if matches!(self.kind, FormatterKind::ArgumentDefaults)
            && !help.contains("%default%")
            && !action.default.is_suppress()
        {
            // Defaults only take effect for optionals and for positionals
            // with the ?/* arities.
            let defaulting = !action.is_positional()
                || matches!(
                    action.effective_nargs(),
                    Some(Nargs::Optional) | Some(Nargs::Any)
                );
            if defaulting {
                help.push_str(" (default: %default%)");
            }
        }

        let mut table: Vec<(&str, String)> = vec![("program", self.prog.clone())];
        if action.dest != SUPPRESS {
            table.push(("dest", action.dest.clone()));
        }
        if !action.default.is_suppress() {
            table.push(("default", action.default.to_string()));
        }
        if let Some(constant) = &action.constant {
            if !constant.is_suppress() {
                table.push(("const", constant.to_string()));
            }
        }
        if let Some(nargs) = action.effective_nargs() {
            table.push(("nargs", nargs.to_string()));
        }
        if let Some(choices) = &action.choices {
            let rendered: Vec<String> = choices.iter().map(|choice| choice.to_string()).collect();
            table.push(("choices", rendered.join(", ")));
        }
        if let Some(metavar) = &action.metavar {
            table.push(("metavar", metavar.clone()));
        }
        table.push(("type", action.type_.name().to_string()));

        for (name, value) in table {
            help = help.replace(&format!("%{name}%"), &value);
        }
        Some(help)
    }

    fn format_usage_string(&self, usage: Option<&str>, container: &ActionContainer) -> String {
        let prefix = "usage: ";

        if let Some(usage) = usage {
            return format!("{prefix}{}\n\n", usage.replace("%program%", &self.prog));
        }

        let opt_usage = self.actions_usage(container, &container.optionals());
        let pos_usage = self.actions_usage(container, &container.positionals());
        let mut pieces = vec![self.prog.clone()];
        if !opt_usage.is_empty() {
            pieces.push(opt_usage.clone());
        }
        if !pos_usage.is_empty() {
            pieces.push(pos_usage.clone());
        }
        let mut usage_line = pieces.join(" ");

        let text_width = self.width.saturating_sub(self.current_indent);
        if prefix.len() + usage_line.chars().count() > text_width {
            // Split into wrappable parts: bracketed clusters or bare words.
            let part_matcher = Regex::new(r"\(.*?\)+|\[.*?\]+|\S+")
                .expect("internal error - the part pattern must compile");
            let opt_parts: Vec<String> = part_matcher
                .find_iter(&opt_usage)
                .map(|m| m.as_str().to_string())
                .collect();
            let pos_parts: Vec<String> = part_matcher
                .find_iter(&pos_usage)
                .map(|m| m.as_str().to_string())
                .collect();

            let prog_length = self.prog.chars().count();
            let lines = if prefix.len() + prog_length <= (0.75 * text_width as f64) as usize {
                // Short prog: continuation lines align after the prog.
                let indent = " ".repeat(prefix.len() + prog_length + 1);
                if !opt_parts.is_empty() {
                    let mut head = vec![self.prog.clone()];
                    head.extend(opt_parts);
                    let mut lines = get_lines(&head, &indent, Some(prefix), text_width);
                    lines.extend(get_lines(&pos_parts, &indent, None, text_width));
                    lines
                } else if !pos_parts.is_empty() {
                    let mut head = vec![self.prog.clone()];
                    head.extend(pos_parts);
                    get_lines(&head, &indent, Some(prefix), text_width)
                } else {
                    vec![self.prog.clone()]
                }
            } else {
                // Long prog: it occupies its own line.
                let indent = " ".repeat(prefix.len());
                let mut lines = get_lines(&opt_parts, &indent, None, text_width);
                lines.extend(get_lines(&pos_parts, &indent, None, text_width));
                let mut all = vec![self.prog.clone()];
                all.extend(lines);
                all
            };
            usage_line = lines.join("\n");
        }

        format!("{prefix}{usage_line}\n\n")
    }

    fn actions_usage(&self, container: &ActionContainer, indices: &[usize]) -> String {
        let mut parts: Vec<String> = Vec::default();
        let mut handled: HashSet<usize> = HashSet::default();

        for index in indices {
            let action = &container.actions[*index];
            match container.mutex_of(*index) {
                Some(mutex) => {
                    if !handled.insert(mutex) {
                        continue;
                    }
                    let group = &container.mutex_groups[mutex];
                    let visible: Vec<&Action> = group
                        .members
                        .iter()
                        .map(|member| &container.actions[*member])
                        .filter(|member| !member.hidden())
                        .collect();
                    if visible.is_empty() {
                        continue;
                    }
                    let inner: Vec<String> = visible
                        .iter()
                        .map(|member| self.action_usage_part(member, true))
                        .collect();
                    let joined = inner.join(" | ");
                    parts.push(if group.required {
                        format!("({joined})")
                    } else {
                        format!("[{joined}]")
                    });
                }
                None => {
                    if action.hidden() {
                        continue;
                    }
                    parts.push(self.action_usage_part(action, false));
                }
            }
        }

        parts.join(" ")
    }

    fn action_usage_part(&self, action: &Action, grouped: bool) -> String {
        if action.is_positional() {
            return self.format_args(action);
        }

        let args = self.format_args(action);
        let option_string = &action.option_strings[0];
        let part = if args.is_empty() {
            option_string.clone()
        } else {
            format!("{option_string} {args}")
        };

        if action.required || grouped {
            part
        } else {
            format!("[{part}]")
        }
    }
}

fn get_lines(parts: &[String], indent: &str, prefix: Option<&str>, text_width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::default();
    let mut line: Vec<&str> = Vec::default();
    let mut line_length = prefix
        .map(|p| p.len())
        .unwrap_or(indent.len())
        .saturating_sub(1);

    for part in parts {
        if line_length + 1 + part.chars().count() > text_width && !line.is_empty() {
            lines.push(format!("{indent}{}", line.join(" ")));
            line.clear();
            line_length = indent.len().saturating_sub(1);
        }
        line.push(part);
        line_length += 1 + part.chars().count();
    }

    if !line.is_empty() {
        lines.push(format!("{indent}{}", line.join(" ")));
    }

    if prefix.is_some() {
        if let Some(first) = lines.first_mut() {
            *first = first[indent.len()..].to_string();
        }
    }

    lines
}

fn chunk(paragraph: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::default();
    let mut current = String::default();

    for word in paragraph.split(' ') {
        if !word.is_empty() {
            if current.is_empty() {
                hyphenate(width, &mut lines, &mut current, word);
            } else if current.chars().count() + word.chars().count() + 1 <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(current);
                current = String::default();
                hyphenate(width, &mut lines, &mut current, word);
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

// Break a word longer than the width, marking each break with a hyphen.
fn hyphenate(width: usize, lines: &mut Vec<String>, current: &mut String, word: &str) {
    let characters: Vec<char> = word.chars().collect();
    let increment = cmp::max(width.saturating_sub(1), 1);
    let mut left = 0;

    while left + increment < characters.len() {
        let segment: String = characters[left..left + increment].iter().collect();
        lines.push(format!("{segment}-"));
        left += increment;
    }

    current.push_str(&characters[left..].iter().collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Arg;
    use crate::container::{ActionContainer, ConflictHandler};
    use crate::model::{ArgType, Value};
    use crate::test::assert_contains;
    use rstest::rstest;

    fn container() -> ActionContainer {
        ActionContainer::new("-".to_string(), ConflictHandler::Error, None)
    }

    fn formatter(width: usize) -> HelpFormatter {
        HelpFormatter::new(FormatterKind::Default, "program".to_string(), width)
    }

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn usage_single_line() {
        // Setup
        let mut subject = container();
        subject
            .add_argument(tokens(&["-f", "--flag"]), Arg::store_true(), None, None)
            .unwrap();
        subject
            .add_argument(
                tokens(&["item"]),
                Arg::store().nargs(Nargs::Any),
                None,
                None,
            )
            .unwrap();

        // Execute
        let mut help_formatter = formatter(78);
        help_formatter.add_usage(None, &subject);
        let usage = help_formatter.format_help();

        // Verify
        assert_eq!(usage, "usage: program [-f] [item [item ...]]\n");
    }

    #[test]
    fn usage_override() {
        let subject = container();
        let mut help_formatter = formatter(78);
        help_formatter.add_usage(Some("%program% <anything goes>"), &subject);
        assert_eq!(
            help_formatter.format_help(),
            "usage: program <anything goes>\n"
        );
    }

    #[test]
    fn usage_wraps_with_short_prog() {
        // Setup
        let mut subject = container();
        subject
            .add_argument(tokens(&["--aaa"]), Arg::store_true(), None, None)
            .unwrap();
        subject
            .add_argument(tokens(&["--bbb"]), Arg::store_true(), None, None)
            .unwrap();

        // Execute
        let mut help_formatter = HelpFormatter::new(FormatterKind::Default, "p".to_string(), 15);
        help_formatter.add_usage(None, &subject);
        let usage = help_formatter.format_help();

        // Verify
        assert_eq!(
            usage,
            "usage: p\n         [--aaa]\n         [--bbb]\n"
        );
    }

    #[test]
    fn usage_wraps_with_long_prog() {
        // Setup
        let mut subject = container();
        subject
            .add_argument(tokens(&["--aaa"]), Arg::store_true(), None, None)
            .unwrap();

        // Execute
        let mut help_formatter =
            HelpFormatter::new(FormatterKind::Default, "quite-a-long-program".to_string(), 20);
        help_formatter.add_usage(None, &subject);
        let usage = help_formatter.format_help();

        // Verify
        // The prog exceeds 0.75 of the width, so it takes its own line.
        assert_eq!(usage, "usage: quite-a-long-program\n       [--aaa]\n");
    }

    #[rstest]
    #[case(None, "V")]
    #[case(Some(Nargs::Optional), "[V]")]
    #[case(Some(Nargs::Any), "[V [V ...]]")]
    #[case(Some(Nargs::AtLeastOne), "V [V ...]")]
    #[case(Some(Nargs::Remainder), "...")]
    #[case(Some(Nargs::Parser), "V ...")]
    #[case(Some(Nargs::Exactly(3)), "V V V")]
    fn args_rendering(#[case] nargs: Option<Nargs>, #[case] expected: &str) {
        // Setup
        let mut subject = container();
        let index = subject
            .add_argument(
                tokens(&["--value"]),
                match nargs {
                    Some(nargs) => Arg::store().nargs(nargs).metavar("V"),
                    None => Arg::store().metavar("V"),
                },
                None,
                None,
            )
            .unwrap();

        // Execute & verify
        let help_formatter = formatter(78);
        assert_eq!(
            help_formatter.format_args(&subject.actions[index]),
            expected
        );
    }

    #[test]
    fn metavar_resolution() {
        let mut subject = container();
        let explicit = subject
            .add_argument(tokens(&["--alpha"]), Arg::store().metavar("A"), None, None)
            .unwrap();
        let chosen = subject
            .add_argument(
                tokens(&["--beta"]),
                Arg::store().choices([Value::Str("x".to_string()), Value::Str("y".to_string())]),
                None,
                None,
            )
            .unwrap();
        let optional = subject
            .add_argument(tokens(&["--gamma-ray"]), Arg::store(), None, None)
            .unwrap();
        let positional = subject
            .add_argument(tokens(&["delta"]), Arg::store(), None, None)
            .unwrap();

        let help_formatter = formatter(78);
        assert_eq!(help_formatter.metavar_for(&subject.actions[explicit]), "A");
        assert_eq!(
            help_formatter.metavar_for(&subject.actions[chosen]),
            "{x,y}"
        );
        assert_eq!(
            help_formatter.metavar_for(&subject.actions[optional]),
            "GAMMA_RAY"
        );
        assert_eq!(
            help_formatter.metavar_for(&subject.actions[positional]),
            "delta"
        );
    }

    #[test]
    fn invocation_rendering() {
        let mut subject = container();
        let flag = subject
            .add_argument(tokens(&["-f", "--flag"]), Arg::store_true(), None, None)
            .unwrap();
        let value = subject
            .add_argument(tokens(&["-v", "--value"]), Arg::store(), None, None)
            .unwrap();
        let positional = subject
            .add_argument(tokens(&["item"]), Arg::store(), None, None)
            .unwrap();

        let help_formatter = formatter(78);
        assert_eq!(
            help_formatter.format_action_invocation(&subject.actions[flag]),
            "-f, --flag"
        );
        assert_eq!(
            help_formatter.format_action_invocation(&subject.actions[value]),
            "-v VALUE, --value VALUE"
        );
        assert_eq!(
            help_formatter.format_action_invocation(&subject.actions[positional]),
            "item"
        );
    }

    #[test]
    fn action_row_inline_and_broken() {
        // Setup
        let mut subject = container();
        subject
            .add_argument(
                tokens(&["-s"]),
                Arg::store_true().help("short header"),
                None,
                None,
            )
            .unwrap();
        subject
            .add_argument(
                tokens(&["--quite-a-long-option-string-here"]),
                Arg::store_true().help("long header"),
                None,
                None,
            )
            .unwrap();

        // Execute
        let mut help_formatter = formatter(78);
        help_formatter.start_section(Some("options".to_string()));
        help_formatter.add_arguments(&[0, 1], &subject);
        help_formatter.end_section();
        let help = help_formatter.format_help();

        // Verify
        // The short header inlines its help; the long one breaks the line.
        assert_contains!(help, "  -s ");
        assert_contains!(help, "short header\n");
        assert_contains!(
            help,
            "  --quite-a-long-option-string-here\n"
        );
        assert_contains!(help, "                        long header");
    }

    #[test]
    fn hidden_actions_skipped() {
        let mut subject = container();
        subject
            .add_argument(
                tokens(&["--visible"]),
                Arg::store_true().help("shown"),
                None,
                None,
            )
            .unwrap();
        subject
            .add_argument(
                tokens(&["--hidden"]),
                Arg::store_true().help(SUPPRESS),
                None,
                None,
            )
            .unwrap();

        let mut help_formatter = formatter(78);
        help_formatter.add_usage(None, &subject);
        help_formatter.start_section(Some("options".to_string()));
        help_formatter.add_arguments(&[0, 1], &subject);
        help_formatter.end_section();
        let help = help_formatter.format_help();

        assert_contains!(help, "--visible");
        assert!(!help.contains("--hidden"), "'{help}' shows --hidden");
    }

    #[test]
    fn mutex_groups_in_usage() {
        // Setup
        let mut subject = container();
        subject.mutex_groups.push(crate::container::MutexGroup {
            required: false,
            members: Vec::default(),
        });
        subject.mutex_groups.push(crate::container::MutexGroup {
            required: true,
            members: Vec::default(),
        });
        subject
            .add_argument(tokens(&["-a"]), Arg::store_true(), None, Some(0))
            .unwrap();
        subject
            .add_argument(tokens(&["-b"]), Arg::store_true(), None, Some(0))
            .unwrap();
        subject
            .add_argument(tokens(&["-x"]), Arg::store_true(), None, Some(1))
            .unwrap();
        subject
            .add_argument(tokens(&["-y"]), Arg::store_true(), None, Some(1))
            .unwrap();

        // Execute
        let mut help_formatter = formatter(78);
        help_formatter.add_usage(None, &subject);
        let usage = help_formatter.format_help();

        // Verify
        assert_eq!(usage, "usage: program [-a | -b] (-x | -y)\n");
    }

    #[test]
    fn mutex_hidden_member_suppresses_separator() {
        // Setup
        let mut subject = container();
        subject.mutex_groups.push(crate::container::MutexGroup {
            required: false,
            members: Vec::default(),
        });
        subject
            .add_argument(tokens(&["-a"]), Arg::store_true(), None, Some(0))
            .unwrap();
        subject
            .add_argument(
                tokens(&["-b"]),
                Arg::store_true().help(SUPPRESS),
                None,
                Some(0),
            )
            .unwrap();
        subject
            .add_argument(tokens(&["-c"]), Arg::store_true(), None, Some(0))
            .unwrap();

        // Execute
        let mut help_formatter = formatter(78);
        help_formatter.add_usage(None, &subject);
        let usage = help_formatter.format_help();

        // Verify
        assert_eq!(usage, "usage: program [-a | -c]\n");
    }

    #[test]
    fn help_interpolation() {
        // Setup
        let mut subject = container();
        let index = subject
            .add_argument(
                tokens(&["--level"]),
                Arg::store()
                    .type_(ArgType::Int)
                    .default(Value::Int(3))
                    .choices([Value::Int(1), Value::Int(2), Value::Int(3)])
                    .help("level for %program% (one of %choices%; default %default%)"),
                None,
                None,
            )
            .unwrap();

        // Execute
        let help_formatter = formatter(78);
        let help = help_formatter.expand_help(&subject.actions[index]).unwrap();

        // Verify
        assert_eq!(help, "level for program (one of 1, 2, 3; default 3)");
    }

    #[test]
    fn argument_defaults_formatter_appends() {
        // Setup
        let mut subject = container();
        let with_help = subject
            .add_argument(
                tokens(&["--level"]),
                Arg::store().default(Value::Int(3)).help("the level"),
                None,
                None,
            )
            .unwrap();
        let already_mentioned = subject
            .add_argument(
                tokens(&["--other"]),
                Arg::store()
                    .default(Value::Int(4))
                    .help("uses %default% already"),
                None,
                None,
            )
            .unwrap();
        let fixed_positional = subject
            .add_argument(
                tokens(&["item"]),
                Arg::store().help("an item"),
                None,
                None,
            )
            .unwrap();

        let help_formatter =
            HelpFormatter::new(FormatterKind::ArgumentDefaults, "program".to_string(), 78);

        // Execute & verify
        assert_eq!(
            help_formatter.expand_help(&subject.actions[with_help]),
            Some("the level (default: 3)".to_string())
        );
        assert_eq!(
            help_formatter.expand_help(&subject.actions[already_mentioned]),
            Some("uses 4 already".to_string())
        );
        // A fixed-arity positional always consumes values; no annotation.
        assert_eq!(
            help_formatter.expand_help(&subject.actions[fixed_positional]),
            Some("an item".to_string())
        );
    }

    #[test]
    fn raw_text_preserves_line_breaks() {
        let help_formatter =
            HelpFormatter::new(FormatterKind::RawText, "program".to_string(), 78);
        assert_eq!(
            help_formatter.split_lines("keep\n  these   lines", 40),
            vec!["keep".to_string(), "  these   lines".to_string()]
        );

        let default_formatter = formatter(78);
        assert_eq!(
            default_formatter.split_lines("keep\n  these   lines", 40),
            vec!["keep these lines".to_string()]
        );
    }

    #[test]
    fn long_breaks_collapse() {
        let mut help_formatter = formatter(78);
        help_formatter.add_text(Some("first"));
        help_formatter.add_text(Some("second"));
        help_formatter.start_section(Some("empty".to_string()));
        help_formatter.end_section();
        help_formatter.add_text(Some("third"));

        assert_eq!(
            help_formatter.format_help(),
            "first\n\nsecond\n\nthird\n"
        );
    }

    #[rstest]
    #[case("abc def", 10, vec!["abc def"])]
    #[case("abc def ghi", 7, vec!["abc def", "ghi"])]
    #[case("abcdefghij", 5, vec!["abcd-", "efgh-", "ij"])]
    fn chunk_wraps(#[case] text: &str, #[case] width: usize, #[case] expected: Vec<&str>) {
        assert_eq!(
            chunk(text, width),
            expected.into_iter().map(String::from).collect::<Vec<String>>()
        );
    }

    #[test]
    fn formatter_from_name() {
        assert_eq!(
            FormatterKind::from_name("HelpFormatter"),
            Some(FormatterKind::Default)
        );
        assert_eq!(
            FormatterKind::from_name("RawDescriptionHelpFormatter"),
            Some(FormatterKind::RawDescription)
        );
        assert_eq!(
            FormatterKind::from_name("RawTextHelpFormatter"),
            Some(FormatterKind::RawText)
        );
        assert_eq!(
            FormatterKind::from_name("ArgumentDefaultsHelpFormatter"),
            Some(FormatterKind::ArgumentDefaults)
        );
        assert_eq!(FormatterKind::from_name("Mystery"), None);
    }
}
