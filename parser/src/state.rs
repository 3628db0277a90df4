//! Character-cursor state machine over slash-command text.
//!
//! Parsing runs in two phases. [`ParsedCommand::match_binding`] walks the
//! binding tree one whitespace-delimited token at a time and stops at the
//! deepest binding whose label matches. Once the binding's form is known,
//! [`ParsedCommand::parse_form`] scans the remaining text into raw
//! [`Value`] tokens keyed by field name.
//!
//! Both transitions take the parsed command by value and hand it back, so a
//! speculative autocomplete parse never leaks into another one.

use std::collections::BTreeMap;
use std::sync::Arc;

use app_command_core::{Binding, Field, FieldType, Form, Value, find_binding};
use tracing::trace;

use crate::error::{ParseError, ParseErrorKind};

/// Whether the scanner may stop inside an unfinished token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Every token must be complete; running out of input inside one is an
    /// error.
    Execute,
    /// Running out of input stops the scan and keeps the partial token.
    Autocomplete,
}

/// Current state of the scanner.
///
/// States that are only reachable once a field has been selected carry the
/// index of that field in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseState {
    Start,
    Command,
    EndCommand,
    CommandSeparator,
    StartParameter,
    ParameterSeparator,
    Flag1,
    Flag,
    FlagValueSeparator { field: usize },
    StartValue { field: usize },
    NonspaceValue { field: usize },
    QuotedValue { field: usize },
    TickValue { field: usize },
    EndValue { field: usize },
    EndQuotedValue { field: usize },
    EndTickedValue { field: usize },
    MultiselectStart { field: usize },
    MultiselectNextValue { field: usize },
    MultiselectStartValue { field: usize },
    MultiselectNonspaceValue { field: usize },
    MultiselectQuotedValue { field: usize },
    MultiselectTickValue { field: usize },
    MultiselectEndValue { field: usize },
    MultiselectValueSeparator { field: usize },
    EndMultiselect { field: usize },
    Rest { field: usize },
    Error(ParseError),
}

impl ParseState {
    /// Index of the field the state belongs to.
    pub fn field(&self) -> Option<usize> {
        match self {
            Self::FlagValueSeparator { field }
            | Self::StartValue { field }
            | Self::NonspaceValue { field }
            | Self::QuotedValue { field }
            | Self::TickValue { field }
            | Self::EndValue { field }
            | Self::EndQuotedValue { field }
            | Self::EndTickedValue { field }
            | Self::MultiselectStart { field }
            | Self::MultiselectNextValue { field }
            | Self::MultiselectStartValue { field }
            | Self::MultiselectNonspaceValue { field }
            | Self::MultiselectQuotedValue { field }
            | Self::MultiselectTickValue { field }
            | Self::MultiselectEndValue { field }
            | Self::MultiselectValueSeparator { field }
            | Self::EndMultiselect { field }
            | Self::Rest { field } => Some(*field),
            _ => None,
        }
    }

    /// Quote character enclosing the current token, if any.
    pub fn delimiter(&self) -> Option<char> {
        match self {
            Self::QuotedValue { .. }
            | Self::EndQuotedValue { .. }
            | Self::MultiselectQuotedValue { .. } => Some('"'),
            Self::TickValue { .. }
            | Self::EndTickedValue { .. }
            | Self::MultiselectTickValue { .. } => Some('`'),
            _ => None,
        }
    }

    /// Returns `true` while a scalar value is being read.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Self::FlagValueSeparator { .. }
                | Self::StartValue { .. }
                | Self::NonspaceValue { .. }
                | Self::QuotedValue { .. }
                | Self::TickValue { .. }
                | Self::EndValue { .. }
                | Self::EndQuotedValue { .. }
                | Self::EndTickedValue { .. }
        )
    }

    /// Returns `true` while inside a bracketed list.
    pub fn is_list_element(&self) -> bool {
        matches!(
            self,
            Self::MultiselectStart { .. }
                | Self::MultiselectNextValue { .. }
                | Self::MultiselectStartValue { .. }
                | Self::MultiselectNonspaceValue { .. }
                | Self::MultiselectQuotedValue { .. }
                | Self::MultiselectTickValue { .. }
                | Self::MultiselectEndValue { .. }
                | Self::MultiselectValueSeparator { .. }
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

enum Step {
    Continue,
    Done,
    Fail(ParseErrorKind),
}

fn out_of_input(mode: ParseMode, kind: ParseErrorKind) -> Step {
    match mode {
        ParseMode::Autocomplete => Step::Done,
        ParseMode::Execute => Step::Fail(kind),
    }
}

fn bool_accepts(token: &str, mode: ParseMode) -> bool {
    match mode {
        ParseMode::Execute => token == "true" || token == "false",
        ParseMode::Autocomplete => "true".starts_with(token) || "false".starts_with(token),
    }
}

/// Working state of one parse.
///
/// Created fresh per invocation. Positions are character offsets into the
/// command text.
#[derive(Debug, Clone)]
pub struct ParsedCommand<'a> {
    state: ParseState,
    command: &'a str,
    chars: Vec<char>,
    cursor: usize,
    incomplete: String,
    incomplete_start: usize,
    app_id: String,
    location: String,
    binding: Option<&'a Binding>,
    candidates: &'a [Binding],
    form: Option<Arc<Form>>,
    positional_index: i32,
    values: BTreeMap<String, Value>,
}

impl<'a> ParsedCommand<'a> {
    pub fn new(command: &'a str) -> Self {
        Self {
            state: ParseState::Start,
            command,
            chars: command.chars().collect(),
            cursor: 0,
            incomplete: String::new(),
            incomplete_start: 0,
            app_id: String::new(),
            location: String::new(),
            binding: None,
            candidates: &[],
            form: None,
            positional_index: 0,
            values: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    pub fn command(&self) -> &'a str {
        self.command
    }

    /// Text of the token being read when the scan stopped.
    pub fn incomplete(&self) -> &str {
        &self.incomplete
    }

    /// Character offset where the incomplete token starts.
    pub fn incomplete_start(&self) -> usize {
        self.incomplete_start
    }

    /// Deepest binding matched so far.
    pub fn binding(&self) -> Option<&'a Binding> {
        self.binding
    }

    /// Bindings the next command token is matched against.
    pub fn candidates(&self) -> &'a [Binding] {
        self.candidates
    }

    pub fn form(&self) -> Option<&Arc<Form>> {
        self.form.as_ref()
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// App owning the matched binding, inherited from the closest ancestor
    /// that declares one.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Path of the matched binding, e.g. `/jira/issue/create`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Number of positional arguments consumed.
    pub fn positional_index(&self) -> i32 {
        self.positional_index
    }

    /// Field the current state belongs to.
    pub fn current_field(&self) -> Option<&Field> {
        let index = self.state.field()?;
        self.form.as_ref()?.fields.get(index)
    }

    pub fn error(&self) -> Option<&ParseError> {
        match &self.state {
            ParseState::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.state.is_error()
    }

    /// Converts an error state into `Err`.
    pub fn into_result(self) -> Result<Self, ParseError> {
        match self.state {
            ParseState::Error(err) => Err(err),
            _ => Ok(self),
        }
    }

    /// Command text up to (not including) the given character offset.
    pub fn text_before(&self, index: usize) -> String {
        self.chars[..index.min(self.chars.len())].iter().collect()
    }

    /// Attaches the form of the matched binding.
    pub fn with_form(mut self, form: Arc<Form>) -> Self {
        self.form = Some(form);
        self
    }

    /// Fails unless the matched binding is a leaf.
    pub fn require_leaf(self) -> Self {
        match self.binding {
            Some(binding) if !binding.is_leaf() && !self.is_error() => {
                let binding = binding.label.clone();
                self.fail(ParseErrorKind::MustSelectSubcommand { binding })
            }
            _ => self,
        }
    }

    fn fail(mut self, kind: ParseErrorKind) -> Self {
        self.state = ParseState::Error(ParseError {
            kind,
            position: self.cursor,
        });
        self
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.cursor).copied()
    }

    fn begin_token(&mut self) {
        self.incomplete.clear();
        self.incomplete_start = self.cursor;
    }

    fn enter(&mut self, binding: &'a Binding) {
        self.binding = Some(binding);
        if !binding.app_id.is_empty() {
            self.app_id.clone_from(&binding.app_id);
        }
        self.location.push('/');
        self.location.push_str(binding.location_segment());
        self.candidates = &binding.bindings;
        trace!(location = %self.location, "matched binding");
    }

    /// Resolves the deepest binding whose label chain prefixes the command.
    pub fn match_binding(mut self, bindings: &'a [Binding], mode: ParseMode) -> Self {
        if self.is_error() {
            return self;
        }
        if bindings.is_empty() {
            return self.fail(ParseErrorKind::NoBindings);
        }
        self.candidates = bindings;

        loop {
            let c = self.peek();
            let step = match self.state {
                ParseState::Start => {
                    if c == Some('/') {
                        self.cursor += 1;
                        self.begin_token();
                        self.state = ParseState::Command;
                        Step::Continue
                    } else {
                        Step::Fail(ParseErrorKind::NoSlashStart)
                    }
                }
                ParseState::Command => match c {
                    None if mode == ParseMode::Autocomplete => Step::Done,
                    None => {
                        self.state = ParseState::EndCommand;
                        Step::Continue
                    }
                    Some(ch) if ch.is_whitespace() => {
                        self.state = ParseState::EndCommand;
                        Step::Continue
                    }
                    Some(ch) => {
                        self.incomplete.push(ch);
                        self.cursor += 1;
                        Step::Continue
                    }
                },
                ParseState::EndCommand => {
                    let candidates = self.candidates;
                    match find_binding(candidates, &self.incomplete) {
                        Some(binding) => {
                            self.enter(binding);
                            self.state = ParseState::CommandSeparator;
                            Step::Continue
                        }
                        None => Step::Done,
                    }
                }
                ParseState::CommandSeparator => match c {
                    Some(ch) if ch.is_whitespace() => {
                        self.cursor += 1;
                        Step::Continue
                    }
                    None => {
                        self.begin_token();
                        self.state = ParseState::Command;
                        Step::Done
                    }
                    Some(_) => {
                        self.begin_token();
                        self.state = ParseState::Command;
                        Step::Continue
                    }
                },
                _ => Step::Done,
            };

            match step {
                Step::Continue => {}
                Step::Done => break,
                Step::Fail(kind) => return self.fail(kind),
            }
        }

        let typing_first_token = mode == ParseMode::Autocomplete && self.state == ParseState::Command;
        if self.binding.is_none() && !typing_first_token {
            let command = self.incomplete.clone();
            return self.fail(ParseErrorKind::NoMatchingBinding { command });
        }
        self
    }

    /// Scans the parameters following the matched binding into raw values.
    ///
    /// Does nothing when the command is already in error or no form is
    /// attached.
    pub fn parse_form(mut self, mode: ParseMode) -> Self {
        if self.is_error() {
            return self;
        }
        let Some(form) = self.form.clone() else {
            return self;
        };

        self.state = ParseState::StartParameter;
        self.cursor = self.incomplete_start;
        self.incomplete.clear();
        let mut equals_used = false;

        loop {
            let c = self.peek();
            let step = match self.state.clone() {
                ParseState::StartParameter => self.start_parameter(&form, c),
                ParseState::ParameterSeparator => {
                    self.incomplete_start = self.cursor;
                    match c {
                        None => {
                            self.state = ParseState::StartParameter;
                            Step::Done
                        }
                        Some(ch) if ch.is_whitespace() => {
                            self.cursor += 1;
                            Step::Continue
                        }
                        Some(_) => {
                            self.state = ParseState::StartParameter;
                            Step::Continue
                        }
                    }
                }
                ParseState::Flag1 => {
                    if c == Some('-') {
                        self.cursor += 1;
                    }
                    self.begin_token();
                    self.state = ParseState::Flag;
                    equals_used = false;
                    Step::Continue
                }
                ParseState::Flag => match c {
                    None if mode == ParseMode::Autocomplete => Step::Done,
                    None | Some('=') => self.end_flag(&form),
                    Some(ch) if ch.is_whitespace() => self.end_flag(&form),
                    Some(ch) => {
                        self.incomplete.push(ch);
                        self.cursor += 1;
                        Step::Continue
                    }
                },
                ParseState::FlagValueSeparator { field } => {
                    self.incomplete_start = self.cursor;
                    match c {
                        None if mode == ParseMode::Autocomplete => Step::Done,
                        None => {
                            self.state = ParseState::StartValue { field };
                            Step::Continue
                        }
                        Some('=') if equals_used => Step::Fail(ParseErrorKind::MultipleEquals),
                        Some('=') => {
                            equals_used = true;
                            self.cursor += 1;
                            Step::Continue
                        }
                        Some(ch) if ch.is_whitespace() => {
                            self.cursor += 1;
                            Step::Continue
                        }
                        Some(_) => {
                            self.state = ParseState::StartValue { field };
                            Step::Continue
                        }
                    }
                }
                ParseState::StartValue { field } => {
                    self.begin_token();
                    match c {
                        Some('"') => {
                            self.cursor += 1;
                            self.state = ParseState::QuotedValue { field };
                            Step::Continue
                        }
                        Some('`') => {
                            self.cursor += 1;
                            self.state = ParseState::TickValue { field };
                            Step::Continue
                        }
                        Some('[') if form.fields[field].multiselect => {
                            self.values
                                .insert(form.fields[field].name.clone(), Value::List(Vec::new()));
                            self.cursor += 1;
                            self.state = ParseState::MultiselectStart { field };
                            Step::Continue
                        }
                        Some(ch) if ch.is_whitespace() => {
                            Step::Fail(ParseErrorKind::UnexpectedCharacter { character: ch })
                        }
                        _ => {
                            self.state = ParseState::NonspaceValue { field };
                            Step::Continue
                        }
                    }
                }
                ParseState::NonspaceValue { field } => match c {
                    Some(ch) if !ch.is_whitespace() => {
                        self.incomplete.push(ch);
                        self.cursor += 1;
                        Step::Continue
                    }
                    _ => {
                        self.state = ParseState::EndValue { field };
                        Step::Continue
                    }
                },
                ParseState::QuotedValue { field } => {
                    self.quoted(c, '"', mode, ParseState::EndQuotedValue { field })
                }
                ParseState::TickValue { field } => {
                    self.quoted(c, '`', mode, ParseState::EndTickedValue { field })
                }
                ParseState::EndValue { field } => self.end_value(&form.fields[field], c, mode, false),
                ParseState::EndQuotedValue { field } | ParseState::EndTickedValue { field } => {
                    self.end_value(&form.fields[field], c, mode, true)
                }
                ParseState::MultiselectStart { field } | ParseState::MultiselectNextValue { field } => {
                    let after_comma = matches!(self.state, ParseState::MultiselectNextValue { .. });
                    match c {
                        None => {
                            self.begin_token();
                            out_of_input(mode, ParseErrorKind::MissingListEnd)
                        }
                        Some(ch) if ch.is_whitespace() => {
                            self.cursor += 1;
                            Step::Continue
                        }
                        Some(']') | Some(',') if after_comma => Step::Fail(ParseErrorKind::EmptyValue),
                        Some(']') => {
                            self.cursor += 1;
                            self.state = ParseState::EndMultiselect { field };
                            Step::Continue
                        }
                        Some(_) => {
                            self.state = ParseState::MultiselectStartValue { field };
                            Step::Continue
                        }
                    }
                }
                ParseState::MultiselectStartValue { field } => {
                    self.begin_token();
                    match c {
                        Some('"') => {
                            self.cursor += 1;
                            self.state = ParseState::MultiselectQuotedValue { field };
                            Step::Continue
                        }
                        Some('`') => {
                            self.cursor += 1;
                            self.state = ParseState::MultiselectTickValue { field };
                            Step::Continue
                        }
                        Some(',') | Some(']') => Step::Fail(ParseErrorKind::EmptyValue),
                        _ => {
                            self.state = ParseState::MultiselectNonspaceValue { field };
                            Step::Continue
                        }
                    }
                }
                ParseState::MultiselectNonspaceValue { field } => match c {
                    None => out_of_input(mode, ParseErrorKind::MissingListEnd),
                    Some(ch) if ch.is_whitespace() || ch == ',' || ch == ']' => {
                        self.state = ParseState::MultiselectEndValue { field };
                        Step::Continue
                    }
                    Some(ch @ ('[' | '"' | '`')) => {
                        Step::Fail(ParseErrorKind::UnexpectedCharacter { character: ch })
                    }
                    Some(ch) => {
                        self.incomplete.push(ch);
                        self.cursor += 1;
                        Step::Continue
                    }
                },
                ParseState::MultiselectQuotedValue { field } => {
                    self.quoted(c, '"', mode, ParseState::MultiselectEndValue { field })
                }
                ParseState::MultiselectTickValue { field } => {
                    self.quoted(c, '`', mode, ParseState::MultiselectEndValue { field })
                }
                ParseState::MultiselectEndValue { field } => {
                    let token = std::mem::take(&mut self.incomplete);
                    if let Some(Value::List(items)) = self.values.get_mut(&form.fields[field].name) {
                        items.push(token);
                    }
                    self.state = ParseState::MultiselectValueSeparator { field };
                    Step::Continue
                }
                ParseState::MultiselectValueSeparator { field } => match c {
                    None => {
                        self.begin_token();
                        out_of_input(mode, ParseErrorKind::MissingListEnd)
                    }
                    Some(ch) if ch.is_whitespace() => {
                        self.cursor += 1;
                        Step::Continue
                    }
                    Some(',') => {
                        self.cursor += 1;
                        self.state = ParseState::MultiselectNextValue { field };
                        Step::Continue
                    }
                    Some(']') => {
                        self.cursor += 1;
                        self.state = ParseState::EndMultiselect { field };
                        Step::Continue
                    }
                    Some(ch) => Step::Fail(ParseErrorKind::UnexpectedCharacter { character: ch }),
                },
                ParseState::EndMultiselect { .. } => {
                    self.begin_token();
                    match c {
                        None => Step::Done,
                        Some(ch) if ch.is_whitespace() => {
                            self.state = ParseState::ParameterSeparator;
                            Step::Continue
                        }
                        Some(ch) => Step::Fail(ParseErrorKind::UnexpectedCharacter { character: ch }),
                    }
                }
                ParseState::Rest { field } => {
                    let rest: String = self.chars[self.cursor..].iter().collect();
                    self.cursor = self.chars.len();
                    self.incomplete.clone_from(&rest);
                    let field = &form.fields[field];
                    let value = if field.multiselect {
                        Value::List(vec![rest])
                    } else {
                        Value::Scalar(rest)
                    };
                    self.values.insert(field.name.clone(), value);
                    Step::Done
                }
                ParseState::Start
                | ParseState::Command
                | ParseState::EndCommand
                | ParseState::CommandSeparator
                | ParseState::Error(_) => Step::Done,
            };

            match step {
                Step::Continue => {}
                Step::Done => return self,
                Step::Fail(kind) => return self.fail(kind),
            }
        }
    }

    fn start_parameter(&mut self, form: &Form, c: Option<char>) -> Step {
        match c {
            None => {
                self.begin_token();
                Step::Done
            }
            Some('-') => {
                self.cursor += 1;
                self.state = ParseState::Flag1;
                Step::Continue
            }
            Some(_) => {
                self.positional_index += 1;
                let position = self.positional_index;
                if let Some(field) = form.fields.iter().position(|f| f.position == position) {
                    self.state = ParseState::StartValue { field };
                    return Step::Continue;
                }
                let rest = form
                    .fields
                    .iter()
                    .position(|f| f.is_rest() && !self.values.contains_key(&f.name));
                match rest {
                    Some(field) => {
                        self.begin_token();
                        self.state = ParseState::Rest { field };
                        Step::Continue
                    }
                    None => Step::Fail(ParseErrorKind::NoArgumentPosition {
                        position: position as usize,
                    }),
                }
            }
        }
    }

    fn end_flag(&mut self, form: &Form) -> Step {
        let name = self.incomplete.to_lowercase();
        match form
            .fields
            .iter()
            .position(|f| f.flag_name().to_lowercase() == name)
        {
            Some(field) => {
                self.incomplete.clear();
                self.state = ParseState::FlagValueSeparator { field };
                Step::Continue
            }
            None => Step::Fail(ParseErrorKind::UnexpectedFlag {
                flag: self.incomplete.clone(),
            }),
        }
    }

    // Inside double quotes a backslash makes the next character literal.
    // Ticks take everything verbatim.
    fn quoted(&mut self, c: Option<char>, delim: char, mode: ParseMode, end: ParseState) -> Step {
        let missing = if delim == '"' {
            ParseErrorKind::MissingQuote
        } else {
            ParseErrorKind::MissingTick
        };
        match c {
            None => out_of_input(mode, missing),
            Some(ch) if ch == delim => {
                if self.cursor == self.incomplete_start + 1 {
                    return Step::Fail(ParseErrorKind::EmptyValue);
                }
                self.cursor += 1;
                self.state = end;
                Step::Continue
            }
            Some('\\') if delim == '"' => match self.chars.get(self.cursor + 1) {
                Some(&next) => {
                    self.incomplete.push(next);
                    self.cursor += 2;
                    Step::Continue
                }
                None => {
                    self.cursor += 1;
                    out_of_input(mode, missing)
                }
            },
            Some(ch) => {
                self.incomplete.push(ch);
                self.cursor += 1;
                Step::Continue
            }
        }
    }

    fn end_value(&mut self, field: &Field, c: Option<char>, mode: ParseMode, quoted: bool) -> Step {
        if quoted {
            if let Some(ch) = c.filter(|ch| !ch.is_whitespace()) {
                return Step::Fail(ParseErrorKind::UnexpectedCharacter { character: ch });
            }
        }

        // A bool flag may omit its value: back up and rescan the token as the
        // next parameter.
        if field.field_type == FieldType::Bool && !bool_accepts(&self.incomplete, mode) {
            self.cursor = self.incomplete_start;
            self.values
                .insert(field.name.clone(), Value::Scalar("true".to_string()));
            self.incomplete.clear();
            self.state = ParseState::StartParameter;
            return Step::Continue;
        }

        if mode == ParseMode::Autocomplete && c.is_none() {
            return Step::Done;
        }
        if !quoted && self.incomplete.is_empty() {
            return Step::Fail(ParseErrorKind::MissingFieldValue {
                field: field.name.clone(),
            });
        }

        let token = std::mem::take(&mut self.incomplete);
        let value = if field.multiselect {
            Value::List(vec![token])
        } else {
            Value::Scalar(token)
        };
        self.values.insert(field.name.clone(), value);
        self.incomplete_start = self.cursor;

        if c.is_none() {
            return Step::Done;
        }
        self.state = ParseState::ParameterSeparator;
        Step::Continue
    }
}
