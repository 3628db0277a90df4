//! Error types for parsing, expansion and composition.
//!
//! Errors are structured data: a kind plus the parameters needed to render
//! a message. The `Display` impls give a plain English rendering; callers
//! that localize should match on [`ErrorKind`] instead.

use thiserror::Error;

/// Flat error classification across every failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoBindings,
    NoSlashStart,
    NoMatchingBinding,
    MustSelectSubcommand,
    NoArgumentPosition,
    UnexpectedFlag,
    MultipleEquals,
    MissingQuote,
    MissingTick,
    EmptyValue,
    UnexpectedCharacter,
    MissingListEnd,
    MissingFieldValue,
    UnknownOption,
    UnknownUser,
    UnknownChannel,
    DuplicateOption,
    DuplicateUser,
    DuplicateChannel,
    InvalidBool,
    LookupFailed,
    RequiredFieldsMissing,
    FormFetch,
    MissingCall,
}

/// Grammar errors raised by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("no command bindings")]
    NoBindings,
    #[error("command must start with a `/`")]
    NoSlashStart,
    #[error("`{command}`: no match")]
    NoMatchingBinding { command: String },
    #[error("`{binding}` requires a subcommand")]
    MustSelectSubcommand { binding: String },
    #[error("command does not accept {position} positional arguments")]
    NoArgumentPosition { position: usize },
    #[error("command does not accept flag `{flag}`")]
    UnexpectedFlag { flag: String },
    #[error("multiple `=` signs are not allowed")]
    MultipleEquals,
    #[error("matching double quote expected before end of input")]
    MissingQuote,
    #[error("matching tick quote expected before end of input")]
    MissingTick,
    #[error("empty values are not allowed")]
    EmptyValue,
    #[error("unexpected character `{character}`")]
    UnexpectedCharacter { character: char },
    #[error("matching `]` expected before end of input")]
    MissingListEnd,
    #[error("value expected for field `{field}`")]
    MissingFieldValue { field: String },
}

impl ParseErrorKind {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoBindings => ErrorKind::NoBindings,
            Self::NoSlashStart => ErrorKind::NoSlashStart,
            Self::NoMatchingBinding { .. } => ErrorKind::NoMatchingBinding,
            Self::MustSelectSubcommand { .. } => ErrorKind::MustSelectSubcommand,
            Self::NoArgumentPosition { .. } => ErrorKind::NoArgumentPosition,
            Self::UnexpectedFlag { .. } => ErrorKind::UnexpectedFlag,
            Self::MultipleEquals => ErrorKind::MultipleEquals,
            Self::MissingQuote => ErrorKind::MissingQuote,
            Self::MissingTick => ErrorKind::MissingTick,
            Self::EmptyValue => ErrorKind::EmptyValue,
            Self::UnexpectedCharacter { .. } => ErrorKind::UnexpectedCharacter,
            Self::MissingListEnd => ErrorKind::MissingListEnd,
            Self::MissingFieldValue { .. } => ErrorKind::MissingFieldValue,
        }
    }
}

/// A grammar error and the character offset where it triggered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at position {position})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Offset in characters (not bytes) into the command text.
    pub position: usize,
}

impl ParseError {
    /// Renders the command with a caret under the failing position.
    ///
    /// # Examples
    ///
    /// ```
    /// use app_command_parser::{ParseError, ParseErrorKind};
    ///
    /// let err = ParseError { kind: ParseErrorKind::MultipleEquals, position: 3 };
    /// assert_eq!(err.caret("/a b=="), "/a b==\n   ^");
    /// ```
    pub fn caret(&self, command: &str) -> String {
        format!("{command}\n{}^", " ".repeat(self.position))
    }
}

/// Per-field failures while turning raw tokens into typed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("unknown option for field `{field}`: `{option}`")]
    UnknownOption { field: String, option: String },
    #[error("unknown user for field `{field}`: `{username}`")]
    UnknownUser { field: String, username: String },
    #[error("unknown channel for field `{field}`: `{name}`")]
    UnknownChannel { field: String, name: String },
    #[error("duplicate option for field `{field}`: `{option}`")]
    DuplicateOption { field: String, option: String },
    #[error("duplicate user for field `{field}`: `{username}`")]
    DuplicateUser { field: String, username: String },
    #[error("duplicate channel for field `{field}`: `{name}`")]
    DuplicateChannel { field: String, name: String },
    #[error("invalid boolean for field `{field}`: `{value}`")]
    InvalidBool { field: String, value: String },
    #[error("lookup failed for field `{field}`: {message}")]
    Lookup { field: String, message: String },
}

impl ExpansionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOption { .. } => ErrorKind::UnknownOption,
            Self::UnknownUser { .. } => ErrorKind::UnknownUser,
            Self::UnknownChannel { .. } => ErrorKind::UnknownChannel,
            Self::DuplicateOption { .. } => ErrorKind::DuplicateOption,
            Self::DuplicateUser { .. } => ErrorKind::DuplicateUser,
            Self::DuplicateChannel { .. } => ErrorKind::DuplicateChannel,
            Self::InvalidBool { .. } => ErrorKind::InvalidBool,
            Self::Lookup { .. } => ErrorKind::LookupFailed,
        }
    }

    /// Name of the field the error belongs to.
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownOption { field, .. }
            | Self::UnknownUser { field, .. }
            | Self::UnknownChannel { field, .. }
            | Self::DuplicateOption { field, .. }
            | Self::DuplicateUser { field, .. }
            | Self::DuplicateChannel { field, .. }
            | Self::InvalidBool { field, .. }
            | Self::Lookup { field, .. } => field,
        }
    }
}

/// Failure reported by a collaborator (call transport or directory).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("call failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure to obtain the form of a leaf binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("binding `{location}` has no call to fetch its form")]
    NoCall { location: String },
    #[error("app error: {0}")]
    Remote(String),
    #[error("app response type was not expected: {0}")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Top-level error for turning a command into a call request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("parsing error: {0}")]
    Parse(#[from] ParseError),
    #[error("{}", join_expansion(.0))]
    Expansion(Vec<ExpansionError>),
    #[error("required fields missing: `{}`", .0.join(", "))]
    RequiredFieldsMissing(Vec<String>),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("no call defined for `{location}`")]
    MissingCall { location: String },
}

impl CommandError {
    /// Returns the flat kind. For expansion errors this is the kind of the
    /// first reported error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(err) => err.kind.kind(),
            Self::Expansion(errors) => errors
                .first()
                .map_or(ErrorKind::LookupFailed, ExpansionError::kind),
            Self::RequiredFieldsMissing(_) => ErrorKind::RequiredFieldsMissing,
            Self::Form(_) => ErrorKind::FormFetch,
            Self::MissingCall { .. } => ErrorKind::MissingCall,
        }
    }

    /// Character offset of a grammar error.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Parse(err) => Some(err.position),
            _ => None,
        }
    }
}

fn join_expansion(errors: &[ExpansionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
