//! Replies produced by the command facade.
//!
//! The vocabulary is small:
//! - `SUCCESS` or `SUCCESS=<payload>`
//! - `FAIL` or `FAIL=<code>`
//! - `BADCMD` for lines that did not parse
//! - `NULL` when there is nothing to return
//!
//! Payloads carry records separated by `;`, fields within a record by `,`.

use std::fmt;

use crate::error::{CommandError, CommandResult};

/// Separator between records in a payload.
pub const RECORD_SEPARATOR: char = ';';

/// Separator between fields of one record.
pub const FIELD_SEPARATOR: char = ',';

/// `FAIL` code reported when another operation of the same class is in flight.
pub const BUSY_CODE: i32 = 255;

/// A reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success(Option<String>),
    Fail(Option<i32>),
    BadCommand,
    Null,
}

impl Reply {
    /// Plain `SUCCESS`.
    pub fn ok() -> Self {
        Reply::Success(None)
    }

    /// `SUCCESS=<payload>` built from records of fields; plain `SUCCESS`
    /// when there are no records.
    pub fn with_records<R, F>(records: R) -> Self
    where
        R: IntoIterator<Item = F>,
        F: IntoIterator<Item = String>,
    {
        let payload = records
            .into_iter()
            .map(|fields| {
                fields
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(&FIELD_SEPARATOR.to_string())
            })
            .collect::<Vec<_>>()
            .join(&RECORD_SEPARATOR.to_string());
        if payload.is_empty() {
            return Reply::Success(None);
        }
        Reply::Success(Some(payload))
    }

    /// Parse a reply line.
    pub fn parse(text: &str) -> CommandResult<Reply> {
        let text = text.trim();
        let (head, tail) = match text.split_once('=') {
            Some((head, tail)) => (head, Some(tail)),
            None => (text, None),
        };
        match (head, tail) {
            ("SUCCESS", payload) => Ok(Reply::Success(payload.map(str::to_string))),
            ("FAIL", None) => Ok(Reply::Fail(None)),
            ("FAIL", Some(code)) => code
                .parse()
                .map(|code| Reply::Fail(Some(code)))
                .map_err(|_| CommandError::ParseError(text.to_string())),
            ("BADCMD", None) => Ok(Reply::BadCommand),
            ("NULL", None) => Ok(Reply::Null),
            _ => Err(CommandError::ParseError(text.to_string())),
        }
    }

    /// Check if this is a success reply.
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    /// The payload of a success reply.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Reply::Success(Some(payload)) => Some(payload),
            _ => None,
        }
    }

    /// The payload split into records and fields.
    pub fn records(&self) -> Vec<Vec<&str>> {
        self.payload()
            .filter(|payload| !payload.is_empty())
            .map(|payload| {
                payload
                    .split(RECORD_SEPARATOR)
                    .map(|record| record.split(FIELD_SEPARATOR).collect())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Numeric status for callers that only need a code.
    ///
    /// `0` for success, the fail code (or `1`) for failures, `-2` for a bad
    /// command and `-3` for null.
    pub fn code(&self) -> i32 {
        match self {
            Reply::Success(_) => 0,
            Reply::Fail(code) => code.unwrap_or(1),
            Reply::BadCommand => -2,
            Reply::Null => -3,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Success(None) => write!(f, "SUCCESS"),
            Reply::Success(Some(payload)) => write!(f, "SUCCESS={}", payload),
            Reply::Fail(None) => write!(f, "FAIL"),
            Reply::Fail(Some(code)) => write!(f, "FAIL={}", code),
            Reply::BadCommand => write!(f, "BADCMD"),
            Reply::Null => write!(f, "NULL"),
        }
    }
}

impl From<CommandError> for Reply {
    fn from(_: CommandError) -> Self {
        Reply::BadCommand
    }
}
