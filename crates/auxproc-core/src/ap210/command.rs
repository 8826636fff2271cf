//! Parser for the record processor's textual open commands.
//!
//! While a pair is unbound, a write to the control variable carries a
//! command line of 2–3 comma-separated fields. A field may be delimited
//! with double quotes to allow embedded commas. The first field is a
//! two-letter op-class; the second a path; the third is an optional
//! single-character format code for the open classes, or the
//! destination path for a rename:
//!
//! ```text
//! "IW","/tmp/t1",""        open /tmp/t1 for record writes, CDR format
//! PR,/run/feed.pipe,T      open a named pipe for reads, text format
//! DL,/tmp/old.dat          delete
//! "RN","/tmp/a","/tmp/b"   rename
//! ```

use std::path::PathBuf;

use super::record::{Direction, RecordFormat};

/// A parsed open command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenCommand {
    /// `IR` / `IW` — open a regular file for record reads or writes.
    OpenFile {
        dir: Direction,
        path: PathBuf,
        format: RecordFormat,
    },
    /// `PR` / `PW` — open (creating if absent) a named pipe.
    OpenPipe {
        dir: Direction,
        path: PathBuf,
        format: RecordFormat,
    },
    /// `DL` — delete a path.
    Delete { path: PathBuf },
    /// `RN` — rename a path.
    Rename { from: PathBuf, to: PathBuf },
}

/// Why a command line failed to parse.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("op-class '{0}' takes {1} fields, found {2}")]
    FieldCount(String, &'static str, usize),

    #[error("unknown op-class '{0}'")]
    BadOpClass(String),

    #[error("empty path")]
    EmptyPath,

    #[error("unknown format code '{0}'")]
    BadFormat(String),
}

/// Parse one control-variable command line.
pub fn parse(line: &str) -> Result<OpenCommand, CommandError> {
    let fields = split_fields(line)?;
    if fields.is_empty() || (fields.len() == 1 && fields[0].is_empty()) {
        return Err(CommandError::Empty);
    }

    let op = fields[0].to_ascii_uppercase();
    match op.as_str() {
        "IR" | "IW" | "PR" | "PW" => {
            if fields.len() < 2 || fields.len() > 3 {
                return Err(CommandError::FieldCount(op, "2-3", fields.len()));
            }
            let path = path_field(&fields[1])?;
            let format = format_field(fields.get(2).map(String::as_str))?;
            let dir = if op.ends_with('R') {
                Direction::Read
            } else {
                Direction::Write
            };
            if op.starts_with('I') {
                Ok(OpenCommand::OpenFile { dir, path, format })
            } else {
                Ok(OpenCommand::OpenPipe { dir, path, format })
            }
        }
        "DL" => {
            if fields.len() != 2 {
                return Err(CommandError::FieldCount(op, "2", fields.len()));
            }
            Ok(OpenCommand::Delete {
                path: path_field(&fields[1])?,
            })
        }
        "RN" => {
            if fields.len() != 3 {
                return Err(CommandError::FieldCount(op, "3", fields.len()));
            }
            Ok(OpenCommand::Rename {
                from: path_field(&fields[1])?,
                to: path_field(&fields[2])?,
            })
        }
        _ => Err(CommandError::BadOpClass(fields[0].clone())),
    }
}

fn path_field(field: &str) -> Result<PathBuf, CommandError> {
    if field.is_empty() {
        return Err(CommandError::EmptyPath);
    }
    Ok(PathBuf::from(field))
}

fn format_field(field: Option<&str>) -> Result<RecordFormat, CommandError> {
    match field {
        None | Some("") => Ok(RecordFormat::Cdr),
        Some(code) => {
            let mut chars = code.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    RecordFormat::from_code(c).ok_or_else(|| CommandError::BadFormat(code.into()))
                }
                _ => Err(CommandError::BadFormat(code.into())),
            }
        }
    }
}

/// Split a command line on commas, honoring double-quoted fields.
///
/// Quotes are stripped; a quoted field keeps embedded commas and
/// whitespace. Unquoted fields are trimmed.
fn split_fields(line: &str) -> Result<Vec<String>, CommandError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                was_quoted = true;
            }
            ',' if !in_quotes => {
                fields.push(finish_field(&mut current, was_quoted));
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(CommandError::UnterminatedQuote);
    }
    fields.push(finish_field(&mut current, was_quoted));
    Ok(fields)
}

fn finish_field(current: &mut String, was_quoted: bool) -> String {
    let field = std::mem::take(current);
    if was_quoted {
        field
    } else {
        field.trim().to_string()
    }
}
