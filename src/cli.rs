//! Console commands.
//!
//! This module defines the [`Command`] enum parsed from a line of user input by the
//! `ferry` console, and [`prompt`] which reads one such line. Seeding commands
//! (`create`, `partition`, `insert`, `index`) act on the engine directly; the others
//! are turned into requests and executed through [`RequestHandle`](crate::RequestHandle).
//!
//! # Example
//! ```rust
//! use ferry::cli::Command;
//!
//! let cmd: Command = "flush a b".try_into().unwrap();
//! assert_eq!(cmd, Command::Flush(vec!["a".into(), "b".into()]));
//! ```
use std::io::{self, BufRead, Write};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Close the console.
    Exit,
    /// Create a root table.
    Create(String),
    /// Create a partition `tag` under a root table.
    Partition { table: String, tag: String },
    /// Buffer rows in a table.
    Insert { table: String, rows: u64 },
    /// Build the index of a table.
    Index(String),
    Count(String),
    DropIndex(String),
    Flush(Vec<String>),
    Describe(String),
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parts = value.split_whitespace().collect::<Vec<&str>>();
        let Some((&command, args)) = parts.split_first() else {
            return Err(CommandError::Empty);
        };

        match command {
            ".exit" => Ok(Command::Exit),
            "create" => Ok(Command::Create(single(command, args, "create t1")?)),
            "index" => Ok(Command::Index(single(command, args, "index t1")?)),
            "count" => Ok(Command::Count(single(command, args, "count t1")?)),
            "drop_index" => Ok(Command::DropIndex(single(command, args, "drop_index t1")?)),
            "describe" => Ok(Command::Describe(single(command, args, "describe t1")?)),
            "partition" => match args {
                [table, tag] => Ok(Command::Partition {
                    table: table.to_string(),
                    tag: tag.to_string(),
                }),
                _ => Err(invalid(
                    command,
                    "requires a table and a partition tag. Example: partition t1 2024",
                )),
            },
            "insert" => match args {
                [table, rows] => {
                    let rows = rows.parse::<u64>().map_err(|_| {
                        invalid(
                            command,
                            "invalid integer argument; argument should be a non-negative number.",
                        )
                    })?;
                    Ok(Command::Insert {
                        table: table.to_string(),
                        rows,
                    })
                }
                _ => Err(invalid(
                    command,
                    "requires a table and a number of rows. Example: insert t1 10",
                )),
            },
            "flush" => {
                if args.is_empty() {
                    return Err(invalid(
                        command,
                        "requires at least one table. Example: flush t1 t2",
                    ));
                }
                Ok(Command::Flush(args.iter().map(|s| s.to_string()).collect()))
            }
            _ => Err(CommandError::UnrecognizedCommand(value.trim().to_string())),
        }
    }
}

fn single(command: &str, args: &[&str], example: &str) -> Result<String, CommandError> {
    match args {
        [table] => Ok(table.to_string()),
        _ => Err(invalid(
            command,
            &format!("requires exactly one table. Example: {example}"),
        )),
    }
}

fn invalid(command: &str, reason: &str) -> CommandError {
    CommandError::InvalidCommandArguments {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

/// Writes the prompt and reads one command.
///
/// Returns `Ok(None)` once the reader is exhausted.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> io::Result<Option<Result<Command, CommandError>>>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(None);
    }

    Ok(Some(s.as_str().try_into()))
}
