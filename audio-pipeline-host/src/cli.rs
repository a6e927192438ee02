//! Line-oriented operator commands.
//!
//! Turns one line of operator input into a pipeline [`Command`], or into a
//! local action (`help`, `quit`). Malformed input is rejected here and never
//! reaches the pipeline.

use audio_pipeline_core::{Command, FileName, MAX_FILE_NAME_LEN};
use thiserror::Error;

/// Longest accepted command line, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 63;

pub const HELP_TEXT: &str = "\
Available commands:
  record          - Start recording
  stop            - Stop recording and save
  ls              - List files
  play <filename> - Play WAV file
  rm <filename>   - Delete file
  help            - Show this list
  quit            - Exit";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CliError {
    #[error("command too long ({len} > {max} characters)", max = MAX_LINE_LEN)]
    LineTooLong { len: usize },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("usage: {0} <filename>")]
    MissingFileName(&'static str),

    #[error("invalid file name (max {max} characters): {0}", max = MAX_FILE_NAME_LEN)]
    InvalidFileName(String),

    #[error("'{command}' takes no argument '{extra}'")]
    UnexpectedArgument { command: &'static str, extra: String },
}

/// What a parsed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Submit(Command),
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<CliAction>, CliError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let len = line.chars().count();
    if len > MAX_LINE_LEN {
        return Err(CliError::LineTooLong { len });
    }

    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();

    let action = match word {
        "record" => CliAction::Submit(no_argument("record", argument, Command::StartRecord)?),
        "stop" => CliAction::Submit(no_argument("stop", argument, Command::StopRecord)?),
        "ls" => CliAction::Submit(no_argument("ls", argument, Command::ListFiles)?),
        "play" => CliAction::Submit(Command::PlayFile(file_name("play", argument)?)),
        "rm" => CliAction::Submit(Command::DeleteFile(file_name("rm", argument)?)),
        "help" | "?" => CliAction::Help,
        "quit" | "exit" => CliAction::Quit,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };
    Ok(Some(action))
}

fn no_argument(command: &'static str, argument: Option<&str>, parsed: Command) -> Result<Command, CliError> {
    match argument {
        None => Ok(parsed),
        Some(extra) => Err(CliError::UnexpectedArgument {
            command,
            extra: extra.to_string(),
        }),
    }
}

fn file_name(command: &'static str, argument: Option<&str>) -> Result<FileName, CliError> {
    let name = argument.ok_or(CliError::MissingFileName(command))?;
    FileName::new(name).map_err(|_| CliError::InvalidFileName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(line: &str) -> Command {
        match parse_line(line) {
            Ok(Some(CliAction::Submit(command))) => command,
            other => panic!("{:?} parsed as {:?}", line, other),
        }
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(submit("record"), Command::StartRecord);
        assert_eq!(submit("stop\r\n"), Command::StopRecord);
        assert_eq!(submit("  ls  "), Command::ListFiles);
        assert_eq!(
            submit("play rec_0000.wav"),
            Command::PlayFile(FileName::new("rec_0000.wav").unwrap())
        );
        assert_eq!(submit("rm old.wav"), Command::DeleteFile(FileName::new("old.wav").unwrap()));
        assert_eq!(parse_line("help"), Ok(Some(CliAction::Help)));
        assert_eq!(parse_line("quit"), Ok(Some(CliAction::Quit)));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   \n"), Ok(None));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_line("dance"), Err(CliError::UnknownCommand("dance".into())));
        assert_eq!(parse_line("play"), Err(CliError::MissingFileName("play")));
        assert_eq!(parse_line("rm"), Err(CliError::MissingFileName("rm")));
        assert_eq!(
            parse_line("record now"),
            Err(CliError::UnexpectedArgument {
                command: "record",
                extra: "now".into()
            })
        );
    }

    #[test]
    fn enforces_length_limits() {
        let long_name = format!("play {}.wav", "a".repeat(28));
        assert!(matches!(parse_line(&long_name), Err(CliError::InvalidFileName(_))));

        let longest_name = format!("play {}.wav", "a".repeat(27));
        assert!(matches!(parse_line(&longest_name), Ok(Some(CliAction::Submit(_)))));

        let line = format!("ls {}", " ".repeat(MAX_LINE_LEN));
        assert_eq!(parse_line(&line), Err(CliError::LineTooLong { len: MAX_LINE_LEN + 3 }));
    }

    #[test]
    fn help_lists_every_command() {
        for word in ["record", "stop", "ls", "play", "rm", "quit"] {
            assert!(HELP_TEXT.contains(word));
        }
    }
}
