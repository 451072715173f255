use std::path::PathBuf;

use thiserror::Error;

/// One line of shell input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Copy { source: String, destination: String },
    Move { source: String, destination: String },
    Remove(String),
    MakeDirectory(String),
    RemoveDirectory(String),
    List(Option<String>),
    Cat(String),
    ChangeDirectory(String),
    PrintDirectory,
    Info(String),
    Import { host: PathBuf, path: String },
    Export { path: String, host: PathBuf },
    Load(PathBuf),
    Format(u32),
    Concatenate { first: String, second: String, destination: String },
    Append { target: String, source: String },
    Statistics,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command {0:?}")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid size {0:?}")]
    InvalidSize(String),
}

/// Accepts `600MB`, `600mb` and plain `600`
fn parse_size(size: &str) -> Result<u32, ParseError> {
    let digits = size
        .strip_suffix("MB")
        .or_else(|| size.strip_suffix("mb"))
        .unwrap_or(size);
    digits
        .parse()
        .map_err(|_| ParseError::InvalidSize(size.to_owned()))
}

impl Command {
    /// Parse a line, yielding `None` for blank lines and `#` comments
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let owned = |i: usize| words[i].to_owned();
        let command = match (words[0], words.len()) {
            ("cp", 3) => Self::Copy {
                source: owned(1),
                destination: owned(2),
            },
            ("cp", _) => return Err(ParseError::Usage("cp s1 s2")),
            ("mv", 3) => Self::Move {
                source: owned(1),
                destination: owned(2),
            },
            ("mv", _) => return Err(ParseError::Usage("mv s1 s2")),
            ("rm", 2) => Self::Remove(owned(1)),
            ("rm", _) => return Err(ParseError::Usage("rm s1")),
            ("mkdir", 2) => Self::MakeDirectory(owned(1)),
            ("mkdir", _) => return Err(ParseError::Usage("mkdir a1")),
            ("rmdir", 2) => Self::RemoveDirectory(owned(1)),
            ("rmdir", _) => return Err(ParseError::Usage("rmdir a1")),
            ("ls", 1) => Self::List(None),
            ("ls", 2) => Self::List(Some(owned(1))),
            ("ls", _) => return Err(ParseError::Usage("ls [a1]")),
            ("cat", 2) => Self::Cat(owned(1)),
            ("cat", _) => return Err(ParseError::Usage("cat s1")),
            ("cd", 2) => Self::ChangeDirectory(owned(1)),
            ("cd", _) => return Err(ParseError::Usage("cd a1")),
            ("pwd", 1) => Self::PrintDirectory,
            ("pwd", _) => return Err(ParseError::Usage("pwd")),
            ("info", 2) => Self::Info(owned(1)),
            ("info", _) => return Err(ParseError::Usage("info s1")),
            ("incp", 3) => Self::Import {
                host: PathBuf::from(words[1]),
                path: owned(2),
            },
            ("incp", _) => return Err(ParseError::Usage("incp s1 s2")),
            ("outcp", 3) => Self::Export {
                path: owned(1),
                host: PathBuf::from(words[2]),
            },
            ("outcp", _) => return Err(ParseError::Usage("outcp s1 s2")),
            ("load", 2) => Self::Load(PathBuf::from(words[1])),
            ("load", _) => return Err(ParseError::Usage("load s1")),
            ("format", 2) => Self::Format(parse_size(words[1])?),
            ("format", _) => return Err(ParseError::Usage("format <size>MB")),
            ("xcp", 4) => Self::Concatenate {
                first: owned(1),
                second: owned(2),
                destination: owned(3),
            },
            ("xcp", _) => return Err(ParseError::Usage("xcp s1 s2 s3")),
            ("add", 3) => Self::Append {
                target: owned(1),
                source: owned(2),
            },
            ("add", _) => return Err(ParseError::Usage("add s1 s2")),
            ("statfs", 1) => Self::Statistics,
            ("statfs", _) => return Err(ParseError::Usage("statfs")),
            ("exit", 1) => Self::Exit,
            ("exit", _) => return Err(ParseError::Usage("exit")),
            (other, _) => return Err(ParseError::Unknown(other.to_owned())),
        };
        Ok(Some(command))
    }

    /// Commands that work without a mounted filesystem
    pub fn needs_mount(&self) -> bool {
        !matches!(
            self,
            Self::Format(_) | Self::Load(_) | Self::PrintDirectory | Self::Exit
        )
    }
}
