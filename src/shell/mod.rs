//! Line-oriented front end over a [`Session`]
//!
//! Every command answers with a short status line (`OK`, `FILE NOT FOUND`,
//! ...) or with its listing. Scripts loaded with `load` run through the same
//! dispatcher.

mod command;

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use log::{debug, warn};

pub use command::{Command, ParseError};

use crate::error::{AllocationError, DirectoryError, Error, PathError};
use crate::filesystem::Filesystem;
use crate::filetypes::split_path;
use crate::session::{Session, MAX_SCRIPT_DEPTH};
use crate::structs::NULL_ID;

/// Whether the shell keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// Status line printed after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    FileNotFound,
    PathNotFound,
    Exist,
    NotEmpty,
    CannotCreateFile,
    NotFormatted,
    DirectoryFull,
    NoSpace,
    FileTooLarge,
    /// The command already printed its output
    Silent,
    Failed(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Ok => "OK",
            Self::FileNotFound => "FILE NOT FOUND",
            Self::PathNotFound => "PATH NOT FOUND",
            Self::Exist => "EXIST",
            Self::NotEmpty => "NOT EMPTY",
            Self::CannotCreateFile => "CANNOT CREATE FILE",
            Self::NotFormatted => "NOT FORMATTED",
            Self::DirectoryFull => "DIRECTORY FULL",
            Self::NoSpace => "NO SPACE",
            Self::FileTooLarge => "FILE TOO LARGE",
            Self::Silent => "",
            Self::Failed(message) => return write!(f, "ERR: {message}"),
        };
        write!(f, "{code}")
    }
}

impl From<&Error> for Reply {
    fn from(error: &Error) -> Self {
        match error {
            Error::NotMounted => Self::NotFormatted,
            Error::Path(PathError::NotFound | PathError::NotADirectory) => Self::PathNotFound,
            Error::Path(PathError::AlreadyExists) => Self::Exist,
            Error::Directory(DirectoryError::NotEmpty) => Self::NotEmpty,
            Error::Directory(DirectoryError::Full) => Self::DirectoryFull,
            Error::Allocation(AllocationError::NoFreeBlock | AllocationError::NoFreeInode) => {
                Self::NoSpace
            }
            Error::FileTooLarge => Self::FileTooLarge,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Inode of the regular file at `path`, if there is one
fn regular_file(fs: &mut Filesystem, path: &str) -> Result<Option<u32>, Error> {
    match fs.resolve(path)? {
        Some(index) if !fs.is_directory(index)? => Ok(Some(index)),
        _ => Ok(None),
    }
}

/// Where a file named `name` lands when copied to `path`.
/// An existing directory receives it under `name`; otherwise the parent must exist
fn destination(fs: &mut Filesystem, path: &str, name: &str) -> Result<Option<String>, Error> {
    if let Some(index) = fs.resolve(path)? {
        if fs.is_directory(index)? {
            let joined = format!("{}/{name}", path.trim_end_matches('/'));
            return Ok(Some(joined));
        }
        return Ok(Some(path.to_owned()));
    }
    let Some((parent, _)) = split_path(path) else {
        return Ok(None);
    };
    match fs.resolve(parent)? {
        Some(index) if fs.is_directory(index)? => Ok(Some(path.to_owned())),
        _ => Ok(None),
    }
}

fn copy(session: &mut Session, source: &str, target: &str) -> Result<Reply, Error> {
    let (source, target) = (session.absolute(source), session.absolute(target));
    let fs = session.filesystem()?;
    let Some(index) = regular_file(fs, &source)? else {
        return Ok(Reply::FileNotFound);
    };
    let name = split_path(&source).map_or("", |(_, name)| name);
    let Some(target) = destination(fs, &target, name)? else {
        return Ok(Reply::PathNotFound);
    };
    let data = fs.read_file_data(index)?;
    fs.write_path(&target, &data)?;
    Ok(Reply::Ok)
}

fn rename(session: &mut Session, source: &str, target: &str) -> Result<Reply, Error> {
    let (source, target) = (session.absolute(source), session.absolute(target));
    let fs = session.filesystem()?;
    if !fs.path_exists(&source)? {
        return Ok(Reply::FileNotFound);
    }
    fs.rename(&source, &target)?;
    Ok(Reply::Ok)
}

fn remove(session: &mut Session, path: &str) -> Result<Reply, Error> {
    let path = session.absolute(path);
    let fs = session.filesystem()?;
    if regular_file(fs, &path)?.is_none() {
        return Ok(Reply::FileNotFound);
    }
    fs.delete(&path)?;
    Ok(Reply::Ok)
}

fn make_directory(session: &mut Session, path: &str) -> Result<Reply, Error> {
    let path = session.absolute(path);
    session.filesystem()?.create_path(&path, true)?;
    Ok(Reply::Ok)
}

fn remove_directory(session: &mut Session, path: &str) -> Result<Reply, Error> {
    let path = session.absolute(path);
    let fs = session.filesystem()?;
    match fs.resolve(&path)? {
        Some(index) if fs.is_directory(index)? => {}
        _ => return Ok(Reply::FileNotFound),
    }
    fs.delete(&path)?;
    Ok(Reply::Ok)
}

fn list(session: &mut Session, path: Option<&str>, out: &mut impl Write) -> Result<Reply, Error> {
    let path = session.absolute(path.unwrap_or("."));
    let fs = session.filesystem()?;
    let index = match fs.resolve(&path)? {
        Some(index) if fs.is_directory(index)? => index,
        _ => return Ok(Reply::PathNotFound),
    };
    for entry in fs.list_directory(index)? {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        let kind = if entry.is_directory { '+' } else { '-' };
        writeln!(out, "{kind}{}", entry.name)?;
    }
    Ok(Reply::Silent)
}

fn cat(session: &mut Session, path: &str, out: &mut impl Write) -> Result<Reply, Error> {
    let path = session.absolute(path);
    let fs = session.filesystem()?;
    let Some(index) = regular_file(fs, &path)? else {
        return Ok(Reply::FileNotFound);
    };
    let data = fs.read_file_data(index)?;
    out.write_all(&data)?;
    writeln!(out)?;
    Ok(Reply::Silent)
}

fn change_directory(session: &mut Session, path: &str) -> Result<Reply, Error> {
    session.change_directory(path)?;
    Ok(Reply::Ok)
}

fn info(session: &mut Session, path: &str, out: &mut impl Write) -> Result<Reply, Error> {
    let path = session.absolute(path);
    let fs = session.filesystem()?;
    let Some(index) = fs.resolve(&path)? else {
        return Ok(Reply::FileNotFound);
    };
    let inode = fs.read_inode(index)?;
    let name = split_path(&path).map_or("/", |(_, name)| name);
    let direct: Vec<u32> = inode
        .direct_blocks()
        .into_iter()
        .filter(|&id| id != NULL_ID)
        .collect();
    let mut indirect = Vec::new();
    if let Some(id) = inode.indirect_block() {
        let block = fs.read_block(id)?;
        indirect.extend(
            (0..block.pointer_count())
                .map(|slot| block.pointer(slot))
                .filter(|&id| id != NULL_ID),
        );
    }
    write!(out, "{name} - {} B - i-node {index} - direct {direct:?}", inode.file_size())?;
    match inode.indirect_block() {
        Some(id) => writeln!(out, " - indirect {id} {indirect:?}")?,
        None => writeln!(out)?,
    }
    Ok(Reply::Silent)
}

fn import(session: &mut Session, host: &Path, path: &str) -> Result<Reply, Error> {
    let path = session.absolute(path);
    let fs = session.filesystem()?;
    let Ok(data) = std::fs::read(host) else {
        return Ok(Reply::FileNotFound);
    };
    let name = host.file_name().and_then(|name| name.to_str()).unwrap_or("");
    let Some(target) = destination(fs, &path, name)? else {
        return Ok(Reply::PathNotFound);
    };
    fs.write_path(&target, &data)?;
    Ok(Reply::Ok)
}

fn export(session: &mut Session, path: &str, host: &Path) -> Result<Reply, Error> {
    let path = session.absolute(path);
    let fs = session.filesystem()?;
    let Some(index) = regular_file(fs, &path)? else {
        return Ok(Reply::FileNotFound);
    };
    let data = fs.read_file_data(index)?;
    if let Err(e) = std::fs::write(host, data) {
        warn!("Cannot write {}: {e}", host.display());
        return Ok(Reply::PathNotFound);
    }
    Ok(Reply::Ok)
}

fn format(session: &mut Session, size_mb: u32) -> Result<Reply, Error> {
    match session.format(size_mb) {
        Ok(()) => Ok(Reply::Ok),
        Err(e) => {
            warn!("Format failed: {e}");
            Ok(Reply::CannotCreateFile)
        }
    }
}

fn concatenate(
    session: &mut Session,
    first: &str,
    second: &str,
    target: &str,
) -> Result<Reply, Error> {
    let (first, second) = (session.absolute(first), session.absolute(second));
    let target = session.absolute(target);
    let fs = session.filesystem()?;
    let (Some(first), Some(second)) = (regular_file(fs, &first)?, regular_file(fs, &second)?) else {
        return Ok(Reply::FileNotFound);
    };
    let Some(target) = destination(fs, &target, "")? else {
        return Ok(Reply::PathNotFound);
    };
    let mut data = fs.read_file_data(first)?;
    data.extend(fs.read_file_data(second)?);
    fs.write_path(&target, &data)?;
    Ok(Reply::Ok)
}

fn append(session: &mut Session, target: &str, source: &str) -> Result<Reply, Error> {
    let (target, source) = (session.absolute(target), session.absolute(source));
    let fs = session.filesystem()?;
    let (Some(first), Some(second)) = (regular_file(fs, &target)?, regular_file(fs, &source)?) else {
        return Ok(Reply::FileNotFound);
    };
    let mut data = fs.read_file_data(first)?;
    data.extend(fs.read_file_data(second)?);
    fs.write_path(&target, &data)?;
    Ok(Reply::Ok)
}

fn statistics(session: &mut Session, out: &mut impl Write) -> Result<Reply, Error> {
    let fs = session.filesystem()?;
    let superblock = *fs.superblock();
    let (inodes, blocks) = (superblock.total_inodes(), superblock.total_blocks());
    let (free_inodes, free_blocks) = (fs.free_inode_count(), fs.free_block_count());
    let mut directories = 0;
    for index in 0..inodes {
        if fs.inode_bitmap().get(index)? && fs.is_directory(index)? {
            directories += 1;
        }
    }
    writeln!(out, "container size: {} B", superblock.end())?;
    writeln!(out, "block size: {} B", superblock.block_size())?;
    writeln!(out, "blocks: {} used, {free_blocks} free, {blocks} total", blocks - free_blocks)?;
    writeln!(out, "inodes: {} used, {free_inodes} free, {inodes} total", inodes - free_inodes)?;
    writeln!(out, "directories: {directories}")?;
    Ok(Reply::Silent)
}

/// Run the commands of a host script file
fn load(session: &mut Session, script: &Path, out: &mut impl Write) -> io::Result<(Reply, Outcome)> {
    if session.script_depth >= MAX_SCRIPT_DEPTH {
        return Ok((Reply::Failed("script nesting too deep".to_owned()), Outcome::Continue));
    }
    let Ok(file) = File::open(script) else {
        return Ok((Reply::FileNotFound, Outcome::Continue));
    };
    debug!("Loading script {}", script.display());
    session.script_depth += 1;
    let outcome = run(session, BufReader::new(file), out, None);
    session.script_depth -= 1;
    Ok((Reply::Ok, outcome?))
}

/// Execute one command, printing its output and status line to `out`
pub fn execute(session: &mut Session, command: &Command, out: &mut impl Write) -> io::Result<Outcome> {
    if command.needs_mount() && !session.is_mounted() {
        writeln!(out, "{}", Reply::NotFormatted)?;
        return Ok(Outcome::Continue);
    }
    let result = match command {
        Command::Copy {
            source,
            destination,
        } => copy(session, source, destination),
        Command::Move {
            source,
            destination,
        } => rename(session, source, destination),
        Command::Remove(path) => remove(session, path),
        Command::MakeDirectory(path) => make_directory(session, path),
        Command::RemoveDirectory(path) => remove_directory(session, path),
        Command::List(path) => list(session, path.as_deref(), out),
        Command::Cat(path) => cat(session, path, out),
        Command::ChangeDirectory(path) => change_directory(session, path),
        Command::PrintDirectory => {
            writeln!(out, "{}", session.cwd())?;
            Ok(Reply::Silent)
        }
        Command::Info(path) => info(session, path, out),
        Command::Import { host, path } => import(session, host, path),
        Command::Export { path, host } => export(session, path, host),
        Command::Load(script) => {
            let (reply, outcome) = load(session, script, out)?;
            writeln!(out, "{reply}")?;
            return Ok(outcome);
        }
        Command::Format(size_mb) => format(session, *size_mb),
        Command::Concatenate {
            first,
            second,
            destination,
        } => concatenate(session, first, second, destination),
        Command::Append { target, source } => append(session, target, source),
        Command::Statistics => statistics(session, out),
        Command::Exit => {
            session.unmount();
            return Ok(Outcome::Exit);
        }
    };
    let reply = result.unwrap_or_else(|e| {
        debug!("{command:?} failed: {e}");
        Reply::from(&e)
    });
    if reply != Reply::Silent {
        writeln!(out, "{reply}")?;
    }
    Ok(Outcome::Continue)
}

/// Read commands from `input` until it ends or `exit` is given.
/// With a prompt, it is printed before every line
pub fn run(
    session: &mut Session,
    input: impl BufRead,
    out: &mut impl Write,
    prompt: Option<&str>,
) -> io::Result<Outcome> {
    let mut lines = input.lines();
    loop {
        if let Some(prompt) = prompt {
            write!(out, "{prompt}")?;
            out.flush()?;
        }
        let Some(line) = lines.next() else {
            return Ok(Outcome::Continue);
        };
        match Command::parse(&line?) {
            Ok(Some(command)) => {
                if execute(session, &command, out)? == Outcome::Exit {
                    return Ok(Outcome::Exit);
                }
            }
            Ok(None) => {}
            Err(e) => writeln!(out, "{e}")?,
        }
    }
}
