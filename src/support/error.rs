//-
// Copyright (c) 2024, the mhstore authors
//
// This file is part of mhstore.
//
// mhstore is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// mhstore is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// mhstore. If not, see <http://www.gnu.org/licenses/>.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no such folder {}", .0.display())]
    NoSuchFolder(PathBuf),
    #[error(
        "window {lo}-{hi} does not cover existing messages {lowmsg}-{hghmsg}"
    )]
    WindowExcludesMessages {
        lo: u32,
        hi: u32,
        lowmsg: u32,
        hghmsg: u32,
    },
    #[error("message window {lo}-{hi} is wider than {max} slots")]
    WindowTooLarge { lo: u32, hi: u32, max: u32 },
    #[error("invalid message window {lo}-{hi}")]
    InvalidWindow { lo: u32, hi: u32 },
    #[error("folder {} is read-only", .0.display())]
    ReadOnlyFolder(PathBuf),
    #[error("no such sequence {0}")]
    NoSuchSequence(String),
    #[error("illegal sequence name: {0}")]
    IllegalSequenceName(String),
    #[error("the current message must be a single message")]
    CurrentNotSingle,
    #[error("message {} already exists in {}", .name, .folder.display())]
    MessageExists { folder: PathBuf, name: String },
    #[error("timed out waiting for lock on {}", .0.display())]
    LockTimeout(PathBuf),
    #[error("{}:{line}: malformed entry", .path.display())]
    MalformedContext { path: PathBuf, line: usize },
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

/// Failures to resolve a single message specifier.
///
/// Every variant carries the token that could not be resolved so the caller
/// can report it without keeping the input around.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("no {0} message")]
    NoSuchMessage(String),
    #[error("message {0} doesn't exist")]
    MessageDoesNotExist(String),
    #[error("message {token} out of range 1-{max}")]
    OutOfRange { token: String, max: u32 },
    #[error("no messages in range {0}")]
    NoneInRange(String),
    #[error("bad message list {0}")]
    BadList(String),
    #[error("folder full, no {0} message")]
    FolderFull(String),
    #[error("no such sequence {0}")]
    UnknownSequence(String),
    #[error("sequence {name} {}", fullness(.inverted))]
    EmptySequence { name: String, inverted: bool },
    #[error("illegal argument delimiter `{delimiter}' in {token}")]
    BadDelimiter { token: String, delimiter: char },
    #[error("unknown message specifier {0}")]
    UnknownSpecifier(String),
}

fn fullness(inverted: &bool) -> &'static str {
    if *inverted {
        "full"
    } else {
        "empty"
    }
}
