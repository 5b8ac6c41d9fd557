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

//! The message and sequence store for a single folder.
//!
//! A folder is a directory in which each message is a file named by its
//! decimal message number. Alongside the messages, a folder may contain:
//!
//! - The public sequences file (`.mh_sequences` by default), holding one
//!   `name: ranges` line per public sequence.
//!
//! - Its lock file, `<sequences file>.lock`.
//!
//! - Removed messages, renamed to carry the backup prefix (`,` by default).
//!
//! - The draft link (`@`), and dot files, which are ignored.
//!
//! Anything else is an "other file", which is noted but otherwise left
//! alone. Subfolders are other files from the perspective of their parent.
//!
//! Private sequences are stored in the user's context under
//! `atr-<name>-<folder path>`.
//!
//! The directory listing is the only authority on which messages exist. The
//! sequences file and the context are merely a cache of tags, so a process
//! which dies at any point outside a protected write leaves nothing which the
//! next scan cannot recover from.
//!
//! A `Folder` lives for the duration of one command: it is created by
//! `Folder::read`, mutated, optionally saved with `Folder::save_sequences`,
//! and dropped.

mod defs;
mod expunge;
mod messages;
pub mod model;
mod read;
mod realloc;
mod selector;
mod seq_file;
mod sequences;

pub use defs::*;
pub use messages::AddOptions;
pub use read::create_folder;
