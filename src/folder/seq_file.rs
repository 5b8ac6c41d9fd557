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

//! Loading and saving of sequence state.
//!
//! Public sequences live in the folder's sequences file, one
//! `name: ranges` line each. Private sequences live in the context under
//! `atr-<name>-<folder path>`. The current message is stored like any other
//! sequence under the configured current-sequence name.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::{debug, warn};

use super::defs::*;
use super::model::MsgRange;
use crate::context::Context;
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};
use crate::support::lock::FileLock;
use crate::support::signals::SignalGuard;

const PRIVATE_PREFIX: &str = "atr-";

impl Folder {
    /// The path of the public sequences file.
    ///
    /// Only meaningful when a sequences file is configured.
    pub fn sequences_path(&self) -> PathBuf {
        self.path.join(&self.config.sequences_file)
    }

    fn private_key(&self, name: &str) -> String {
        format!("{}{}-{}", PRIVATE_PREFIX, name, self.path.display())
    }

    /// Load sequences from the public sequences file and the context.
    pub(super) fn read_sequences(&mut self, ctx: &Context) -> Result<(), Error> {
        if !self.config.sequences_file.is_empty() && !self.is_read_only() {
            let path = self.sequences_path();
            match fs::read_to_string(&path) {
                Ok(text) => {
                    for (name, value) in parse_sequences_file(&text) {
                        self.init_sequence(&name, &value, false);
                    }
                }
                Err(e) if io::ErrorKind::NotFound == e.kind() => (),
                Err(e) => return Err(e.into()),
            }
        }

        let suffix = format!("-{}", self.path.display());
        let private = ctx
            .entries_with_prefix(PRIVATE_PREFIX)
            .filter_map(|(key, value)| {
                key.get(PRIVATE_PREFIX.len()..)
                    .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                    .map(|name| (name.to_owned(), value.to_owned()))
            })
            .collect::<Vec<_>>();
        for (name, value) in private {
            self.init_sequence(&name, &value, true);
        }

        Ok(())
    }

    /// Merge one stored sequence into the in-memory table.
    ///
    /// Malformed entries are skipped with a warning; the stored sequences
    /// are only a cache and must never make a folder unreadable.
    fn init_sequence(&mut self, name: &str, value: &str, private: bool) {
        let members = match MsgRange::parse(value) {
            Some(members) => members,
            None => {
                warn!(
                    "{}: ignoring malformed sequence {}: {}",
                    self.path.display(),
                    name,
                    value
                );
                return;
            }
        };

        let slot = match self.find_or_create(name, None) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("{}: ignoring sequence: {}", self.path.display(), e);
                return;
            }
        };
        if private {
            self.sequences[slot].private = true;
        }

        if self.is_current_sequence(name) {
            if let Some(n) = members.min() {
                if self.exists(n) {
                    self.curmsg = n;
                }
            }
            return;
        }

        let bit = FIRST_SEQUENCE_BIT + slot;
        for n in members.items(self.hghmsg) {
            if let Some(stats) = self.stats_mut(n) {
                if stats.at(EXISTS) {
                    stats.set(bit);
                }
            }
        }
    }

    /// Write modified sequence state back out.
    ///
    /// Public sequences are written to the sequences file under its lock.
    /// If that lock cannot be obtained or the file cannot be written, the
    /// public sequences are demoted to private and written to the context
    /// instead. Private sequences are written into `ctx`, which the caller
    /// must save in turn.
    ///
    /// Any lock held since `Folder::read` is released.
    pub fn save_sequences(&mut self, ctx: &mut Context) -> Result<(), Error> {
        if !self.flags.contains(FolderFlags::SEQUENCES_MODIFIED) {
            self.seq_lock = None;
            return Ok(());
        }

        let _signals = SignalGuard::block_termination()?;

        if self.config.sequences_file.is_empty() || self.is_read_only() {
            for slot in &mut self.sequences {
                slot.private = true;
            }
        } else if let Err(e) = self.write_public_sequences() {
            warn!(
                "{}: cannot write public sequences, making them private: {}",
                self.sequences_path().display(),
                e
            );
            for slot in &mut self.sequences {
                slot.private = true;
            }
        }
        self.seq_lock = None;

        for ix in 0..self.sequences.len() {
            let name = self.sequences[ix].name.clone();
            let key = self.private_key(&name);
            let list = self.list_sequence(&name).unwrap_or_default();
            if self.sequences[ix].private && !list.is_empty() {
                ctx.replace(&key, &list);
            } else {
                ctx.delete(&key);
            }
        }

        debug!("Saved sequences of {}", self.path.display());
        self.flags.remove(FolderFlags::SEQUENCES_MODIFIED);
        Ok(())
    }

    fn write_public_sequences(&mut self) -> Result<(), Error> {
        let path = self.sequences_path();
        if self.seq_lock.is_none() {
            self.seq_lock = Some(FileLock::acquire(&path, &self.config.lock)?);
        }

        let mut out = String::new();
        for slot in self.sequences.iter().filter(|s| !s.private) {
            let list = self.list_sequence(&slot.name).unwrap_or_default();
            if !list.is_empty() {
                let _ = writeln!(out, "{}: {}", slot.name, list);
            }
        }

        if out.is_empty() {
            fs::remove_file(&path).ignore_not_found()?;
        } else {
            file_ops::spit(&path, 0o600, out.as_bytes())?;
        }
        Ok(())
    }
}

/// Split the text of a sequences file into `(name, value)` pairs.
///
/// Lines starting with whitespace continue the previous value. Lines
/// without a colon are ignored.
fn parse_sequences_file(text: &str) -> Vec<(String, String)> {
    let mut ret: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.starts_with(char::is_whitespace) {
            if let Some(last) = ret.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
            continue;
        }

        if let Some(colon) = line.find(':') {
            ret.push((
                line[..colon].trim().to_owned(),
                line[colon + 1..].trim().to_owned(),
            ));
        }
    }
    ret
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::super::test_prelude::*;
    use super::*;

    #[test]
    fn public_sequences_round_trip() {
        let mut setup = set_up(&[1, 2, 3, 5, 6]);
        setup
            .folder
            .add_to_sequence("todo", &[2, 3, 5], None, false)
            .unwrap();
        setup.folder.set_current(5).unwrap();
        setup.reread();

        let text =
            fs::read_to_string(setup.folder_path().join(".mh_sequences"))
                .unwrap();
        assert_eq!("todo: 2-3 5\ncur: 5\n", text);
        assert_eq!(5, setup.folder.curmsg());
        assert_eq!(Some("2-3 5".to_owned()), setup.folder.list_sequence("todo"));
        assert!(!setup
            .folder
            .flags()
            .contains(FolderFlags::SEQUENCES_MODIFIED));
    }

    #[test]
    fn private_sequences_live_in_context() {
        let mut setup = set_up(&[1, 2, 3]);
        setup
            .folder
            .add_to_sequence("mine", &[1, 3], Some(false), false)
            .unwrap();
        setup.reread();

        let key = format!("atr-mine-{}", setup.folder_path().display());
        assert_eq!(Some("1 3"), setup.ctx.find(&key));
        assert_eq!(Some(true), setup.folder.is_sequence_private("mine"));
        assert_eq!(Some("1 3".to_owned()), setup.folder.list_sequence("mine"));
        assert!(!setup.folder_path().join(".mh_sequences").exists());

        // Making it public moves it out of the context
        setup
            .folder
            .add_to_sequence("mine", &[], Some(true), false)
            .unwrap();
        setup.reread();
        assert_eq!(None, setup.ctx.find(&key));
        assert_eq!(Some(false), setup.folder.is_sequence_private("mine"));
    }

    #[test]
    fn emptied_sequence_is_dropped() {
        let mut setup = set_up(&[1, 2]);
        setup
            .folder
            .add_to_sequence("todo", &[1], None, false)
            .unwrap();
        setup.reread();
        setup
            .folder
            .delete_from_sequence("todo", &[1], None, false)
            .unwrap();
        setup.reread();

        assert!(!setup.folder_path().join(".mh_sequences").exists());
        assert_eq!(None, setup.folder.list_sequence("todo"));
    }

    #[test]
    fn unmodified_save_writes_nothing() {
        let mut setup = set_up(&[1]);
        setup.folder.save_sequences(&mut setup.ctx).unwrap();
        assert!(!setup.folder_path().join(".mh_sequences").exists());
        assert!(!setup.ctx.is_dirty());
    }

    #[test]
    fn stored_state_is_a_cache() {
        let setup = set_up(&[1, 2, 4]);
        fs::write(
            setup.folder_path().join(".mh_sequences"),
            "cur: 3\ntodo: 1-9\n  12\nbad: x-y\n9lives: 1\nno colon here\n",
        )
        .unwrap();

        let folder = Folder::read(
            &setup.folder_path(),
            &StoreConfig::default(),
            &setup.ctx,
            false,
        )
        .unwrap();
        assert_eq!(0, folder.curmsg());
        assert_eq!(Some("1-2 4".to_owned()), folder.list_sequence("todo"));
        assert_eq!(None, folder.list_sequence("bad"));
        assert_eq!(None, folder.list_sequence("9lives"));
    }

    #[test]
    fn public_and_private_merge() {
        let mut setup = set_up(&[1, 2, 3]);
        fs::write(setup.folder_path().join(".mh_sequences"), "todo: 1\n")
            .unwrap();
        let key = format!("atr-todo-{}", setup.folder_path().display());
        setup.ctx.replace(&key, "3");

        let folder = Folder::read(
            &setup.folder_path(),
            &StoreConfig::default(),
            &setup.ctx,
            false,
        )
        .unwrap();
        assert_eq!(1, folder.sequences().len());
        assert_eq!(Some("1 3".to_owned()), folder.list_sequence("todo"));
        assert_eq!(Some(true), folder.is_sequence_private("todo"));
    }

    #[test]
    fn unwritable_sequences_file_demotes() {
        let mut setup = set_up(&[1, 2]);
        // A directory in place of the sequences file cannot be replaced
        fs::create_dir(setup.folder_path().join(".mh_sequences")).unwrap();
        fs::write(setup.folder_path().join(".mh_sequences").join("x"), "")
            .unwrap();

        setup
            .folder
            .add_to_sequence("todo", &[2], None, false)
            .unwrap();
        setup.folder.save_sequences(&mut setup.ctx).unwrap();

        assert_eq!(Some(true), setup.folder.is_sequence_private("todo"));
        let key = format!("atr-todo-{}", setup.folder_path().display());
        assert_eq!(Some("2"), setup.ctx.find(&key));
    }
}
