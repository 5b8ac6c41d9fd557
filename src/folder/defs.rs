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

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::support::bit_vector::BitVector;
use crate::support::error::Error;
use crate::support::lock::FileLock;
use crate::support::store_config::StoreConfig;

/// The message file exists.
pub const EXISTS: usize = 0;
/// The message is part of the current command's selection.
pub const SELECTED: usize = 1;
/// The slot is selected even though no message exists there (only possible
/// under `FolderFlags::ALLOW_NEW`).
pub const SELECT_EMPTY: usize = 2;
/// The message was just added and has not been seen.
pub const SELECT_UNSEEN: usize = 3;
/// Sequence slot `i` is stored in bit `FIRST_SEQUENCE_BIT + i`.
pub const FIRST_SEQUENCE_BIT: usize = 4;

bitflags! {
    pub struct FolderFlags: u32 {
        /// The invoking user cannot write to the folder directory.
        const READONLY = 1 << 0;
        /// Specifiers may name the slot just past the last message.
        const ALLOW_NEW = 1 << 1;
        /// The directory contains files which are not messages and not
        /// otherwise recognised.
        const OTHER_FILES = 1 << 2;
        /// Sequence state has changed since the folder was read.
        const SEQUENCES_MODIFIED = 1 << 3;
    }
}

/// A named sequence and its persistence policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSlot {
    pub(super) name: String,
    /// Kept in the context rather than the folder's sequences file.
    pub(super) private: bool,
}

impl SequenceSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

/// All message and sequence state for one folder.
///
/// `msgstats[i]` holds the status of message `lowoff + i`, for every number
/// in the allocated window `[lowoff, hghoff]`. Whenever the folder contains
/// any messages, `lowoff <= lowmsg <= hghmsg <= hghoff`. All access by
/// message number goes through `stats()` and `stats_mut()`, which return
/// `None` outside the window.
#[derive(Debug)]
pub struct Folder {
    pub(super) path: PathBuf,
    pub(super) config: StoreConfig,
    pub(super) lowmsg: u32,
    pub(super) hghmsg: u32,
    pub(super) nummsg: u32,
    pub(super) curmsg: u32,
    pub(super) lowsel: u32,
    pub(super) hghsel: u32,
    pub(super) numsel: u32,
    pub(super) lowoff: u32,
    pub(super) hghoff: u32,
    pub(super) flags: FolderFlags,
    pub(super) sequences: Vec<SequenceSlot>,
    pub(super) msgstats: Vec<BitVector>,
    /// The sequences file lock, when the folder was read with `lock` set.
    pub(super) seq_lock: Option<FileLock>,
}

impl Folder {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The lowest existing message number, or 0 if there are none.
    pub fn lowmsg(&self) -> u32 {
        self.lowmsg
    }

    /// The highest existing message number, or 0 if there are none.
    pub fn hghmsg(&self) -> u32 {
        self.hghmsg
    }

    pub fn nummsg(&self) -> u32 {
        self.nummsg
    }

    /// The current message, or 0 if there is none.
    pub fn curmsg(&self) -> u32 {
        self.curmsg
    }

    pub fn lowsel(&self) -> u32 {
        self.lowsel
    }

    pub fn hghsel(&self) -> u32 {
        self.hghsel
    }

    pub fn numsel(&self) -> u32 {
        self.numsel
    }

    pub fn lowoff(&self) -> u32 {
        self.lowoff
    }

    pub fn hghoff(&self) -> u32 {
        self.hghoff
    }

    pub fn flags(&self) -> FolderFlags {
        self.flags
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(FolderFlags::READONLY)
    }

    pub fn has_other_files(&self) -> bool {
        self.flags.contains(FolderFlags::OTHER_FILES)
    }

    /// Control whether specifiers may name the slot after the last message.
    pub fn set_allow_new(&mut self, allow: bool) {
        self.flags.set(FolderFlags::ALLOW_NEW, allow);
    }

    /// Return the status bits of message `n`, if `n` is inside the window.
    pub fn stats(&self, n: u32) -> Option<&BitVector> {
        self.index_of(n).map(|ix| &self.msgstats[ix])
    }

    pub(super) fn stats_mut(&mut self, n: u32) -> Option<&mut BitVector> {
        match self.index_of(n) {
            Some(ix) => Some(&mut self.msgstats[ix]),
            None => None,
        }
    }

    fn index_of(&self, n: u32) -> Option<usize> {
        if n >= self.lowoff && n <= self.hghoff {
            Some((n - self.lowoff) as usize)
        } else {
            None
        }
    }

    fn bit(&self, n: u32, bit: usize) -> bool {
        self.stats(n).map_or(false, |s| s.at(bit))
    }

    pub fn exists(&self, n: u32) -> bool {
        self.bit(n, EXISTS)
    }

    pub fn is_selected(&self, n: u32) -> bool {
        self.bit(n, SELECTED)
    }

    pub fn is_select_empty(&self, n: u32) -> bool {
        self.bit(n, SELECT_EMPTY)
    }

    pub fn is_unseen(&self, n: u32) -> bool {
        self.bit(n, SELECT_UNSEEN)
    }

    /// Iterate the existing messages in ascending order.
    pub fn messages<'a>(&'a self) -> impl Iterator<Item = u32> + 'a {
        self.range_where(self.lowmsg, self.hghmsg, EXISTS)
    }

    /// Iterate the selected slots in ascending order.
    ///
    /// This includes an empty slot selected under `ALLOW_NEW`.
    pub fn selected<'a>(&'a self) -> impl Iterator<Item = u32> + 'a {
        self.range_where(self.lowsel, self.hghsel, SELECTED)
    }

    fn range_where<'a>(
        &'a self,
        low: u32,
        high: u32,
        bit: usize,
    ) -> impl Iterator<Item = u32> + 'a {
        let (low, high) = if 0 == low { (1, 0) } else { (low, high) };
        (low..=high).filter(move |&n| self.bit(n, bit))
    }

    /// Add message `n` to the selection, updating the selection bounds.
    ///
    /// Returns false if `n` is outside the window.
    pub(super) fn mark_selected(&mut self, n: u32) -> bool {
        let stats = match self.stats_mut(n) {
            Some(s) => s,
            None => return false,
        };

        if !stats.at(SELECTED) {
            stats.set(SELECTED);
            self.numsel += 1;
            if 0 == self.lowsel || n < self.lowsel {
                self.lowsel = n;
            }
            if n > self.hghsel {
                self.hghsel = n;
            }
        }
        true
    }

    /// Clear the selection entirely.
    pub fn unselect_all(&mut self) {
        for stats in &mut self.msgstats {
            stats.clear(SELECTED);
            stats.clear(SELECT_EMPTY);
        }
        self.lowsel = 0;
        self.hghsel = 0;
        self.numsel = 0;
    }

    /// Recompute `lowmsg`, `hghmsg`, and `nummsg` from the `EXISTS` bits,
    /// and the selection bounds from the `SELECTED` bits.
    pub(super) fn recount(&mut self) {
        let mut lowmsg = 0;
        let mut hghmsg = 0;
        let mut nummsg = 0;
        let mut lowsel = 0;
        let mut hghsel = 0;
        let mut numsel = 0;

        for (ix, stats) in self.msgstats.iter().enumerate() {
            let n = self.lowoff + ix as u32;
            if stats.at(EXISTS) {
                if 0 == lowmsg {
                    lowmsg = n;
                }
                hghmsg = n;
                nummsg += 1;
            }
            if stats.at(SELECTED) {
                if 0 == lowsel {
                    lowsel = n;
                }
                hghsel = n;
                numsel += 1;
            }
        }

        self.lowmsg = lowmsg;
        self.hghmsg = hghmsg;
        self.nummsg = nummsg;
        self.lowsel = lowsel;
        self.hghsel = hghsel;
        self.numsel = numsel;
    }

    /// Return the path of the file holding message `n`.
    pub fn message_path(&self, n: u32) -> PathBuf {
        self.path.join(n.to_string())
    }

    pub(super) fn not_read_only(&self) -> Result<(), Error> {
        if self.is_read_only() {
            Err(Error::ReadOnlyFolder(self.path.clone()))
        } else {
            Ok(())
        }
    }
}
