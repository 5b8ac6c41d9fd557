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

use super::defs::*;
use super::model::MsgRange;
use crate::support::error::{Error, SelectError};
use crate::support::safe_name::is_valid_sequence_name;

impl Folder {
    /// The sequences known to this folder, in slot order.
    pub fn sequences(&self) -> &[SequenceSlot] {
        &self.sequences
    }

    /// Return the slot of sequence `name`, if it is known.
    pub fn sequence_index(&self, name: &str) -> Option<usize> {
        self.sequences.iter().position(|s| s.name == name)
    }

    pub fn is_sequence_private(&self, name: &str) -> Option<bool> {
        self.sequence_index(name).map(|ix| self.sequences[ix].private)
    }

    /// Whether message `n` exists and is a member of the sequence in `slot`.
    pub fn in_sequence(&self, slot: usize, n: u32) -> bool {
        self.stats(n).map_or(false, |s| {
            s.at(EXISTS) && s.at(FIRST_SEQUENCE_BIT + slot)
        })
    }

    pub(super) fn is_current_sequence(&self, name: &str) -> bool {
        !self.config.current_sequence.is_empty()
            && name == self.config.current_sequence
    }

    /// Return the slot for `name`, creating it if necessary.
    ///
    /// `public` explicitly sets the persistence policy of the sequence. When
    /// it is `None`, an existing sequence keeps its policy and a new one is
    /// private only if the folder is read-only.
    pub(super) fn find_or_create(
        &mut self,
        name: &str,
        public: Option<bool>,
    ) -> Result<usize, Error> {
        if !is_valid_sequence_name(name) {
            return Err(Error::IllegalSequenceName(name.to_owned()));
        }

        if Some(true) == public {
            self.not_read_only()?;
        }

        let no_public_file = self.config.sequences_file.is_empty();
        match self.sequence_index(name) {
            Some(ix) => {
                if let Some(public) = public {
                    let private = !public || no_public_file;
                    if private != self.sequences[ix].private {
                        self.sequences[ix].private = private;
                        self.flags.insert(FolderFlags::SEQUENCES_MODIFIED);
                    }
                }
                Ok(ix)
            }
            None => {
                let private = match public {
                    Some(public) => !public,
                    None => self.is_read_only(),
                } || no_public_file;
                self.sequences.push(SequenceSlot {
                    name: name.to_owned(),
                    private,
                });
                Ok(self.sequences.len() - 1)
            }
        }
    }

    /// Add the existing messages among `msgs` to sequence `name`.
    ///
    /// If `zero` is set, the sequence is first emptied. Adding to the current
    /// sequence sets the current message, which requires exactly one
    /// existing message.
    pub fn add_to_sequence(
        &mut self,
        name: &str,
        msgs: &[u32],
        public: Option<bool>,
        zero: bool,
    ) -> Result<(), Error> {
        if self.is_current_sequence(name) {
            let existing = msgs
                .iter()
                .copied()
                .filter(|&n| self.exists(n))
                .collect::<Vec<_>>();
            if 1 != existing.len() {
                return Err(Error::CurrentNotSingle);
            }
            self.find_or_create(name, public)?;
            return self.set_current(existing[0]);
        }

        let bit = FIRST_SEQUENCE_BIT + self.find_or_create(name, public)?;
        if zero {
            for stats in &mut self.msgstats {
                stats.clear(bit);
            }
        }

        for &n in msgs {
            if let Some(stats) = self.stats_mut(n) {
                if stats.at(EXISTS) {
                    stats.set(bit);
                }
            }
        }

        self.flags.insert(FolderFlags::SEQUENCES_MODIFIED);
        Ok(())
    }

    /// Remove `msgs` from sequence `name`.
    ///
    /// If `zero` is set, the sequence first becomes every existing message,
    /// so the result is everything except `msgs`; this also creates the
    /// sequence if it is unknown. Otherwise an unknown sequence is an error.
    pub fn delete_from_sequence(
        &mut self,
        name: &str,
        msgs: &[u32],
        public: Option<bool>,
        zero: bool,
    ) -> Result<(), Error> {
        if self.is_current_sequence(name) {
            self.find_or_create(name, public)?;
            if 0 != self.curmsg && msgs.contains(&self.curmsg) {
                self.set_current(0)?;
            }
            return Ok(());
        }

        let slot = match self.sequence_index(name) {
            Some(_) => self.find_or_create(name, public)?,
            None if zero => self.find_or_create(name, public)?,
            None => return Err(Error::NoSuchSequence(name.to_owned())),
        };

        let bit = FIRST_SEQUENCE_BIT + slot;
        if zero {
            for stats in &mut self.msgstats {
                if stats.at(EXISTS) {
                    stats.set(bit);
                } else {
                    stats.clear(bit);
                }
            }
        }

        for &n in msgs {
            if let Some(stats) = self.stats_mut(n) {
                stats.clear(bit);
            }
        }

        self.flags.insert(FolderFlags::SEQUENCES_MODIFIED);
        Ok(())
    }

    fn selected_messages(&self) -> Vec<u32> {
        self.selected().filter(|&n| self.exists(n)).collect()
    }

    /// Add every selected message to sequence `name`.
    pub fn add_selected(
        &mut self,
        name: &str,
        public: Option<bool>,
        zero: bool,
    ) -> Result<(), Error> {
        let msgs = self.selected_messages();
        self.add_to_sequence(name, &msgs, public, zero)
    }

    /// Remove every selected message from sequence `name`.
    pub fn delete_selected(
        &mut self,
        name: &str,
        public: Option<bool>,
        zero: bool,
    ) -> Result<(), Error> {
        let msgs = self.selected_messages();
        self.delete_from_sequence(name, &msgs, public, zero)
    }

    /// Return the existing members of sequence `name`, or `None` if no such
    /// sequence is known.
    ///
    /// The current sequence is never bit-encoded; its sole member is
    /// `curmsg`.
    pub fn sequence_members(&self, name: &str) -> Option<MsgRange> {
        if self.is_current_sequence(name) {
            return Some(if 0 == self.curmsg {
                MsgRange::new()
            } else {
                MsgRange::just(self.curmsg)
            });
        }

        let slot = self.sequence_index(name)?;
        Some(self.messages().filter(|&n| self.in_sequence(slot, n)).collect())
    }

    /// Render sequence `name` in the `3 5-9 12` form.
    pub fn list_sequence(&self, name: &str) -> Option<String> {
        self.sequence_members(name).map(|m| m.to_string())
    }

    /// Make `n` the current message, or clear it if `n` is 0.
    pub fn set_current(&mut self, n: u32) -> Result<(), Error> {
        if 0 != n && !self.exists(n) {
            return Err(SelectError::MessageDoesNotExist(n.to_string()).into());
        }

        if 0 != n && !self.config.current_sequence.is_empty() {
            let name = self.config.current_sequence.clone();
            self.find_or_create(&name, None)?;
        }

        if n != self.curmsg {
            self.curmsg = n;
            self.flags.insert(FolderFlags::SEQUENCES_MODIFIED);
        }
        Ok(())
    }

    /// Reset each previous-sequence to the current selection.
    ///
    /// Nothing happens if nothing is selected.
    pub fn set_previous(&mut self) -> Result<(), Error> {
        let msgs = self.selected_messages();
        if msgs.is_empty() {
            return Ok(());
        }

        for name in self.config.previous_sequences.clone() {
            self.add_to_sequence(&name, &msgs, None, true)?;
        }
        Ok(())
    }

    /// Update the unseen sequences.
    ///
    /// With `add`, messages added as unseen since the folder was read join
    /// every unseen sequence. Otherwise, the selected messages leave every
    /// unseen sequence which exists.
    pub fn set_unseen(&mut self, add: bool) -> Result<(), Error> {
        let msgs = if add {
            self.messages()
                .filter(|&n| self.is_unseen(n))
                .collect::<Vec<_>>()
        } else {
            self.selected_messages()
        };
        if msgs.is_empty() {
            return Ok(());
        }

        for name in self.config.unseen_sequences.clone() {
            if add {
                self.add_to_sequence(&name, &msgs, None, false)?;
            } else if self.sequence_index(&name).is_some() {
                self.delete_from_sequence(&name, &msgs, None, false)?;
            }
        }
        Ok(())
    }
}
