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

use std::fs;

use log::info;

use super::defs::*;
use super::model::MsgRange;
use super::realloc::slack_end;
use crate::support::error::Error;
use crate::support::file_ops::IgnoreKinds;
use crate::support::hooks::MessageHook;
use crate::support::store_config::DeletePolicy;

impl Folder {
    /// Remove every selected message from the folder.
    ///
    /// Depending on the delete policy, each message file is either renamed
    /// to carry the backup prefix or unlinked. Removed messages lose all
    /// their sequence memberships. If the current message is removed, the
    /// next surviving message becomes current, or failing that the previous
    /// one.
    ///
    /// Returns the messages which were removed. On error, the messages
    /// removed before the failure stay removed.
    pub fn remove_selected(
        &mut self,
        hook: &dyn MessageHook,
    ) -> Result<MsgRange, Error> {
        self.not_read_only()?;

        let victims = self
            .selected()
            .filter(|&n| self.exists(n))
            .collect::<Vec<_>>();
        let mut removed = MsgRange::new();
        let mut result = Ok(());

        for n in victims {
            let path = self.message_path(n);
            hook.removed(&path);

            let res = match self.config.delete_policy {
                DeletePolicy::Backup if !self.config.backup_prefix.is_empty() => {
                    fs::rename(
                        &path,
                        self.path
                            .join(format!("{}{}", self.config.backup_prefix, n)),
                    )
                }
                _ => fs::remove_file(&path),
            }
            .ignore_not_found();

            if let Err(e) = res {
                result = Err(e.into());
                break;
            }

            if let Some(stats) = self.stats_mut(n) {
                stats.clear_all();
            }
            removed.append(n);
        }

        self.unselect_all();
        self.recount();

        if !removed.is_empty() {
            info!("Removed {} from {}", removed, self.path.display());
            if removed.contains(self.curmsg) {
                let old = self.curmsg;
                let next = self
                    .messages()
                    .find(|&n| n > old)
                    .or_else(|| self.messages().filter(|&n| n < old).last())
                    .unwrap_or(0);
                self.curmsg = next;
            }
            self.flags.insert(FolderFlags::SEQUENCES_MODIFIED);
        }

        result.map(|()| removed)
    }

    /// Renumber the messages to `1..=nummsg`, keeping their order.
    ///
    /// Sequence memberships and the current message move along with the
    /// messages, and the window shrinks to fit.
    pub fn pack(&mut self, hook: &dyn MessageHook) -> Result<(), Error> {
        self.not_read_only()?;
        if 0 == self.nummsg {
            return Ok(());
        }

        if self.lowoff > 1 {
            self.realloc(1, self.hghmsg)?;
        }

        let result = self.renumber(hook);
        self.recount();
        self.flags.insert(FolderFlags::SEQUENCES_MODIFIED);
        result?;

        self.realloc(1, slack_end(&self.config, 1, self.hghmsg))
    }

    fn renumber(&mut self, hook: &dyn MessageHook) -> Result<(), Error> {
        let msgs = self.messages().collect::<Vec<_>>();
        for (target, old) in (1..).zip(msgs) {
            if target == old {
                continue;
            }

            let from = self.message_path(old);
            let to = self.message_path(target);
            fs::rename(&from, &to)?;

            let moved = self.stats(old).cloned().unwrap_or_default();
            if let Some(stats) = self.stats_mut(target) {
                stats.copy_from(&moved);
            }
            if let Some(stats) = self.stats_mut(old) {
                stats.clear_all();
            }
            if old == self.curmsg {
                self.curmsg = target;
            }

            hook.refiled(&from, &to);
        }

        Ok(())
    }
}
