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
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::defs::*;
use super::realloc::slack_end;
use crate::support::error::Error;
use crate::support::file_ops;
use crate::support::hooks::MessageHook;
use crate::support::safe_name::parse_message_name;

/// How `Folder::add_message` files a message.
#[derive(Clone, Debug, Default)]
pub struct AddOptions {
    /// Select the new message.
    pub selected: bool,
    /// Flag the new message for the unseen sequences.
    pub unseen: bool,
    /// Keep the number in the source file's name if it is free.
    pub preserve_number: bool,
    /// The message is being moved from another folder rather than added
    /// fresh, which determines which hook runs.
    pub moving: bool,
    /// The folder the message is being moved from, if `file` is relative
    /// to it.
    pub from_dir: Option<PathBuf>,
}

impl Folder {
    /// Link `file` into this folder as a new message and return its number.
    ///
    /// The file is hard-linked if possible and copied if it lives on
    /// another file system. The window grows as needed.
    pub fn add_message(
        &mut self,
        file: &Path,
        opts: &AddOptions,
        hook: &dyn MessageHook,
    ) -> Result<u32, Error> {
        self.not_read_only()?;

        let source = match opts.from_dir {
            Some(ref dir) => dir.join(file),
            None => file.to_owned(),
        };

        let preserved = if opts.preserve_number {
            file.file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_message_name)
                .filter(|&n| !self.exists(n))
        } else {
            None
        };

        let mut n = match preserved {
            Some(n) => n,
            None if 0 == self.nummsg => 1,
            None => self.hghmsg.checked_add(1).ok_or_else(|| {
                Error::InvalidWindow {
                    lo: self.lowoff,
                    hi: u32::MAX,
                }
            })?,
        };

        loop {
            self.ensure_window(n)?;
            if self.exists(n) {
                n = self.next_candidate(n)?;
                continue;
            }

            let target = self.message_path(n);
            match fs::hard_link(&source, &target) {
                Ok(()) => break,
                Err(e) if io::ErrorKind::AlreadyExists == e.kind() => {
                    if file_ops::same_file(&source, &target) {
                        debug!(
                            "{} is already message {} of {}",
                            source.display(),
                            n,
                            self.path.display()
                        );
                        self.note_added(n, opts);
                        return Ok(n);
                    }

                    // Someone else filed a message here since we scanned
                    if let Some(stats) = self.stats_mut(n) {
                        stats.set(EXISTS);
                    }
                    self.recount();
                    n = self.next_candidate(n)?;
                }
                Err(e) if Some(nix::libc::EXDEV) == e.raw_os_error() => {
                    copy_message(&source, &target).map_err(|e| {
                        if io::ErrorKind::AlreadyExists == e.kind() {
                            Error::MessageExists {
                                folder: self.path.clone(),
                                name: n.to_string(),
                            }
                        } else {
                            e.into()
                        }
                    })?;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.note_added(n, opts);
        info!(
            "Added {} to {} as {}",
            source.display(),
            self.path.display(),
            n
        );

        let target = self.message_path(n);
        if opts.moving {
            hook.refiled(&source, &target);
        } else {
            hook.added(&target);
        }

        Ok(n)
    }

    fn next_candidate(&self, n: u32) -> Result<u32, Error> {
        n.checked_add(1).ok_or_else(|| Error::InvalidWindow {
            lo: self.lowoff,
            hi: u32::MAX,
        })
    }

    /// Grow the window so that it contains `n`, with slack in the direction
    /// of growth.
    pub(super) fn ensure_window(&mut self, n: u32) -> Result<(), Error> {
        if n >= self.lowoff && n <= self.hghoff {
            return Ok(());
        }

        let slack = self.config.window_slack;
        let lo = if n < self.lowoff {
            let floor = self
                .hghoff
                .saturating_sub(self.config.max_window.saturating_sub(1));
            n.saturating_sub(slack).max(floor).min(n).max(1)
        } else {
            self.lowoff
        };
        let hi = if n > self.hghoff {
            slack_end(&self.config, lo, n)
        } else {
            self.hghoff
        };
        self.realloc(lo, hi)
    }

    fn note_added(&mut self, n: u32, opts: &AddOptions) {
        if let Some(stats) = self.stats_mut(n) {
            stats.set(EXISTS);
            if opts.unseen {
                stats.set(SELECT_UNSEEN);
            }
        }

        if opts.selected {
            self.mark_selected(n);
        }
        self.recount();
    }
}

/// Copy `src` to the new file `dst`, keeping the read/write permission bits.
fn copy_message(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = fs::File::open(src)?;
    let mode = input.metadata()?.permissions().mode() & 0o666;
    let mut output = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(dst)?;

    if let Err(e) =
        io::copy(&mut input, &mut output).and_then(|_| output.sync_all())
    {
        let _ = fs::remove_file(dst);
        return Err(e);
    }
    Ok(())
}
