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

use log::debug;

use super::defs::*;
use crate::support::bit_vector::BitVector;
use crate::support::error::Error;
use crate::support::store_config::StoreConfig;

/// The high end of a window starting at `lo` which reaches `n` plus the
/// configured slack, without the slack taking it past `max_window`.
pub(super) fn slack_end(config: &StoreConfig, lo: u32, n: u32) -> u32 {
    let limit = lo.saturating_add(config.max_window.saturating_sub(1));
    n.saturating_add(config.window_slack).min(limit).max(n)
}

impl Folder {
    /// Resize the status window to exactly `[lo, hi]`.
    ///
    /// The new window must contain every existing message. Status bits of
    /// messages inside both the old and new windows are preserved; slots
    /// which are new to the window start out zeroed, as does every slot
    /// outside `[lowmsg, hghmsg]`.
    pub fn realloc(&mut self, lo: u32, hi: u32) -> Result<(), Error> {
        if lo < 1 || hi < 1 || lo > hi {
            return Err(Error::InvalidWindow { lo, hi });
        }

        if hi - lo >= self.config.max_window {
            return Err(Error::WindowTooLarge {
                lo,
                hi,
                max: self.config.max_window,
            });
        }

        if self.nummsg > 0 && (lo > self.lowmsg || hi < self.hghmsg) {
            return Err(Error::WindowExcludesMessages {
                lo,
                hi,
                lowmsg: self.lowmsg,
                hghmsg: self.hghmsg,
            });
        }

        let len = (hi - lo) as usize + 1;
        if lo == self.lowoff {
            self.msgstats.resize_with(len, BitVector::new);
        } else {
            let mut msgstats = vec![BitVector::new(); len];
            let overlap_lo = lo.max(self.lowoff);
            let overlap_hi = hi.min(self.hghoff);
            if overlap_lo <= overlap_hi {
                for n in overlap_lo..=overlap_hi {
                    msgstats[(n - lo) as usize].copy_from(
                        &self.msgstats[(n - self.lowoff) as usize],
                    );
                }
            }
            self.msgstats = msgstats;
        }

        debug!(
            "{}: window {}-{} -> {}-{}",
            self.path.display(),
            self.lowoff,
            self.hghoff,
            lo,
            hi
        );
        self.lowoff = lo;
        self.hghoff = hi;

        let (lowmsg, hghmsg) = (self.lowmsg, self.hghmsg);
        for (ix, stats) in self.msgstats.iter_mut().enumerate() {
            let n = lo + ix as u32;
            if 0 == self.nummsg || n < lowmsg || n > hghmsg {
                stats.clear_all();
            }
        }

        Ok(())
    }
}
