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

use log::warn;
use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow, Signal};

use super::error::Error;

/// Defers the termination signals while in scope.
///
/// HUP, INT, QUIT, and TERM are blocked on creation; the previous signal mask
/// is restored on drop, at which point any signal which arrived in the
/// meantime is delivered.
pub struct SignalGuard {
    old: SigSet,
}

impl SignalGuard {
    pub fn block_termination() -> Result<Self, Error> {
        let mut set = SigSet::empty();
        for &sig in &[
            Signal::SIGHUP,
            Signal::SIGINT,
            Signal::SIGQUIT,
            Signal::SIGTERM,
        ] {
            set.add(sig);
        }

        let mut old = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut old))?;
        Ok(SignalGuard { old })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Err(e) = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.old), None)
        {
            warn!("Failed to restore signal mask: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn current_mask() -> SigSet {
        let mut mask = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut mask)).unwrap();
        mask
    }

    #[test]
    fn blocks_and_restores() {
        assert!(!current_mask().contains(Signal::SIGTERM));
        {
            let _guard = SignalGuard::block_termination().unwrap();
            let mask = current_mask();
            assert!(mask.contains(Signal::SIGHUP));
            assert!(mask.contains(Signal::SIGINT));
            assert!(mask.contains(Signal::SIGQUIT));
            assert!(mask.contains(Signal::SIGTERM));
        }
        assert!(!current_mask().contains(Signal::SIGTERM));
    }
}
