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

//! Constants from `sysexits.h`, and the mapping from store errors onto them.
#![allow(dead_code)]

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_OK: Sysexit = Sysexit(0);
pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_OSERR: Sysexit = Sysexit(71);
pub const EX_CANTCREAT: Sysexit = Sysexit(73);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_NOPERM: Sysexit = Sysexit(77);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl From<&Error> for Sysexit {
    fn from(e: &Error) -> Self {
        match *e {
            Error::NoSuchFolder(..) => EX_NOINPUT,
            Error::WindowExcludesMessages { .. }
            | Error::InvalidWindow { .. } => EX_SOFTWARE,
            Error::WindowTooLarge { .. } => EX_DATAERR,
            Error::ReadOnlyFolder(..) => EX_NOPERM,
            Error::NoSuchSequence(..)
            | Error::IllegalSequenceName(..)
            | Error::CurrentNotSingle
            | Error::Select(..) => EX_USAGE,
            Error::MessageExists { .. } => EX_CANTCREAT,
            Error::LockTimeout(..) => EX_TEMPFAIL,
            Error::MalformedContext { .. } => EX_DATAERR,
            Error::Config(..) => EX_CONFIG,
            Error::Io(..) => EX_IOERR,
            Error::Nix(..) => EX_OSERR,
        }
    }
}
