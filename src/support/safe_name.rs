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

/// Names which have fixed meaning in message specifiers and so can never be
/// used as sequence names.
const RESERVED: &[&str] = &["all", "first", "last", "prev", "next", "new"];

/// Determine whether the given name may be used as a sequence name.
///
/// A sequence name must start with an ASCII letter and contain only ASCII
/// letters and digits thereafter, so that it can never be confused with a
/// message number, a range, or a `:`/`=` suffix. The specifier keywords are
/// excluded as well.
pub fn is_valid_sequence_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => (),
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric()) && !RESERVED.contains(&name)
}

/// Parse a directory entry name as a message number.
///
/// Only the canonical decimal form counts: no sign, no leading zeros, and
/// not zero itself. `007` is therefore an "other" file and not message 7,
/// since message 7 would be stored as `7`.
pub fn parse_message_name(name: &str) -> Option<u32> {
    if name.is_empty()
        || name.starts_with('0')
        || !name.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    name.parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_valid_sequence_name() {
        assert!(is_valid_sequence_name("unseen"));
        assert!(is_valid_sequence_name("cur"));
        assert!(is_valid_sequence_name("todo2"));
        assert!(is_valid_sequence_name("L"));
        assert!(!is_valid_sequence_name(""));
        assert!(!is_valid_sequence_name("2do"));
        assert!(!is_valid_sequence_name("to-do"));
        assert!(!is_valid_sequence_name("to do"));
        assert!(!is_valid_sequence_name("seq:next"));
        assert!(!is_valid_sequence_name("all"));
        assert!(!is_valid_sequence_name("first"));
        assert!(!is_valid_sequence_name("new"));
        assert!(!is_valid_sequence_name("wörk"));
    }

    #[test]
    fn test_parse_message_name() {
        assert_eq!(Some(1), parse_message_name("1"));
        assert_eq!(Some(4096), parse_message_name("4096"));
        assert_eq!(None, parse_message_name("0"));
        assert_eq!(None, parse_message_name("007"));
        assert_eq!(None, parse_message_name("+3"));
        assert_eq!(None, parse_message_name(",3"));
        assert_eq!(None, parse_message_name("3.orig"));
        assert_eq!(None, parse_message_name(""));
        assert_eq!(None, parse_message_name("99999999999"));
    }
}
