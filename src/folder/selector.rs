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

//! Resolution of message specifiers.
//!
//! A specifier is one of:
//!
//! - A message number, or one of the words `first`, `last`, `cur` (or `.`),
//!   `prev`, `next`, and, when the folder allows it, `new`.
//!
//! - A range `A-B` of two of the above, clipped to the existing messages.
//!   `all` is shorthand for `first-last`.
//!
//! - A count `A:n`, `A:+n`, or `A:-n`, meaning up to `n` existing messages
//!   starting at `A` and going forward or backward. Without a sign, the
//!   direction is backward from `last` and `prev` and forward otherwise.
//!
//! - A sequence name, optionally prefixed with the negation marker, and
//!   optionally followed by `:first`, `:last`, `:prev`, `:next`, `:n`,
//!   `:+n`, `:-n` (the first or last `n` members), or `=n`, `=+n`, `=-n`
//!   (only the `n`th member from the start or end).

use log::debug;

use super::defs::*;
use crate::support::error::SelectError;
use crate::support::safe_name::is_valid_sequence_name;

/// One endpoint of a specifier.
#[derive(Clone, Copy, Debug)]
struct Endpoint {
    /// The message number, which may be 0 if the word named no message.
    n: u32,
    /// The default direction of a count starting here.
    backward: bool,
    /// Whether the endpoint is relative to the current message.
    relative: bool,
}

impl Folder {
    /// Select the messages named by `spec`.
    ///
    /// Selections accumulate; callers wanting a fresh selection should call
    /// `unselect_all()` first. Returns the number of slots `spec` matched.
    pub fn select(&mut self, spec: &str) -> Result<u32, SelectError> {
        let count = match self.select_sequence(spec) {
            Some(result) => result?,
            None => self.select_messages(spec)?,
        };

        debug!("{}: {} -> {} messages", self.path.display(), spec, count);
        Ok(count)
    }

    fn select_messages(&mut self, spec: &str) -> Result<u32, SelectError> {
        let allow_new = self.flags.contains(FolderFlags::ALLOW_NEW);
        if allow_new && "new" == spec {
            let n = self
                .hghmsg
                .checked_add(1)
                .ok_or_else(|| SelectError::FolderFull(spec.to_owned()))?;
            return self.select_slot(spec, n);
        }

        let expanded = if "all" == spec { "first-last" } else { spec };
        let (first, rest) = self.endpoint(expanded)?;

        let mut chars = rest.chars();
        match chars.next() {
            None => self.select_single(spec, expanded, first),

            Some('-') => {
                let (last, rest) = self.endpoint(chars.as_str())?;
                if let Some(delimiter) = rest.chars().next() {
                    return Err(SelectError::BadDelimiter {
                        token: spec.to_owned(),
                        delimiter,
                    });
                }
                if last.n < first.n {
                    return Err(SelectError::BadList(spec.to_owned()));
                }

                let lo = first.n.max(self.lowmsg);
                let hi = last.n.min(self.hghmsg);
                let count = if 0 == self.nummsg || 0 == first.n || lo > hi {
                    0
                } else {
                    self.select_range(lo, hi)
                };

                if 0 == count {
                    Err(SelectError::NoneInRange(spec.to_owned()))
                } else {
                    Ok(count)
                }
            }

            Some(':') => {
                let (backward, count) =
                    parse_count(spec, chars.as_str(), first.backward)?;
                if 0 == first.n || 0 == self.nummsg {
                    return Err(SelectError::NoneInRange(spec.to_owned()));
                }

                let start = if backward {
                    first.n.min(self.hghmsg)
                } else {
                    first.n.max(self.lowmsg)
                };
                let picked = if backward {
                    (self.lowmsg..=start)
                        .rev()
                        .filter(|&n| self.exists(n))
                        .take(count as usize)
                        .collect::<Vec<_>>()
                } else {
                    (start..=self.hghmsg)
                        .filter(|&n| self.exists(n))
                        .take(count as usize)
                        .collect::<Vec<_>>()
                };

                if picked.is_empty() {
                    return Err(SelectError::NoneInRange(spec.to_owned()));
                }
                for &n in &picked {
                    self.mark_selected(n);
                }
                Ok(picked.len() as u32)
            }

            Some(delimiter) => Err(SelectError::BadDelimiter {
                token: spec.to_owned(),
                delimiter,
            }),
        }
    }

    fn select_single(
        &mut self,
        spec: &str,
        token: &str,
        at: Endpoint,
    ) -> Result<u32, SelectError> {
        if 0 == at.n {
            return Err(SelectError::NoSuchMessage(token.to_owned()));
        }

        if self.flags.contains(FolderFlags::ALLOW_NEW) {
            let max = self.hghmsg.saturating_add(1);
            if at.n > max {
                return Err(SelectError::OutOfRange {
                    token: spec.to_owned(),
                    max,
                });
            }
            return self.select_slot(spec, at.n);
        }

        if !self.exists(at.n) {
            return Err(if at.relative {
                SelectError::NoSuchMessage(token.to_owned())
            } else {
                SelectError::MessageDoesNotExist(token.to_owned())
            });
        }

        self.mark_selected(at.n);
        Ok(1)
    }

    /// Select slot `n`, which need not hold a message.
    fn select_slot(&mut self, spec: &str, n: u32) -> Result<u32, SelectError> {
        if self.ensure_window(n).is_err() {
            return Err(SelectError::FolderFull(spec.to_owned()));
        }

        self.mark_selected(n);
        if !self.exists(n) {
            if let Some(stats) = self.stats_mut(n) {
                stats.set(SELECT_EMPTY);
            }
        }
        Ok(1)
    }

    fn select_range(&mut self, lo: u32, hi: u32) -> u32 {
        let mut count = 0;
        for n in lo..=hi {
            if self.exists(n) || self.is_select_empty(n) {
                self.mark_selected(n);
                count += 1;
            }
        }
        count
    }

    /// Parse the endpoint at the start of `s`, returning it and whatever
    /// follows it.
    fn endpoint<'a>(
        &self,
        s: &'a str,
    ) -> Result<(Endpoint, &'a str), SelectError> {
        let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if digits > 0 {
            let (num, rest) = s.split_at(digits);
            let n = num.parse::<u32>().map_err(|_| SelectError::OutOfRange {
                token: num.to_owned(),
                max: self.hghmsg,
            })?;
            return Ok((
                Endpoint {
                    n,
                    backward: false,
                    relative: false,
                },
                rest,
            ));
        }

        let word_len = if s.starts_with('.') {
            1
        } else {
            s.find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(s.len())
        };
        let (word, rest) = s.split_at(word_len);
        if word.is_empty() {
            return Err(SelectError::BadList(s.to_owned()));
        }

        let (n, backward, relative) = match word {
            "first" => (self.lowmsg, false, false),
            "last" => (self.hghmsg, true, false),
            "cur" | "." => (self.curmsg, false, true),
            "prev" => (self.prev_message(), true, true),
            "next" => (self.next_message(), false, true),
            "new" if self.flags.contains(FolderFlags::ALLOW_NEW) => {
                (self.hghmsg.saturating_add(1), false, false)
            }
            w if self.is_current_sequence(w) => (self.curmsg, false, true),
            w if is_valid_sequence_name(w) => {
                return Err(SelectError::UnknownSequence(w.to_owned()))
            }
            w => return Err(SelectError::UnknownSpecifier(w.to_owned())),
        };

        Ok((
            Endpoint {
                n,
                backward,
                relative,
            },
            rest,
        ))
    }

    fn prev_message(&self) -> u32 {
        if 0 == self.curmsg {
            return 0;
        }
        (self.lowmsg..self.curmsg)
            .rev()
            .find(|&n| self.exists(n))
            .unwrap_or(0)
    }

    fn next_message(&self) -> u32 {
        if 0 == self.curmsg || self.curmsg >= self.hghmsg {
            return 0;
        }
        (self.curmsg + 1..=self.hghmsg)
            .find(|&n| self.exists(n))
            .unwrap_or(0)
    }

    /// Try to resolve `spec` as a sequence reference.
    ///
    /// Returns `None` if `spec` does not name a known sequence, in which
    /// case it should be interpreted as a message specifier instead.
    fn select_sequence(
        &mut self,
        spec: &str,
    ) -> Option<Result<u32, SelectError>> {
        let negation = &self.config.sequence_negation;
        let negated = if negation.is_empty() {
            None
        } else {
            spec.strip_prefix(negation.as_str())
        };

        // A sequence whose name happens to start with the negation marker
        // is still reachable under its own name
        let (inverted, slot, name, suffix) = negated
            .and_then(|body| self.split_sequence_ref(body))
            .map(|(slot, name, suffix)| (true, slot, name, suffix))
            .or_else(|| {
                self.split_sequence_ref(spec)
                    .map(|(slot, name, suffix)| (false, slot, name, suffix))
            })?;

        let members = self
            .messages()
            .filter(|&n| self.in_sequence(slot, n) != inverted)
            .collect::<Vec<_>>();

        Some(self.select_members(spec, name, inverted, suffix, &members))
    }

    /// Split `body` into a known sequence and its suffix.
    fn split_sequence_ref<'a>(
        &self,
        body: &'a str,
    ) -> Option<(usize, &'a str, &'a str)> {
        let name_len = body
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(body.len());
        let (name, suffix) = body.split_at(name_len);
        if !is_valid_sequence_name(name)
            || self.is_current_sequence(name)
            || !(suffix.is_empty()
                || suffix.starts_with(':')
                || suffix.starts_with('='))
        {
            return None;
        }

        self.sequence_index(name).map(|slot| (slot, name, suffix))
    }

    fn select_members(
        &mut self,
        spec: &str,
        name: &str,
        inverted: bool,
        suffix: &str,
        members: &[u32],
    ) -> Result<u32, SelectError> {
        let empty = || SelectError::EmptySequence {
            name: name.to_owned(),
            inverted,
        };
        let no_such = || SelectError::NoSuchMessage(spec.to_owned());

        let picked: Vec<u32> = match suffix {
            "" => members.to_vec(),
            ":first" => members.first().copied().into_iter().collect(),
            ":last" => members.last().copied().into_iter().collect(),
            ":prev" => {
                let cur = self.curmsg;
                let n = members
                    .iter()
                    .copied()
                    .filter(|&n| n < cur)
                    .last()
                    .ok_or_else(no_such)?;
                vec![n]
            }
            ":next" => {
                let cur = self.curmsg;
                if 0 == cur {
                    return Err(no_such());
                }
                let n = members
                    .iter()
                    .copied()
                    .find(|&n| n > cur)
                    .ok_or_else(no_such)?;
                vec![n]
            }
            _ => {
                let exact = suffix.starts_with('=');
                let (backward, count) =
                    parse_count(spec, &suffix[1..], false)?;
                let count = count as usize;

                if exact {
                    let n = if backward {
                        members.len().checked_sub(count).map(|ix| members[ix])
                    } else {
                        members.get(count - 1).copied()
                    };
                    if members.is_empty() {
                        return Err(empty());
                    }
                    vec![n.ok_or_else(no_such)?]
                } else if backward {
                    members[members.len().saturating_sub(count)..].to_vec()
                } else {
                    members.iter().copied().take(count).collect()
                }
            }
        };

        if picked.is_empty() {
            return Err(empty());
        }

        for &n in &picked {
            self.mark_selected(n);
        }
        Ok(picked.len() as u32)
    }
}

/// Parse the `[+-]n` after a `:` or `=`.
///
/// Returns whether the count runs backward, and the count, which is never
/// zero.
fn parse_count(
    spec: &str,
    s: &str,
    default_backward: bool,
) -> Result<(bool, u32), SelectError> {
    let (backward, digits) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (default_backward, s)
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if 0 == end {
        return Err(SelectError::BadList(spec.to_owned()));
    }
    if let Some(delimiter) = digits[end..].chars().next() {
        return Err(SelectError::BadDelimiter {
            token: spec.to_owned(),
            delimiter,
        });
    }

    match digits[..end].parse::<u32>() {
        Ok(0) | Err(_) => Err(SelectError::BadList(spec.to_owned())),
        Ok(count) => Ok((backward, count)),
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use proptest::prelude::*;

    use super::super::test_prelude::*;
    use super::*;

    fn selected(folder: &Folder) -> Vec<u32> {
        folder.selected().collect()
    }

    fn sel(folder: &mut Folder, spec: &str) -> Result<Vec<u32>, SelectError> {
        folder.unselect_all();
        folder.select(spec)?;
        Ok(selected(folder))
    }

    fn gap_folder() -> Setup {
        let mut setup = set_up(&[1, 2, 3, 5]);
        setup
            .folder
            .add_to_sequence("todo", &[2, 5], None, false)
            .unwrap();
        setup.folder.set_current(3).unwrap();
        setup
    }

    #[test]
    fn numbers_and_ranges() {
        let mut setup = gap_folder();
        let f = &mut setup.folder;

        assert_eq!(Ok(vec![1, 2, 3, 5]), sel(f, "all"));
        assert_eq!(Ok(vec![3, 5]), sel(f, "3-10"));
        assert_eq!(Ok(vec![2]), sel(f, "2"));
        assert_eq!(Ok(vec![3]), sel(f, "cur"));
        assert_eq!(Ok(vec![3]), sel(f, "."));
        assert_eq!(Ok(vec![2]), sel(f, "prev"));
        assert_eq!(Ok(vec![5]), sel(f, "next"));
        assert_eq!(Ok(vec![1]), sel(f, "first"));
        assert_eq!(Ok(vec![5]), sel(f, "last"));
        assert_eq!(Ok(vec![2, 3, 5]), sel(f, "prev-last"));

        assert_eq!(
            Err(SelectError::MessageDoesNotExist("4".to_owned())),
            sel(f, "4")
        );
        assert_eq!(Err(SelectError::BadList("5-2".to_owned())), sel(f, "5-2"));
        assert_eq!(
            Err(SelectError::NoneInRange("6-10".to_owned())),
            sel(f, "6-10")
        );
        assert_eq!(
            Err(SelectError::NoneInRange("4-4".to_owned())),
            sel(f, "4-4")
        );
        assert_eq!(
            Err(SelectError::BadDelimiter {
                token: "2-3x".to_owned(),
                delimiter: 'x',
            }),
            sel(f, "2-3x")
        );
        assert_eq!(
            Err(SelectError::BadDelimiter {
                token: "2/3".to_owned(),
                delimiter: '/',
            }),
            sel(f, "2/3")
        );
        assert_eq!(
            Err(SelectError::UnknownSpecifier("new".to_owned())),
            sel(f, "new")
        );
        assert_eq!(Err(SelectError::BadList("-3".to_owned())), sel(f, "-3"));
    }

    #[test]
    fn all_is_first_to_last() {
        let mut setup = gap_folder();
        let all = sel(&mut setup.folder, "all").unwrap();
        let fl = sel(&mut setup.folder, "first-last").unwrap();
        assert_eq!(all, fl);
    }

    #[test]
    fn counts() {
        let mut setup = gap_folder();
        let f = &mut setup.folder;

        assert_eq!(Ok(vec![1, 2]), sel(f, "first:2"));
        assert_eq!(Ok(vec![3, 5]), sel(f, "last:2"));
        assert_eq!(Ok(vec![3, 5]), sel(f, "cur:2"));
        assert_eq!(Ok(vec![2, 3]), sel(f, "cur:-2"));
        assert_eq!(Ok(vec![1, 2]), sel(f, "2:-10"));
        assert_eq!(Ok(vec![1, 2]), sel(f, "prev:2"));
        assert_eq!(
            Err(SelectError::BadList("cur:0".to_owned())),
            sel(f, "cur:0")
        );
        assert_eq!(
            Err(SelectError::BadList("cur:".to_owned())),
            sel(f, "cur:")
        );
    }

    #[test]
    fn no_current_message() {
        let mut setup = set_up(&[1, 2]);
        let f = &mut setup.folder;
        for word in &["cur", "prev", "next"] {
            assert_eq!(
                Err(SelectError::NoSuchMessage(word.to_string())),
                sel(f, word)
            );
        }
    }

    #[test]
    fn empty_folder() {
        let mut setup = set_up(&[]);
        let f = &mut setup.folder;
        assert_eq!(
            Err(SelectError::NoneInRange("all".to_owned())),
            sel(f, "all")
        );
        assert_eq!(
            Err(SelectError::NoSuchMessage("first".to_owned())),
            sel(f, "first")
        );
    }

    #[test]
    fn sequences() {
        let mut setup = gap_folder();
        let f = &mut setup.folder;

        assert_eq!(Ok(vec![2, 5]), sel(f, "todo"));
        assert_eq!(Ok(vec![2]), sel(f, "todo:first"));
        assert_eq!(Ok(vec![5]), sel(f, "todo:last"));
        assert_eq!(Ok(vec![2]), sel(f, "todo:prev"));
        assert_eq!(Ok(vec![5]), sel(f, "todo:next"));
        assert_eq!(Ok(vec![2]), sel(f, "todo:1"));
        assert_eq!(Ok(vec![2, 5]), sel(f, "todo:+5"));
        assert_eq!(Ok(vec![5]), sel(f, "todo:-1"));
        assert_eq!(Ok(vec![5]), sel(f, "todo=2"));
        assert_eq!(Ok(vec![2]), sel(f, "todo=-2"));
        assert_eq!(
            Err(SelectError::NoSuchMessage("todo=3".to_owned())),
            sel(f, "todo=3")
        );
        assert_eq!(
            Err(SelectError::UnknownSequence("nx".to_owned())),
            sel(f, "nx")
        );
        assert_eq!(
            Err(SelectError::UnknownSequence("nx".to_owned())),
            sel(f, "nx:2")
        );
        assert_eq!(
            Err(SelectError::BadDelimiter {
                token: "todo:1x".to_owned(),
                delimiter: 'x',
            }),
            sel(f, "todo:1x")
        );
        assert_eq!(
            Err(SelectError::BadList("todo:x".to_owned())),
            sel(f, "todo:x")
        );

        f.delete_from_sequence("todo", &[2, 5], None, false).unwrap();
        assert_eq!(
            Err(SelectError::EmptySequence {
                name: "todo".to_owned(),
                inverted: false,
            }),
            sel(f, "todo")
        );
    }

    #[test]
    fn negated_sequences() {
        let mut config = StoreConfig::default();
        config.sequence_negation = "not".to_owned();
        let mut setup = set_up_with(&[1, 2, 3], config);
        let f = &mut setup.folder;
        f.add_to_sequence("todo", &[2], None, false).unwrap();

        assert_eq!(Ok(vec![1, 3]), sel(f, "nottodo"));
        assert_eq!(Ok(vec![3]), sel(f, "nottodo:last"));

        f.add_to_sequence("notes", &[3], None, false).unwrap();
        assert_eq!(Ok(vec![3]), sel(f, "notes"));

        f.add_to_sequence("todo", &[1, 3], None, false).unwrap();
        assert_eq!(
            Err(SelectError::EmptySequence {
                name: "todo".to_owned(),
                inverted: true,
            }),
            sel(f, "nottodo")
        );
    }

    #[test]
    fn allow_new() {
        let mut setup = gap_folder();
        let f = &mut setup.folder;
        f.set_allow_new(true);

        assert_eq!(Ok(vec![6]), sel(f, "new"));
        assert!(f.is_select_empty(6));
        assert_eq!(Ok(vec![4]), sel(f, "4"));
        assert!(f.is_select_empty(4));
        assert_eq!(Ok(vec![6]), sel(f, "6"));
        assert_eq!(
            Err(SelectError::OutOfRange {
                token: "7".to_owned(),
                max: 6,
            }),
            sel(f, "7")
        );
        assert_eq!(Ok(vec![5]), sel(f, "last"));
    }

    #[test]
    fn new_grows_window() {
        let mut config = StoreConfig::default();
        config.window_slack = 0;
        let mut setup = set_up_with(&[1, 2], config);
        let f = &mut setup.folder;
        f.set_allow_new(true);
        assert_eq!(2, f.hghoff());

        assert_eq!(Ok(vec![3]), sel(f, "new"));
        assert!(f.hghoff() >= 3);
    }

    #[test]
    fn folder_full() {
        let setup = set_up(&[]);
        let path = setup.folder_path();
        fs::write(path.join(u32::MAX.to_string()), "").unwrap();
        let mut folder =
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, false)
                .unwrap();
        folder.set_allow_new(true);

        assert_eq!(
            Err(SelectError::FolderFull("new".to_owned())),
            sel(&mut folder, "new")
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn list_then_select_round_trips(
            msgs in prop::collection::btree_set(1u32..200, 1..30),
            members in prop::collection::btree_set(1u32..200, 1..30),
        ) {
            let msgs = msgs.into_iter().collect::<Vec<_>>();
            let mut setup = set_up(&msgs);
            let f = &mut setup.folder;
            let members = members.into_iter()
                .filter(|n| f.exists(*n))
                .collect::<Vec<_>>();
            prop_assume!(!members.is_empty());

            f.add_to_sequence("todo", &members, None, false).unwrap();
            let listed = f.list_sequence("todo").unwrap();

            f.unselect_all();
            for part in listed.split(' ') {
                f.select(part).unwrap();
            }
            prop_assert_eq!(&members, &selected(f));
            prop_assert_eq!(Ok(members.clone()), sel(f, "todo"));
        }

        #[test]
        fn zeroed_delete_is_complement(
            msgs in prop::collection::btree_set(1u32..100, 1..30),
            removed in prop::collection::btree_set(1u32..100, 0..30),
        ) {
            let msgs = msgs.into_iter().collect::<Vec<_>>();
            let mut setup = set_up(&msgs);
            let f = &mut setup.folder;
            let removed = removed.into_iter().collect::<Vec<_>>();

            f.delete_from_sequence("fresh", &removed, None, true).unwrap();
            let expected = msgs.iter().copied()
                .filter(|n| !removed.contains(n))
                .collect::<Vec<_>>();
            let actual = f.sequence_members("fresh").unwrap()
                .items(u32::MAX)
                .collect::<Vec<_>>();
            prop_assert_eq!(expected, actual);
        }
    }
}
