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

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Included, Unbounded};

/// A set of message numbers.
///
/// Internally, this is maintained as a minimal sorted set of inclusive ranges.
/// It does not maintain information on the original fragmentation, ordering,
/// or duplication.
///
/// The `Display` format is the one used in sequence files and the context:
/// single numbers and `A-B` spans, ascending and separated by single spaces,
/// e.g. `3 5-9 12`. An empty set displays as the empty string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MsgRange {
    parts: BTreeMap<u32, u32>,
}

impl MsgRange {
    /// Create a new, empty range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a range containing just the given message.
    pub fn just(n: u32) -> Self {
        let mut this = MsgRange::new();
        this.append(n);
        this
    }

    /// Create a range containing just a single, simple range.
    pub fn range(start: u32, end: u32) -> Self {
        let mut this = MsgRange::new();
        this.insert(start, end);
        this
    }

    /// Append a single message to this range.
    ///
    /// The message must be strictly greater than all others already present.
    pub fn append(&mut self, n: u32) {
        if let Some(end) = self.parts.values_mut().next_back() {
            assert!(n > *end);

            if n == *end + 1 {
                *end = n;
                return;
            }
        }

        self.parts.insert(n, n);
    }

    /// Insert the given inclusive range (which must be in the correct order)
    /// into this set.
    pub fn insert(&mut self, start_incl: u32, mut end_incl: u32) {
        assert!(end_incl >= start_incl);

        // If this range overlaps any later ranges, fuse them.
        loop {
            let following = self
                .parts
                .range((Excluded(start_incl), Unbounded))
                .next()
                .map(|(&start, &end)| (start, end));

            if let Some((following_start, following_end)) = following {
                if following_start - 1 <= end_incl {
                    end_incl = end_incl.max(following_end);
                    self.parts.remove(&following_start);
                    continue;
                }
            }

            break;
        }

        let preceding = self
            .parts
            .range((Unbounded, Included(end_incl)))
            .next_back()
            .map(|(&start, &end)| (start, end));
        if let Some((preceding_start, preceding_end)) = preceding {
            if preceding_end.saturating_add(1) >= start_incl {
                if start_incl < preceding_start {
                    self.parts.remove(&preceding_start);
                    self.parts.insert(start_incl, end_incl.max(preceding_end));
                } else {
                    self.parts
                        .insert(preceding_start, end_incl.max(preceding_end));
                }
                return;
            }
        }

        self.parts.insert(start_incl, end_incl);
    }

    /// Return whether the given message is present in this set.
    pub fn contains(&self, n: u32) -> bool {
        self.parts
            .range(..=n)
            .next_back()
            .filter(|&(_, &end)| end >= n)
            .is_some()
    }

    /// Iterate the messages in this set which are no greater than `max`, in
    /// strictly ascending order.
    pub fn items<'a>(&'a self, max: u32) -> impl Iterator<Item = u32> + 'a {
        self.parts
            .iter()
            .map(|(&start, &end)| (start, end))
            .filter(move |&(start, _)| start <= max)
            .flat_map(move |(start, end)| start..=end.min(max))
    }

    /// Parse the space-separated form.
    ///
    /// Spans given high-to-low are accepted and normalised. Zero is not a
    /// message number and makes the whole input invalid.
    pub fn parse(raw: &str) -> Option<Self> {
        fn num(s: &str) -> Option<u32> {
            s.parse().ok().filter(|&n| n > 0)
        }

        let mut this = Self::new();
        for part in raw.split_whitespace() {
            let mut subs = part.split('-');
            match (subs.next(), subs.next(), subs.next()) {
                (Some(only), None, None) => {
                    let only = num(only)?;
                    this.insert(only, only);
                }
                (Some(start), Some(end), None) => {
                    let start = num(start)?;
                    let end = num(end)?;
                    this.insert(start.min(end), end.max(start));
                }
                _ => return None,
            }
        }

        Some(this)
    }

    /// Return the total number of messages in the set.
    pub fn len(&self) -> usize {
        self.parts
            .iter()
            .map(|(start, end)| (end - start) as usize + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn min(&self) -> Option<u32> {
        self.parts.keys().next().copied()
    }

    pub fn max(&self) -> Option<u32> {
        self.parts.values().next_back().copied()
    }
}

impl fmt::Display for MsgRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (ix, (&start, &end)) in self.parts.iter().enumerate() {
            let delim = if 0 == ix { "" } else { " " };

            if start == end {
                write!(f, "{}{}", delim, start)?;
            } else {
                write!(f, "{}{}-{}", delim, start, end)?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for MsgRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[MsgRange {}]", self)
    }
}

impl std::iter::FromIterator<u32> for MsgRange {
    fn from_iter<I: IntoIterator<Item = u32>>(it: I) -> Self {
        let mut this = MsgRange::new();
        for n in it {
            this.insert(n, n);
        }
        this
    }
}
