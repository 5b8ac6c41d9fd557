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

//! The user's profile and context.
//!
//! Both files consist of `Key: value` lines, with values continued onto
//! following lines which start with whitespace. The profile is read-only;
//! the context holds session state such as the current folder and private
//! sequences, and is rewritten in full by `Context::save` when modified.
//!
//! Keys are matched case-insensitively but written back as they were first
//! spelt. Entries keep their insertion order. A key spelt exactly as the
//! configured comment marker is a comment, which may occur any number of
//! times.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::support::error::Error;
use crate::support::file_ops;
use crate::support::lock::FileLock;
use crate::support::signals::SignalGuard;
use crate::support::store_config::{LockConfig, StoreConfig};

lazy_static! {
    static ref RX_ENTRY: Regex =
        Regex::new(r"^([^\s:][^:]*):[ \t]*(.*?)\s*$").unwrap();
}

const DEFAULT_FOLDER: &str = "inbox";
const CURRENT_FOLDER: &str = "Current-Folder";

/// A single line (plus continuations) of a profile or context file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Pair { key: String, value: String },
    Comment(String),
}

/// An insertion-ordered map of entries.
///
/// Each entry is keyed by a monotonically increasing serial; the serial of
/// each `Pair` is indexed by its lower-cased key.
#[derive(Clone, Debug, Default)]
struct Entries {
    next_serial: u64,
    entries: BTreeMap<u64, Entry>,
    index: HashMap<String, u64>,
}

impl Entries {
    fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(&key.to_lowercase())
            .and_then(|serial| self.entries.get(serial))
            .and_then(|entry| match *entry {
                Entry::Pair { ref value, .. } => Some(value.as_str()),
                Entry::Comment(..) => None,
            })
    }

    /// Set `key` to `value`, returning whether anything changed.
    fn set(&mut self, key: &str, value: &str) -> bool {
        let folded = key.to_lowercase();
        if let Some(&serial) = self.index.get(&folded) {
            if let Some(Entry::Pair {
                value: existing, ..
            }) = self.entries.get_mut(&serial)
            {
                if *existing == value {
                    return false;
                }
                *existing = value.to_owned();
                return true;
            }
        }

        let serial = self.push(Entry::Pair {
            key: key.to_owned(),
            value: value.to_owned(),
        });
        self.index.insert(folded, serial);
        true
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.index.remove(&key.to_lowercase()) {
            Some(serial) => self.entries.remove(&serial).is_some(),
            None => false,
        }
    }

    fn push(&mut self, entry: Entry) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.entries.insert(serial, entry);
        serial
    }

    fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}

/// The profile and context of the invoking user.
///
/// This is owned by the top-level driver and passed by reference to anything
/// which needs to consult or modify it.
#[derive(Debug)]
pub struct Context {
    profile: Entries,
    entries: Entries,
    path: PathBuf,
    root: PathBuf,
    comment_marker: String,
    lock: LockConfig,
    dirty: bool,
}

impl Context {
    /// Create a context with no entries which will be saved to `path`.
    ///
    /// The mail root is taken to be the directory containing `path`.
    pub fn empty(path: PathBuf) -> Self {
        let root = path.parent().map(Path::to_owned).unwrap_or_default();
        let defaults = StoreConfig::default();
        Context {
            profile: Entries::default(),
            entries: Entries::default(),
            path,
            root,
            comment_marker: defaults.comment_marker,
            lock: defaults.lock,
            dirty: false,
        }
    }

    /// Load the read-only profile layer from `path`.
    ///
    /// A missing profile is equivalent to an empty one.
    pub fn read_profile(&mut self, path: &Path) -> Result<(), Error> {
        for entry in read_entries(path, &self.comment_marker)? {
            match entry {
                Entry::Pair { key, value } => {
                    self.profile.set(&key, &value);
                }
                e @ Entry::Comment(..) => {
                    self.profile.push(e);
                }
            }
        }
        Ok(())
    }

    /// Return the mail root named by the profile's `Path` entry, relative to
    /// `home`.
    pub fn profile_mail_root(&self, home: &Path) -> PathBuf {
        home.join(self.profile.get("Path").unwrap_or("Mail"))
    }

    /// Bind this context to the context file at `path` beneath mail root
    /// `root`, and load that file.
    pub fn attach(
        &mut self,
        root: PathBuf,
        path: PathBuf,
        config: &StoreConfig,
    ) -> Result<(), Error> {
        self.root = root;
        self.path = path;
        self.comment_marker = config.comment_marker.clone();
        self.lock = config.lock.clone();
        self.entries = Entries::default();
        for entry in read_entries(&self.path, &self.comment_marker)? {
            match entry {
                Entry::Pair { key, value } => {
                    self.entries.set(&key, &value);
                }
                e @ Entry::Comment(..) => {
                    self.entries.push(e);
                }
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Look `key` up, preferring the context over the profile.
    pub fn find(&self, key: &str) -> Option<&str> {
        self.entries.get(key).or_else(|| self.profile.get(key))
    }

    /// Set `key` in the context.
    pub fn replace(&mut self, key: &str, value: &str) {
        if self.entries.set(key, value) {
            self.dirty = true;
        }
    }

    /// Remove `key` from the context, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key);
        self.dirty |= removed;
        removed
    }

    /// Append a comment to the context.
    pub fn add_comment(&mut self, text: &str) {
        self.entries.push(Entry::Comment(text.to_owned()));
        self.dirty = true;
    }

    /// Set `key` in the read-only profile layer.
    ///
    /// Profile entries are never saved.
    pub fn set_profile(&mut self, key: &str, value: &str) {
        self.profile.set(key, value);
    }

    /// Iterate the context entries whose key starts with `prefix`, compared
    /// case-insensitively.
    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let prefix = prefix.to_lowercase();
        self.entries.iter().filter_map(move |entry| match *entry {
            Entry::Pair { ref key, ref value }
                if key.to_lowercase().starts_with(&prefix) =>
            {
                Some((key.as_str(), value.as_str()))
            }
            _ => None,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mail_root(&self) -> &Path {
        &self.root
    }

    /// Resolve a folder name to a directory.
    ///
    /// `+name` and bare `name` are relative to the mail root; absolute names
    /// and names starting with `./` or `../` are used as they are.
    pub fn folder_path(&self, name: &str) -> PathBuf {
        let name = name.strip_prefix('+').unwrap_or(name);
        if name.starts_with('/')
            || name.starts_with("./")
            || name.starts_with("../")
        {
            PathBuf::from(name)
        } else {
            self.root.join(name)
        }
    }

    pub fn current_folder(&self) -> &str {
        self.find(CURRENT_FOLDER).unwrap_or(DEFAULT_FOLDER)
    }

    pub fn set_current_folder(&mut self, name: &str) {
        let name = name.strip_prefix('+').unwrap_or(name);
        self.replace(CURRENT_FOLDER, name);
    }

    /// Write the context back out if it has been modified.
    ///
    /// The termination signals are deferred and the context file is locked
    /// for the duration of the rewrite.
    pub fn save(&mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        let mut out = String::new();
        for entry in self.entries.iter() {
            let (key, value) = match *entry {
                Entry::Pair { ref key, ref value } => (key.as_str(), value),
                Entry::Comment(ref text) => (self.comment_marker.as_str(), text),
            };
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&value.replace('\n', "\n\t"));
            out.push('\n');
        }

        let _signals = SignalGuard::block_termination()?;
        let _lock = FileLock::acquire(&self.path, &self.lock)?;
        file_ops::spit(&self.path, 0o600, out.as_bytes())?;
        debug!("Saved context to {}", self.path.display());
        self.dirty = false;
        Ok(())
    }
}

fn read_entries(path: &Path, comment_marker: &str) -> Result<Vec<Entry>, Error> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if io::ErrorKind::NotFound == e.kind() => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    parse_entries(&text, comment_marker).map_err(|line| {
        Error::MalformedContext {
            path: path.to_owned(),
            line,
        }
    })
}

/// Parse profile text into entries, returning the 1-based line number of
/// the first malformed line on failure.
fn parse_entries(text: &str, comment_marker: &str) -> Result<Vec<Entry>, usize> {
    let mut entries = Vec::<Entry>::new();

    for (ix, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match entries.last_mut() {
                Some(Entry::Pair { value, .. })
                | Some(Entry::Comment(value)) => {
                    value.push('\n');
                    value.push_str(line.trim());
                }
                None => return Err(ix + 1),
            }
            continue;
        }

        let cap = RX_ENTRY.captures(line).ok_or(ix + 1)?;
        let key = cap[1].trim_end();
        let value = cap[2].to_owned();
        if key == comment_marker {
            entries.push(Entry::Comment(value));
        } else {
            entries.push(Entry::Pair {
                key: key.to_owned(),
                value,
            });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    fn attached(root: &TempDir) -> Context {
        let mut ctx = Context::empty(PathBuf::new());
        ctx.attach(
            root.path().to_owned(),
            root.path().join("context"),
            &StoreConfig::default(),
        )
        .unwrap();
        ctx
    }

    #[test]
    fn parse_continuations_and_comments() {
        let entries = parse_entries(
            "Path: Mail\n\
             #: first comment\n\
             \n\
             Alternate-Mailboxes: a@example.com,\n\
             \tb@example.com\n\
             #: second comment\n",
            "#",
        )
        .unwrap();

        assert_eq!(
            vec![
                Entry::Pair {
                    key: "Path".to_owned(),
                    value: "Mail".to_owned(),
                },
                Entry::Comment("first comment".to_owned()),
                Entry::Pair {
                    key: "Alternate-Mailboxes".to_owned(),
                    value: "a@example.com,\nb@example.com".to_owned(),
                },
                Entry::Comment("second comment".to_owned()),
            ],
            entries
        );

        assert_eq!(Err(1), parse_entries(" orphan\n", "#"));
        assert_eq!(Err(2), parse_entries("Path: Mail\nno colon\n", "#"));
    }

    #[test]
    fn context_shadows_profile() {
        let root = TempDir::new().unwrap();
        let mut ctx = attached(&root);
        ctx.set_profile("Unseen-Sequence", "unseen");
        ctx.set_profile("Current-Folder", "drafts");

        assert_eq!(Some("unseen"), ctx.find("unseen-sequence"));
        assert_eq!("drafts", ctx.current_folder());
        assert!(!ctx.is_dirty());

        ctx.set_current_folder("+work");
        assert_eq!("work", ctx.current_folder());
        assert!(ctx.is_dirty());
    }

    #[test]
    fn save_is_dirty_gated_and_ordered() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("context");

        let mut ctx = attached(&root);
        ctx.save().unwrap();
        assert!(!path.exists());

        ctx.replace("Current-Folder", "inbox");
        ctx.add_comment("kept");
        ctx.replace("atr-todo-/mail/inbox", "1-3");
        ctx.add_comment("kept too");
        ctx.replace("current-folder", "work");
        ctx.save().unwrap();
        assert!(!ctx.is_dirty());

        assert_eq!(
            "Current-Folder: work\n\
             #: kept\n\
             atr-todo-/mail/inbox: 1-3\n\
             #: kept too\n",
            fs::read_to_string(&path).unwrap()
        );
        assert!(!root.path().join("context.lock").exists());

        let mut reread = attached(&root);
        assert_eq!(Some("1-3"), reread.find("ATR-todo-/mail/inbox"));
        assert_eq!(4, reread.entries().count());

        assert!(reread.delete("atr-todo-/mail/inbox"));
        assert!(!reread.delete("atr-todo-/mail/inbox"));
        reread.save().unwrap();
        assert_eq!(
            "Current-Folder: work\n#: kept\n#: kept too\n",
            fs::read_to_string(&path).unwrap()
        );
    }

    #[test]
    fn multi_line_values_survive_save() {
        let root = TempDir::new().unwrap();
        let mut ctx = attached(&root);
        ctx.replace("Signature", "line one\nline two");
        ctx.save().unwrap();

        let reread = attached(&root);
        assert_eq!(Some("line one\nline two"), reread.find("signature"));
    }

    #[test]
    fn prefix_iteration() {
        let root = TempDir::new().unwrap();
        let mut ctx = attached(&root);
        ctx.replace("atr-a-/m/inbox", "1");
        ctx.replace("Current-Folder", "inbox");
        ctx.replace("ATR-b-/m/inbox", "2");

        let found = ctx.entries_with_prefix("atr-").collect::<Vec<_>>();
        assert_eq!(
            vec![("atr-a-/m/inbox", "1"), ("ATR-b-/m/inbox", "2")],
            found
        );
    }

    #[test]
    fn folder_names() {
        let root = TempDir::new().unwrap();
        let ctx = attached(&root);
        assert_eq!(root.path().join("inbox"), ctx.folder_path("+inbox"));
        assert_eq!(root.path().join("a/b"), ctx.folder_path("a/b"));
        assert_eq!(
            PathBuf::from("/var/mail/x"),
            ctx.folder_path("+/var/mail/x")
        );
        assert_eq!(PathBuf::from("./local"), ctx.folder_path("./local"));
    }
}
