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
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Error;
use crate::context::Context;

/// The store configuration.
///
/// This is read from `mhstore.toml` in the mail root if that file exists.
/// Every field has a default matching traditional MH behaviour, and the
/// corresponding MH profile entries (see `apply_profile`) take precedence
/// over the file.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The name of the public sequences file within each folder.
    ///
    /// If empty, there are no public sequences at all and every sequence is
    /// kept in the context.
    pub sequences_file: String,
    /// Prefix which inverts a sequence in a message specifier, so that
    /// `!unseen` selects every message not in `unseen`.
    ///
    /// Negation is disabled when this is empty.
    pub sequence_negation: String,
    /// The name of the sequence holding the current message.
    pub current_sequence: String,
    /// Sequences to which newly incorporated unseen messages are added.
    pub unseen_sequences: Vec<String>,
    /// Sequences which are reset to hold each command's selection.
    pub previous_sequences: Vec<String>,
    /// Files in a folder starting with this prefix are ignored. Removed
    /// messages are renamed to carry this prefix under
    /// `DeletePolicy::Backup`.
    pub backup_prefix: String,
    /// The name of the draft link file, which is ignored when scanning.
    pub draft_link: String,
    /// The context key which is a comment and may repeat.
    pub comment_marker: String,
    /// How many slots past the highest message to allocate on scan and on
    /// growth.
    pub window_slack: u32,
    /// The most message slots a folder's status window may span.
    ///
    /// Reading a folder whose messages are spread further apart than this
    /// fails with `Error::WindowTooLarge`, as does growing the window past
    /// it.
    pub max_window: u32,
    pub delete_policy: DeletePolicy,
    /// Permissions for newly created folders.
    pub folder_mode: u32,
    pub lock: LockConfig,
    pub hooks: HookConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            sequences_file: ".mh_sequences".to_owned(),
            sequence_negation: String::new(),
            current_sequence: "cur".to_owned(),
            unseen_sequences: vec!["unseen".to_owned()],
            previous_sequences: vec![],
            backup_prefix: ",".to_owned(),
            draft_link: "@".to_owned(),
            comment_marker: "#".to_owned(),
            window_slack: 100,
            max_window: 1 << 20,
            delete_policy: DeletePolicy::Backup,
            folder_mode: 0o700,
            lock: LockConfig::default(),
            hooks: HookConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Rename `N` to `<backup_prefix>N`.
    Backup,
    /// Unlink the message outright.
    Unlink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMethod {
    /// Exclusive creation of a sibling `<file>.lock`.
    Dot,
    /// `flock()` on the file itself.
    Fcntl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Assume the holder is dead and proceed anyway.
    Override,
    /// Fail with `Error::LockTimeout`.
    Reject,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    pub method: LockMethod,
    /// How long to wait for a lock held by someone else.
    ///
    /// Under dot locking, this is also the age after which an existing lock
    /// file is considered abandoned.
    pub timeout_secs: u64,
    pub retry_millis: u64,
    pub on_timeout: TimeoutPolicy,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            method: LockMethod::Dot,
            timeout_secs: 20,
            retry_millis: 250,
            on_timeout: TimeoutPolicy::Override,
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_millis.max(1))
    }
}

/// External programs run after messages are added, refiled, or removed.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HookConfig {
    pub add_hook: Option<PathBuf>,
    pub ref_hook: Option<PathBuf>,
    pub del_hook: Option<PathBuf>,
}

impl StoreConfig {
    /// Load `mhstore.toml` from `root`, falling back to the defaults if the
    /// file does not exist.
    pub fn load(root: &Path) -> Result<Self, Error> {
        match fs::read_to_string(root.join("mhstore.toml")) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                Ok(StoreConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply the overrides found in the MH profile and context.
    pub fn apply_profile(&mut self, ctx: &Context) {
        if let Some(v) = ctx.find("mh-sequences") {
            self.sequences_file = v.trim().to_owned();
        }
        if let Some(v) = ctx.find("Sequence-Negation") {
            self.sequence_negation = v.trim().to_owned();
        }
        if let Some(v) = ctx.find("Unseen-Sequence") {
            self.unseen_sequences = split_names(v);
        }
        if let Some(v) = ctx.find("Previous-Sequence") {
            self.previous_sequences = split_names(v);
        }
        if let Some(v) = ctx.find("add-hook") {
            self.hooks.add_hook = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = ctx.find("ref-hook") {
            self.hooks.ref_hook = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = ctx.find("del-hook") {
            self.hooks.del_hook = Some(PathBuf::from(v.trim()));
        }
    }
}

fn split_names(v: &str) -> Vec<String> {
    v.split_whitespace().map(str::to_owned).collect()
}
