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
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use log::{debug, warn};
use nix::unistd::{access, AccessFlags};

use super::defs::*;
use super::realloc::slack_end;
use crate::context::Context;
use crate::support::bit_vector::BitVector;
use crate::support::error::Error;
use crate::support::file_ops::ErrorTransforms;
use crate::support::lock::{lock_path, FileLock};
use crate::support::safe_name::parse_message_name;
use crate::support::store_config::StoreConfig;

impl Folder {
    /// Scan the folder at `path` and load its sequences.
    ///
    /// If `lock` is set and the folder is writable, the sequences file stays
    /// locked from now until the sequences are saved or the folder is
    /// dropped, so that a read-modify-write cycle of the sequences cannot
    /// interleave with another process's.
    ///
    /// A folder which does not exist or cannot be listed yields
    /// `Error::NoSuchFolder`.
    pub fn read(
        path: &Path,
        config: &StoreConfig,
        ctx: &Context,
        lock: bool,
    ) -> Result<Self, Error> {
        let listing = fs::read_dir(path)
            .on_not_found(Error::NoSuchFolder(path.to_owned()))?;

        let seq_lock_name = if config.sequences_file.is_empty() {
            None
        } else {
            lock_path(Path::new(&config.sequences_file))
                .to_str()
                .map(str::to_owned)
        };

        let mut numbers = Vec::new();
        let mut other_files = false;
        for entry in listing {
            let entry = entry?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => {
                    other_files = true;
                    continue;
                }
            };

            if let Some(n) = parse_message_name(name) {
                numbers.push(n);
            } else if name.starts_with('.')
                || (!config.backup_prefix.is_empty()
                    && name.starts_with(&config.backup_prefix))
                || name == config.draft_link
                || name == config.sequences_file
                || Some(name) == seq_lock_name.as_deref()
            {
                continue;
            } else {
                other_files = true;
            }
        }

        let lowmsg = numbers.iter().copied().min().unwrap_or(0);
        let hghmsg = numbers.iter().copied().max().unwrap_or(0);
        let lowoff = lowmsg.max(1);
        if hghmsg >= lowoff && hghmsg - lowoff >= config.max_window {
            return Err(Error::WindowTooLarge {
                lo: lowoff,
                hi: hghmsg,
                max: config.max_window,
            });
        }
        let hghoff = slack_end(config, lowoff, hghmsg).max(lowoff);

        let mut flags = FolderFlags::empty();
        flags.set(FolderFlags::OTHER_FILES, other_files);
        flags.set(
            FolderFlags::READONLY,
            access(path, AccessFlags::W_OK).is_err(),
        );

        let mut folder = Folder {
            path: path.to_owned(),
            config: config.clone(),
            lowmsg,
            hghmsg,
            nummsg: numbers.len() as u32,
            curmsg: 0,
            lowsel: 0,
            hghsel: 0,
            numsel: 0,
            lowoff,
            hghoff,
            flags,
            sequences: Vec::new(),
            msgstats: vec![BitVector::new(); (hghoff - lowoff) as usize + 1],
            seq_lock: None,
        };

        for n in numbers {
            if let Some(stats) = folder.stats_mut(n) {
                stats.set(EXISTS);
            }
        }

        if lock && !folder.is_read_only() && !config.sequences_file.is_empty()
        {
            // Without the lock, saving tries again and makes the sequences
            // private if it still fails
            match FileLock::acquire(&folder.sequences_path(), &config.lock) {
                Ok(seq_lock) => folder.seq_lock = Some(seq_lock),
                Err(e) => warn!(
                    "{}: reading sequences unlocked: {}",
                    path.display(),
                    e
                ),
            }
        }

        folder.read_sequences(ctx)?;

        debug!(
            "Read {}: {} messages in {}-{}, window {}-{}",
            path.display(),
            folder.nummsg,
            folder.lowmsg,
            folder.hghmsg,
            folder.lowoff,
            folder.hghoff,
        );

        Ok(folder)
    }
}

/// Create a new, empty folder at `path`, along with any missing parents.
pub fn create_folder(path: &Path, mode: u32) -> Result<(), Error> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use super::super::test_prelude::*;
    use super::*;
    use crate::support::store_config::{LockConfig, LockMethod, TimeoutPolicy};

    #[test]
    fn scan_with_gap() {
        let setup = set_up(&[1, 2, 3, 5]);
        let folder = &setup.folder;

        assert_eq!(1, folder.lowmsg());
        assert_eq!(5, folder.hghmsg());
        assert_eq!(4, folder.nummsg());
        assert_eq!(1, folder.lowoff());
        assert_eq!(105, folder.hghoff());
        assert_eq!(0, folder.curmsg());
        assert_eq!(vec![1, 2, 3, 5], folder.messages().collect::<Vec<_>>());
        assert!(!folder.exists(4));
        assert!(!folder.has_other_files());
        assert!(!folder.is_read_only());
    }

    #[test]
    fn exists_matches_directory() {
        let setup = set_up(&[7, 9, 40]);
        let folder = &setup.folder;

        for n in folder.lowmsg()..=folder.hghmsg() {
            assert_eq!(
                setup.folder_path().join(n.to_string()).is_file(),
                folder.exists(n),
                "message {}",
                n
            );
        }
        assert_eq!(7, folder.lowoff());
    }

    #[test]
    fn empty_folder() {
        let setup = set_up(&[]);
        let folder = &setup.folder;

        assert_eq!(0, folder.lowmsg());
        assert_eq!(0, folder.hghmsg());
        assert_eq!(0, folder.nummsg());
        assert_eq!(1, folder.lowoff());
        assert_eq!(100, folder.hghoff());
        assert_eq!(0, folder.messages().count());
    }

    #[test]
    fn classify_non_messages() {
        let setup = set_up(&[1]);
        let path = setup.folder_path();
        for name in &[".mh_sequences", ".hidden", ",3", "@", "007", "0"] {
            fs::write(path.join(name), "").unwrap();
        }

        let folder =
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, false)
                .unwrap();
        assert_eq!(vec![1], folder.messages().collect::<Vec<_>>());
        // "007" and "0" are not canonical message names
        assert!(folder.has_other_files());

        fs::remove_file(path.join("007")).unwrap();
        fs::remove_file(path.join("0")).unwrap();
        let folder =
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, false)
                .unwrap();
        assert!(!folder.has_other_files());

        fs::create_dir(path.join("sub")).unwrap();
        let folder =
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, false)
                .unwrap();
        assert!(folder.has_other_files());
    }

    #[test]
    fn visible_sequences_file_is_not_other() {
        let mut config = StoreConfig::default();
        config.sequences_file = "sequences".to_owned();
        let setup = set_up_with(&[1], config.clone());
        let path = setup.folder_path();
        fs::write(path.join("sequences"), "todo: 1\n").unwrap();
        fs::write(path.join("sequences.lock"), "").unwrap();

        let folder = Folder::read(&path, &config, &setup.ctx, false).unwrap();
        assert!(!folder.has_other_files());
    }

    #[test]
    fn missing_folder() {
        let setup = set_up(&[]);
        let nx = setup.root.path().join("nx");
        assert_matches!(
            Err(Error::NoSuchFolder(_)),
            Folder::read(&nx, &StoreConfig::default(), &setup.ctx, false)
        );

        create_folder(&nx.join("sub"), 0o700).unwrap();
        let folder = Folder::read(
            &nx.join("sub"),
            &StoreConfig::default(),
            &setup.ctx,
            false,
        )
        .unwrap();
        assert_eq!(0, folder.nummsg());
    }

    #[test]
    fn locked_read_holds_sequences_lock() {
        let setup = set_up(&[1]);
        let path = setup.folder_path();
        let lock_file: PathBuf = path.join(".mh_sequences.lock");

        let folder =
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, true)
                .unwrap();
        assert!(lock_file.is_file());
        drop(folder);
        assert!(!lock_file.exists());
    }

    #[test]
    fn contended_lock_reads_unlocked() {
        let mut config = StoreConfig::default();
        config.lock = LockConfig {
            method: LockMethod::Dot,
            timeout_secs: 0,
            retry_millis: 10,
            on_timeout: TimeoutPolicy::Reject,
        };
        let mut setup = set_up_with(&[1, 2], config.clone());
        let path = setup.folder_path();
        let seq_path = path.join(".mh_sequences");

        let held = FileLock::acquire(&seq_path, &config.lock).unwrap();
        let mut folder = Folder::read(&path, &config, &setup.ctx, true).unwrap();
        assert_eq!(vec![1, 2], folder.messages().collect::<Vec<_>>());

        folder.add_to_sequence("todo", &[2], None, false).unwrap();
        assert_eq!(Some(false), folder.is_sequence_private("todo"));
        folder.save_sequences(&mut setup.ctx).unwrap();

        assert_eq!(Some(true), folder.is_sequence_private("todo"));
        assert!(!seq_path.exists());
        assert_eq!(
            Some("2"),
            setup
                .ctx
                .find(&format!("atr-todo-{}", path.display()))
        );
        drop(held);
    }

    #[test]
    fn unwritable_folder_is_read_only() {
        if nix::unistd::geteuid().is_root() {
            return;
        }

        let mut setup = set_up(&[1, 2]);
        let path = setup.folder_path();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o500)).unwrap();

        let mut folder =
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, true)
                .unwrap();
        assert!(folder.is_read_only());
        assert!(!path.join(".mh_sequences.lock").exists());

        folder.add_to_sequence("todo", &[1], None, false).unwrap();
        assert_eq!(Some(true), folder.is_sequence_private("todo"));
        assert_matches!(
            Err(Error::ReadOnlyFolder(_)),
            folder.add_to_sequence("todo", &[2], Some(true), false)
        );
        folder.save_sequences(&mut setup.ctx).unwrap();
        assert!(!path.join(".mh_sequences").exists());
        assert_eq!(
            Some("1"),
            setup
                .ctx
                .find(&format!("atr-todo-{}", path.display()))
        );

        fs::set_permissions(&path, fs::Permissions::from_mode(0o700)).unwrap();
    }

    #[test]
    fn sparse_folder_exceeds_window() {
        let setup = set_up(&[1]);
        let path = setup.folder_path();
        fs::write(path.join(u32::MAX.to_string()), "").unwrap();

        assert_matches!(
            Err(Error::WindowTooLarge {
                lo: 1,
                hi: std::u32::MAX,
                ..
            }),
            Folder::read(&path, &StoreConfig::default(), &setup.ctx, false)
        );

        let mut config = StoreConfig::default();
        config.max_window = 10;
        fs::remove_file(path.join(u32::MAX.to_string())).unwrap();
        fs::write(path.join("10"), "").unwrap();
        let folder = Folder::read(&path, &config, &setup.ctx, false).unwrap();
        assert_eq!((1, 10), (folder.lowoff(), folder.hghoff()));

        fs::write(path.join("11"), "").unwrap();
        assert_matches!(
            Err(Error::WindowTooLarge { lo: 1, hi: 11, max: 10 }),
            Folder::read(&path, &config, &setup.ctx, false)
        );
    }
}
