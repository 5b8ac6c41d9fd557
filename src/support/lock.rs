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

//! Advisory locking of the context and sequences files.
//!
//! Both locking methods operate on a sibling file named `<target>.lock`
//! rather than on the target itself, since the target is always replaced
//! wholesale by a rename and a lock on the old inode would protect nothing.
//!
//! A lock which cannot be obtained within the configured timeout is either
//! overridden or reported as `Error::LockTimeout`, depending on
//! `LockConfig::on_timeout`.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Instant, SystemTime};

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};

use super::error::Error;
use super::file_ops::IgnoreKinds;
use super::store_config::{LockConfig, LockMethod, TimeoutPolicy};

/// A held lock on some file. The lock is released when this is dropped.
#[derive(Debug)]
pub struct FileLock {
    target: PathBuf,
    held: Held,
}

#[derive(Debug)]
enum Held {
    Dot(PathBuf),
    Fcntl(fs::File),
    /// The lock was overridden without being obtained.
    Nothing,
}

/// Return the path of the lock file guarding `target`.
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_owned())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

impl FileLock {
    /// Lock `target` according to `config`, waiting at most
    /// `config.timeout()`.
    pub fn acquire(target: &Path, config: &LockConfig) -> Result<Self, Error> {
        let held = match config.method {
            LockMethod::Dot => acquire_dot(target, config)?,
            LockMethod::Fcntl => acquire_fcntl(target, config)?,
        };

        debug!("Locked {} ({:?})", target.display(), config.method);
        Ok(FileLock {
            target: target.to_owned(),
            held,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Whether the lock is genuinely held, as opposed to having been
    /// overridden after a timeout.
    pub fn is_held(&self) -> bool {
        !matches!(self.held, Held::Nothing)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Held::Dot(ref path) = self.held {
            if let Err(e) = fs::remove_file(path).ignore_not_found() {
                warn!("Failed to remove lock {}: {}", path.display(), e);
            }
        }
        // Closing the file releases an flock()
    }
}

fn acquire_dot(target: &Path, config: &LockConfig) -> Result<Held, Error> {
    let path = lock_path(target);
    let deadline = Instant::now() + config.timeout();

    loop {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
        {
            Ok(mut f) => {
                // The pid is informational only; nothing parses it.
                let _ = writeln!(f, "{}", nix::unistd::getpid());
                return Ok(Held::Dot(path));
            }
            Err(e) if io::ErrorKind::AlreadyExists == e.kind() => (),
            Err(e) => return Err(e.into()),
        }

        let stale = fs::metadata(&path)
            .and_then(|md| md.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map_or(false, |age| age >= config.timeout());

        if stale || Instant::now() >= deadline {
            if TimeoutPolicy::Reject == config.on_timeout {
                return Err(Error::LockTimeout(target.to_owned()));
            }

            warn!("Overriding lock {}", path.display());
            fs::remove_file(&path).ignore_not_found()?;
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&path)
            {
                Ok(_) => return Ok(Held::Dot(path)),
                // Someone else got in first after the override; proceed
                // without the lock rather than wait indefinitely.
                Err(e) if io::ErrorKind::AlreadyExists == e.kind() => {
                    return Ok(Held::Nothing)
                }
                Err(e) => return Err(e.into()),
            }
        }

        thread::sleep(config.retry_interval());
    }
}

fn acquire_fcntl(target: &Path, config: &LockConfig) -> Result<Held, Error> {
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o600)
        .open(lock_path(target))?;
    let deadline = Instant::now() + config.timeout();

    loop {
        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => return Ok(Held::Fcntl(file)),
            Err(nix::Error::Sys(Errno::EAGAIN))
            | Err(nix::Error::Sys(Errno::EINTR)) => (),
            Err(e) => return Err(e.into()),
        }

        if Instant::now() >= deadline {
            return match config.on_timeout {
                TimeoutPolicy::Reject => {
                    Err(Error::LockTimeout(target.to_owned()))
                }
                TimeoutPolicy::Override => {
                    warn!(
                        "Proceeding without lock on {} after timeout",
                        target.display()
                    );
                    Ok(Held::Nothing)
                }
            };
        }

        thread::sleep(config.retry_interval());
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    fn config(method: LockMethod, on_timeout: TimeoutPolicy) -> LockConfig {
        LockConfig {
            method,
            timeout_secs: 1,
            retry_millis: 10,
            on_timeout,
        }
    }

    #[test]
    fn dot_lock_round_trip() {
        let root = TempDir::new().unwrap();
        let target = root.path().join(".mh_sequences");
        let cfg = config(LockMethod::Dot, TimeoutPolicy::Reject);

        {
            let lock = FileLock::acquire(&target, &cfg).unwrap();
            assert!(lock.is_held());
            assert!(root.path().join(".mh_sequences.lock").is_file());
        }
        assert!(!root.path().join(".mh_sequences.lock").exists());

        // Re-acquirable after release
        FileLock::acquire(&target, &cfg).unwrap();
    }

    #[test]
    fn dot_lock_contention_rejects() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("context");
        let cfg = config(LockMethod::Dot, TimeoutPolicy::Reject);

        let _held = FileLock::acquire(&target, &cfg).unwrap();
        let start = Instant::now();
        assert_matches!(
            Err(Error::LockTimeout(_)),
            FileLock::acquire(&target, &cfg)
        );
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[test]
    fn dot_lock_contention_overrides() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("context");
        let cfg = config(LockMethod::Dot, TimeoutPolicy::Override);

        let held = FileLock::acquire(&target, &cfg).unwrap();
        let stolen = FileLock::acquire(&target, &cfg).unwrap();
        assert!(stolen.is_held());
        drop(stolen);
        // The original holder's release must tolerate the lock file being
        // gone.
        drop(held);
    }

    #[test]
    fn fcntl_lock_contention() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("context");

        let held = FileLock::acquire(
            &target,
            &config(LockMethod::Fcntl, TimeoutPolicy::Reject),
        )
        .unwrap();
        assert!(held.is_held());

        assert_matches!(
            Err(Error::LockTimeout(_)),
            FileLock::acquire(
                &target,
                &config(LockMethod::Fcntl, TimeoutPolicy::Reject)
            )
        );

        let overridden = FileLock::acquire(
            &target,
            &config(LockMethod::Fcntl, TimeoutPolicy::Override),
        )
        .unwrap();
        assert!(!overridden.is_held());

        drop(held);
        assert!(FileLock::acquire(
            &target,
            &config(LockMethod::Fcntl, TimeoutPolicy::Reject)
        )
        .unwrap()
        .is_held());
    }
}
