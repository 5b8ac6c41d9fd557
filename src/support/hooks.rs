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

//! External programs run when messages enter or leave a folder.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use super::store_config::HookConfig;

/// Notification of changes to a folder's message files.
///
/// Hooks cannot fail the operation that triggered them; implementations are
/// expected to report their own problems.
pub trait MessageHook {
    /// `message` was linked or copied into a folder.
    fn added(&self, message: &Path);
    /// `from` was moved into a folder as `message`.
    fn refiled(&self, from: &Path, message: &Path);
    /// `message` is about to be removed from its folder.
    fn removed(&self, message: &Path);
}

/// Hooks which do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl MessageHook for NoHooks {
    fn added(&self, _: &Path) {}
    fn refiled(&self, _: &Path, _: &Path) {}
    fn removed(&self, _: &Path) {}
}

/// Hooks which run the programs named by a `HookConfig`.
#[derive(Clone, Debug, Default)]
pub struct ExternalHooks {
    config: HookConfig,
}

impl ExternalHooks {
    pub fn new(config: HookConfig) -> Self {
        ExternalHooks { config }
    }

    fn run(program: &Option<PathBuf>, args: &[&Path]) {
        let program = match *program {
            Some(ref p) => p,
            None => return,
        };

        debug!("Running hook {} {:?}", program.display(), args);
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => (),
            Ok(status) => {
                warn!("Hook {} exited with {}", program.display(), status)
            }
            Err(e) => warn!("Failed to run hook {}: {}", program.display(), e),
        }
    }
}

impl MessageHook for ExternalHooks {
    fn added(&self, message: &Path) {
        Self::run(&self.config.add_hook, &[message]);
    }

    fn refiled(&self, from: &Path, message: &Path) {
        Self::run(&self.config.ref_hook, &[from, message]);
    }

    fn removed(&self, message: &Path) {
        Self::run(&self.config.del_hook, &[message]);
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn external_hook_receives_paths() {
        let root = TempDir::new().unwrap();
        let script = root.path().join("hook.sh");
        let out = root.path().join("out");
        fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" >> {}\n", out.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .unwrap();

        let hooks = ExternalHooks::new(HookConfig {
            add_hook: Some(script.clone()),
            ref_hook: Some(script),
            del_hook: None,
        });
        hooks.added(Path::new("/mail/inbox/3"));
        hooks.refiled(Path::new("/tmp/x"), Path::new("/mail/inbox/4"));
        // No program configured; must be silent
        hooks.removed(Path::new("/mail/inbox/3"));

        assert_eq!(
            "/mail/inbox/3\n/tmp/x /mail/inbox/4\n",
            fs::read_to_string(&out).unwrap()
        );
    }

    #[test]
    fn missing_program_is_not_fatal() {
        let hooks = ExternalHooks::new(HookConfig {
            add_hook: Some(PathBuf::from("/nonexistent/hook")),
            ..HookConfig::default()
        });
        hooks.added(Path::new("1"));
    }
}
