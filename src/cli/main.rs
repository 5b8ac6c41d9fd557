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

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use structopt::StructOpt;

use super::commands;
use crate::context::Context;
use crate::support::error::Error;
use crate::support::store_config::StoreConfig;
use crate::support::sysexits::*;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
pub(super) enum Command {
    Folder(FolderSubcommand),
    Mark(MarkSubcommand),
    Select(SelectSubcommand),
    Rmm(RmmSubcommand),
    Add(AddSubcommand),
}

/// Show a summary of a folder, optionally packing it.
///
/// If a folder is named, it becomes the current folder.
#[derive(StructOpt)]
pub(super) struct FolderSubcommand {
    /// Renumber the messages to 1 through N, closing any gaps.
    #[structopt(long)]
    pub(super) pack: bool,

    /// The folder, as `+name`.
    pub(super) args: Vec<String>,
}

/// Add messages to, remove messages from, or list sequences.
///
/// With no operation given, messages are added to the named sequences if
/// any are named, and otherwise every sequence is listed. Messages default
/// to `cur` when adding or deleting.
#[derive(StructOpt)]
pub(super) struct MarkSubcommand {
    /// The sequence to operate on. Can be passed multiple times.
    #[structopt(short = "s", long = "sequence", number_of_values(1))]
    pub(super) sequences: Vec<String>,

    /// Add the messages to the sequences.
    #[structopt(long, conflicts_with_all(&["delete", "list"]))]
    pub(super) add: bool,

    /// Delete the messages from the sequences.
    #[structopt(long, conflicts_with = "list")]
    pub(super) delete: bool,

    /// List the sequences.
    #[structopt(long)]
    pub(super) list: bool,

    /// Empty the sequences before adding, or fill them before deleting.
    #[structopt(long)]
    pub(super) zero: bool,

    /// Store the sequences in the folder, visible to everyone.
    #[structopt(long, conflicts_with = "private")]
    pub(super) public: bool,

    /// Store the sequences in your context.
    #[structopt(long)]
    pub(super) private: bool,

    /// The folder, as `+name`, and message specifiers.
    pub(super) args: Vec<String>,
}

/// Print the messages matching the given specifiers.
///
/// The matched messages become the previous sequences. Messages default to
/// `all`.
#[derive(StructOpt)]
pub(super) struct SelectSubcommand {
    /// The folder, as `+name`, and message specifiers.
    pub(super) args: Vec<String>,
}

/// Remove messages from a folder.
///
/// Messages default to `cur`. Removed messages are renamed with the backup
/// prefix or unlinked, according to the configured delete policy.
#[derive(StructOpt)]
pub(super) struct RmmSubcommand {
    /// The folder, as `+name`, and message specifiers.
    pub(super) args: Vec<String>,
}

/// File messages into a folder.
///
/// The folder is created if it does not exist. The first added message
/// becomes current.
#[derive(StructOpt)]
pub(super) struct AddSubcommand {
    /// Keep the message number in each file's name when it is free.
    #[structopt(long)]
    pub(super) preserve: bool,

    /// Add the new messages to the unseen sequences.
    #[structopt(long)]
    pub(super) unseen: bool,

    /// Remove each source file once it has been filed.
    #[structopt(long = "move")]
    pub(super) move_files: bool,

    /// The folder, as `+name`, and the files to add.
    pub(super) args: Vec<String>,
}

/// Everything a command needs from the user's environment.
pub(super) struct Session {
    pub(super) ctx: Context,
    pub(super) config: StoreConfig,
}

impl Session {
    /// Read the profile, configuration, and context.
    ///
    /// The profile is `$MH` or `~/.mh_profile`; the context is `$MHCONTEXT`,
    /// the profile's `context` entry, or `context` in the mail root.
    fn open() -> Result<Self, Error> {
        let home = env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let profile_path = env::var_os("MH")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".mh_profile"));

        let mut ctx = Context::empty(PathBuf::new());
        ctx.read_profile(&profile_path)?;
        let root = ctx.profile_mail_root(&home);
        init_logging(&root);

        let mut config = StoreConfig::load(&root)?;
        let context_path = env::var_os("MHCONTEXT")
            .map(PathBuf::from)
            .or_else(|| ctx.find("context").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("context"));
        let context_path = root.join(context_path);
        ctx.attach(root, context_path, &config)?;
        config.apply_profile(&ctx);

        debug!("Mail root is {}", ctx.mail_root().display());
        Ok(Session { ctx, config })
    }

    /// Split `args` into the `+folder` argument, if any, and the rest.
    pub(super) fn split_args(
        args: Vec<String>,
    ) -> (Option<String>, Vec<String>) {
        let mut folder = None;
        let mut rest = Vec::new();
        for arg in args {
            if arg.starts_with('+') && arg.len() > 1 {
                if folder.is_some() {
                    eprintln!("only one folder at a time!");
                    EX_USAGE.exit();
                }
                folder = Some(arg);
            } else {
                rest.push(arg);
            }
        }
        (folder, rest)
    }
}

fn init_logging(root: &Path) {
    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::default(),
        ) {
            eprintln!(
                "Failed to initialise logging from {}: {}",
                log_config_file.display(),
                e
            );
            crate::init_simple_log();
        }
    } else {
        crate::init_simple_log();
    }
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    let session = match Session::open() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("mhstore: {}", e);
            Sysexit::from(&e).exit()
        }
    };

    let Session { mut ctx, config } = session;
    let mut out = io::stdout();
    let result = match cmd {
        Command::Folder(cmd) => {
            commands::folder(&mut ctx, &config, cmd, &mut out)
        }
        Command::Mark(cmd) => commands::mark(&mut ctx, &config, cmd, &mut out),
        Command::Select(cmd) => {
            commands::select(&mut ctx, &config, cmd, &mut out)
        }
        Command::Rmm(cmd) => commands::rmm(&mut ctx, &config, cmd),
        Command::Add(cmd) => commands::add(&mut ctx, &config, cmd, &mut out),
    };

    if let Err(e) = result {
        eprintln!("mhstore: {}", e);
        Sysexit::from(&e).exit();
    }
}
