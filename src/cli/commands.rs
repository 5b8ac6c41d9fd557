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

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use log::{info, warn};

use super::main::*;
use crate::context::Context;
use crate::folder::{create_folder, AddOptions, Folder};
use crate::support::error::Error;
use crate::support::hooks::ExternalHooks;
use crate::support::store_config::StoreConfig;
use crate::support::sysexits::EX_USAGE;

fn open_folder(
    ctx: &Context,
    config: &StoreConfig,
    name: Option<&str>,
    lock: bool,
) -> Result<(String, Folder), Error> {
    let name = match name {
        Some(name) => name.trim_start_matches('+').to_owned(),
        None => ctx.current_folder().to_owned(),
    };
    let path = ctx.folder_path(&name);
    let folder = Folder::read(&path, config, ctx, lock)?;
    Ok((name, folder))
}

/// Replace the selection with the messages named by `specs`, or by
/// `default` if there are none.
fn select_specs(
    folder: &mut Folder,
    specs: &[String],
    default: &str,
) -> Result<(), Error> {
    folder.unselect_all();
    if specs.is_empty() {
        folder.select(default)?;
    } else {
        for spec in specs {
            folder.select(spec)?;
        }
    }
    Ok(())
}

fn finish(ctx: &mut Context, mut folder: Folder) -> Result<(), Error> {
    folder.save_sequences(ctx)?;
    ctx.save()
}

fn no_extra_args(args: &[String]) {
    if let Some(arg) = args.first() {
        eprintln!("unexpected argument: {}", arg);
        EX_USAGE.exit();
    }
}

fn summary(
    name: &str,
    nummsg: u32,
    range: (u32, u32),
    curmsg: u32,
    others: bool,
) -> String {
    let mut s = format!("+{} has ", name);
    if 0 == nummsg {
        s.push_str("no messages");
    } else {
        let _ = write!(
            s,
            "{} message{} ({}-{})",
            nummsg,
            if 1 == nummsg { "" } else { "s" },
            range.0,
            range.1
        );
    }
    if 0 != curmsg {
        let _ = write!(s, "; cur={}", curmsg);
    }
    if others {
        s.push_str("; (others)");
    }
    s.push('.');
    s
}

pub(super) fn folder(
    ctx: &mut Context,
    config: &StoreConfig,
    cmd: FolderSubcommand,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let (name, rest) = Session::split_args(cmd.args);
    no_extra_args(&rest);

    let (fname, mut folder) =
        open_folder(ctx, config, name.as_deref(), cmd.pack)?;
    if cmd.pack {
        if folder.has_other_files() {
            warn!("+{} contains files which are not messages", fname);
        }
        folder.pack(&ExternalHooks::new(config.hooks.clone()))?;
    }

    writeln!(
        out,
        "{}",
        summary(
            &fname,
            folder.nummsg(),
            (folder.lowmsg(), folder.hghmsg()),
            folder.curmsg(),
            folder.has_other_files(),
        )
    )?;

    if name.is_some() {
        ctx.set_current_folder(&fname);
    }
    finish(ctx, folder)
}

pub(super) fn mark(
    ctx: &mut Context,
    config: &StoreConfig,
    cmd: MarkSubcommand,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let (name, specs) = Session::split_args(cmd.args);
    let public = if cmd.public {
        Some(true)
    } else if cmd.private {
        Some(false)
    } else {
        None
    };
    let list = cmd.list || (!cmd.add && !cmd.delete && cmd.sequences.is_empty());
    if !list && cmd.sequences.is_empty() {
        eprintln!("--add and --delete need at least one --sequence");
        EX_USAGE.exit();
    }

    let (fname, mut folder) =
        open_folder(ctx, config, name.as_deref(), !list)?;
    if list {
        let names = if cmd.sequences.is_empty() {
            folder
                .sequences()
                .iter()
                .map(|s| s.name().to_owned())
                .collect::<Vec<_>>()
        } else {
            cmd.sequences
        };

        for seq in names {
            let members = folder
                .list_sequence(&seq)
                .ok_or_else(|| Error::NoSuchSequence(seq.clone()))?;
            let private = if Some(true) == folder.is_sequence_private(&seq) {
                " (private)"
            } else {
                ""
            };
            writeln!(out, "{}{}: {}", seq, private, members)?;
        }
    } else {
        select_specs(&mut folder, &specs, "cur")?;
        for seq in &cmd.sequences {
            if cmd.delete {
                folder.delete_selected(seq, public, cmd.zero)?;
            } else {
                folder.add_selected(seq, public, cmd.zero)?;
            }
        }
        folder.set_previous()?;
    }

    if name.is_some() {
        ctx.set_current_folder(&fname);
    }
    finish(ctx, folder)
}

pub(super) fn select(
    ctx: &mut Context,
    config: &StoreConfig,
    cmd: SelectSubcommand,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let (name, specs) = Session::split_args(cmd.args);
    let (_, mut folder) = open_folder(ctx, config, name.as_deref(), true)?;

    select_specs(&mut folder, &specs, "all")?;
    for n in folder.selected() {
        writeln!(out, "{}", n)?;
    }

    folder.set_previous()?;
    finish(ctx, folder)
}

pub(super) fn rmm(
    ctx: &mut Context,
    config: &StoreConfig,
    cmd: RmmSubcommand,
) -> Result<(), Error> {
    let (name, specs) = Session::split_args(cmd.args);
    let (fname, mut folder) = open_folder(ctx, config, name.as_deref(), true)?;

    select_specs(&mut folder, &specs, "cur")?;
    let result =
        folder.remove_selected(&ExternalHooks::new(config.hooks.clone()));

    if name.is_some() {
        ctx.set_current_folder(&fname);
    }
    // Whatever was removed before a failure must still be reflected in the
    // sequences
    let saved = finish(ctx, folder);
    let removed = result?;
    saved?;

    info!("Removed {} from +{}", removed, fname);
    Ok(())
}

pub(super) fn add(
    ctx: &mut Context,
    config: &StoreConfig,
    cmd: AddSubcommand,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let (name, files) = Session::split_args(cmd.args);
    if files.is_empty() {
        eprintln!("no files to add");
        EX_USAGE.exit();
    }

    let fname = match name {
        Some(ref name) => name.trim_start_matches('+').to_owned(),
        None => ctx.current_folder().to_owned(),
    };
    let path = ctx.folder_path(&fname);
    let mut folder = match Folder::read(&path, config, ctx, true) {
        Err(Error::NoSuchFolder(_)) => {
            create_folder(&path, config.folder_mode)?;
            info!("Created folder +{}", fname);
            Folder::read(&path, config, ctx, true)?
        }
        r => r?,
    };

    let hooks = ExternalHooks::new(config.hooks.clone());
    let opts = AddOptions {
        selected: true,
        unseen: cmd.unseen,
        preserve_number: cmd.preserve,
        moving: cmd.move_files,
        from_dir: None,
    };

    let move_files = cmd.move_files;
    folder.unselect_all();
    let mut added = Vec::new();
    let result = files.iter().try_for_each(|file| -> Result<(), Error> {
        let src = PathBuf::from(file);
        let n = folder.add_message(&src, &opts, &hooks)?;
        added.push(n);
        if move_files {
            fs::remove_file(&src)?;
        }
        writeln!(out, "{}", n)?;
        Ok(())
    });

    // Messages filed before a failure stay in the folder, so their sequence
    // memberships are saved either way
    if cmd.unseen {
        folder.set_unseen(true)?;
    }
    if let Some(&n) = added.first() {
        folder.set_current(n)?;
    }
    folder.set_previous()?;

    if name.is_some() {
        ctx.set_current_folder(&fname);
    }
    let saved = finish(ctx, folder);
    result?;
    saved
}
