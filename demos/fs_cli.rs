//! Non-interactive command dispatcher over a block-device image.
//!
//! `fs_cli <image> <command> [args...]` opens (creating if absent) the
//! image at the given path, runs exactly one command against it, and
//! exits. Mirrors the teacher kernel's command-dispatch shell in spirit,
//! but takes its single command from argv instead of reading an
//! interactive prompt loop.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use blockfs::FileSystem;

fn usage() -> ! {
    eprintln!("Usage: fs_cli <image> <command> [args...]");
    eprintln!("Commands:");
    eprintln!("  format");
    eprintln!("  create <path>        (reads lines from stdin until a blank line)");
    eprintln!("  cat <path>");
    eprintln!("  ls");
    eprintln!("  cp <src> <dst>");
    eprintln!("  mv <src> <dst>");
    eprintln!("  rm <path>");
    eprintln!("  append <src> <dst>");
    eprintln!("  mkdir <path>");
    eprintln!("  cd <path>");
    eprintln!("  pwd");
    eprintln!("  chmod <bits> <path>");
    std::process::exit(2);
}

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let image = match args.next() {
        Some(image) => image,
        None => usage(),
    };
    let command = match args.next() {
        Some(command) => command,
        None => usage(),
    };
    let rest: Vec<String> = args.collect();

    let mut fs = match FileSystem::open(&image) {
        Ok(fs) => fs,
        Err(err) => {
            eprintln!("could not open {image}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = dispatch(&mut fs, &command, &rest);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{command}: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(
    fs: &mut FileSystem<blockfs::FileBlockDevice>,
    command: &str,
    args: &[String],
) -> blockfs::FsResult<()> {
    match (command, args) {
        ("format", []) => fs.format(),
        ("create", [path]) => {
            let stdin = io::stdin();
            let mut lock = stdin.lock();
            fs.create(path, &mut lock)
        }
        ("cat", [path]) => {
            let data = fs.cat(path)?;
            io::stdout().write_all(&data).ok();
            Ok(())
        }
        ("ls", []) => {
            print!("{}", fs.ls()?);
            Ok(())
        }
        ("cp", [src, dst]) => fs.cp(src, dst),
        ("mv", [src, dst]) => fs.mv(src, dst),
        ("rm", [path]) => fs.rm(path),
        ("append", [src, dst]) => fs.append(src, dst),
        ("mkdir", [path]) => fs.mkdir(path),
        ("cd", [path]) => fs.cd(path),
        ("pwd", []) => {
            println!("{}", fs.pwd()?);
            Ok(())
        }
        ("chmod", [bits, path]) => fs.chmod(bits, path),
        _ => usage(),
    }
}
