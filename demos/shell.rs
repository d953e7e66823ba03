//! A thin textual front end over [`tfs::fat::Engine`], reproducing the
//! legacy shell surface and its integer status protocol. Demonstration only
//! — not part of the library's supported API (see `SPEC_FULL.md` §6).

use std::io::{self, Write};

use tfs::error::TfsError;
use tfs::fat::Engine;

const DEFAULT_CONTAINER: &str = "TFSDiskFile";
const DEFAULT_TOTAL_BYTES: u64 = 65535;
const DEFAULT_BLOCK_SIZE: u32 = 128;

fn main() {
    env_logger::init();

    let mut engine = Engine::new();
    let stdin = io::stdin();
    println!("tfs shell. type `help` for commands.");

    loop {
        print!("tfs> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        match cmd {
            "exit" => break,
            "help" => print_help(),
            "mkfs" => report(engine.mkfs(DEFAULT_CONTAINER, DEFAULT_TOTAL_BYTES, DEFAULT_BLOCK_SIZE), "mkfs"),
            "mount" => report(engine.mount(DEFAULT_CONTAINER, DEFAULT_TOTAL_BYTES, DEFAULT_BLOCK_SIZE), "mount"),
            "sync" => report(engine.sync(), "sync"),
            "umount" => report(engine.unmount(), "umount"),
            "prmfs" => match engine.print_memory_state() {
                Ok(s) => print!("{}", s),
                Err(e) => println!("-1 ({})", e),
            },
            "prrfs" => match engine.print_disk_state() {
                Ok(s) => print!("{}", s),
                Err(e) => println!("-1 ({})", e),
            },
            "mkdir" => report(with_path(&rest, |p| engine.mkdir(p)), "mkdir"),
            "rmdir" => report(with_path(&rest, |p| engine.rmdir(p)), "rmdir"),
            "ls" => match with_path(&rest, |p| engine.ls(p)) {
                Ok(entries) => {
                    for e in entries {
                        println!("{}{}", e.name(), if e.is_dir { "/" } else { "" });
                    }
                    println!("0");
                }
                Err(e) => println!("{}", translate(&e, cmd)),
            },
            "create" => report(with_path(&rest, |p| engine.create(p, 0).map(|_| ())), "create"),
            "rm" => report(with_path(&rest, |p| engine.rm(p)), "rm"),
            "rename" => {
                if rest.len() != 2 {
                    println!("usage: rename <path> <new-name>");
                } else {
                    report(engine.rename(rest[0], rest[1]), "rename");
                }
            }
            "cp" => {
                if rest.len() != 2 {
                    println!("usage: cp <src> <dst>");
                } else {
                    report(engine.cp(rest[0], rest[1]), "cp");
                }
            }
            "print" => {
                if rest.len() != 3 {
                    println!("usage: print <path> <pos> <n>");
                    continue;
                }
                let pos: u32 = rest[1].parse().unwrap_or(0);
                let n: u32 = rest[2].parse().unwrap_or(0);
                match engine.print(rest[0], pos, n) {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("{}", translate(&e, cmd)),
                }
            }
            "append" => {
                if rest.len() != 1 {
                    println!("usage: append <path>");
                    continue;
                }
                let mut data = Vec::new();
                loop {
                    let mut input = String::new();
                    if stdin.read_line(&mut input).unwrap_or(0) == 0 {
                        break;
                    }
                    let input = input.trim_end_matches('\n');
                    if input.is_empty() {
                        break;
                    }
                    data.extend_from_slice(input.as_bytes());
                }
                report(engine.append(rest[0], &data), "append");
            }
            _ => println!("unknown command: {:?}", cmd),
        }
    }
}

fn with_path<T>(rest: &[&str], f: impl FnOnce(&str) -> Result<T, TfsError>) -> Result<T, TfsError> {
    match rest.first() {
        Some(p) => f(p),
        None => Err(TfsError::InvalidPath(String::new())),
    }
}

fn report<T>(result: Result<T, TfsError>, op: &str) {
    match result {
        Ok(_) => println!("0"),
        Err(e) => println!("{}", translate(&e, op)),
    }
}

/// Re-encodes a `TfsError` into the legacy integer wire protocol, per the
/// op-specific table in `SPEC_FULL.md` §7. This translation is specific to
/// this textual shell and has no bearing on the library's `Result` API.
fn translate(err: &TfsError, op: &str) -> i32 {
    use TfsError::*;
    match (op, err) {
        ("create", DuplicateEntry(_)) => -2,
        ("rm", NotFound(_)) => -2,
        ("rmdir", DirNotEmpty(_)) => -2,
        ("append", NotFound(_)) => -2,
        ("rename", DuplicateEntry(_)) => -2,
        ("cp", NotFound(_)) => -2,
        ("cp", DuplicateEntry(_)) => -3,
        _ => -1,
    }
}

fn print_help() {
    println!(
        "commands: help, mkfs, mount, sync, prrfs, prmfs, umount, exit,\n\
         mkdir <p>, rmdir <p>, ls <p>|/, create <p>, rm <p>,\n\
         print <p> <pos> <n>, append <p>, cp <src> <dst>, rename <p> <new>"
    );
}
