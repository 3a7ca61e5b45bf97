use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use lantern_savetool::{run, CommandKind};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let command = args[0].as_str();
    let command_args = &args[1..];
    let kind = match command {
        "info" => CommandKind::Info {
            path: single_path(command, command_args)?,
        },
        "verify" => CommandKind::Verify {
            path: single_path(command, command_args)?,
        },
        "thumbnail" => {
            let [path, output] = command_args else {
                return Err("thumbnail requires <save-file> <out.png>".to_string());
            };
            CommandKind::Thumbnail {
                path: PathBuf::from(path),
                output: PathBuf::from(output),
            }
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, &mut io::stdout())
}

fn single_path(command: &str, args: &[String]) -> Result<PathBuf, String> {
    match args {
        [path] => Ok(PathBuf::from(path)),
        _ => Err(format!("{command} requires exactly one save file path")),
    }
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "lantern_savetool - offline save file inspector",
        "",
        "Usage:",
        "  lantern_savetool info <save-file>",
        "  lantern_savetool verify <save-file>",
        "  lantern_savetool thumbnail <save-file> <out.png>",
    ]
    .join("\n")
}
