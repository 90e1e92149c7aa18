mod app;

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use app::{init_tracing, run, CliOptions, CommandKind};

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

    let (kind, options) = parse_args(&args)?;
    init_tracing();
    run(kind, options, &mut io::stdout()).map_err(|error| error.to_string())
}

fn parse_args(args: &[String]) -> Result<(CommandKind, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--root" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --root".to_string())?;
                options.root = Some(PathBuf::from(value));
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "status" => {
            if !command_args.is_empty() {
                return Err("status takes no arguments".to_string());
            }
            CommandKind::Status
        }
        "reset" => {
            if !command_args.is_empty() {
                return Err("reset takes no arguments".to_string());
            }
            CommandKind::Reset
        }
        "goto" => match command_args {
            [key] => CommandKind::GoTo { key: key.clone() },
            _ => return Err("goto requires exactly one scene key".to_string()),
        },
        "demo" => {
            let mut max_ticks = None;
            let mut arg_index = 0usize;
            while arg_index < command_args.len() {
                match command_args[arg_index].as_str() {
                    "--max-ticks" => {
                        let value = command_args
                            .get(arg_index + 1)
                            .ok_or_else(|| "missing value for --max-ticks".to_string())?;
                        max_ticks = Some(value.parse::<u64>().map_err(|_| {
                            format!("invalid --max-ticks value '{value}' (expected u64)")
                        })?);
                        arg_index += 2;
                    }
                    other => {
                        return Err(format!(
                            "unknown demo argument '{other}' (expected --max-ticks)"
                        ))
                    }
                }
            }
            CommandKind::Demo { max_ticks }
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    Ok((kind, options))
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "onboarding - scene flow onboarding game",
        "",
        "Usage:",
        "  onboarding [--root <dir>] status",
        "  onboarding [--root <dir>] reset",
        "  onboarding [--root <dir>] goto <scene-key>",
        "  onboarding [--root <dir>] demo [--max-ticks <u64>]",
        "",
        "Defaults:",
        "  --root from SCENE_FLOW_ROOT, else the nearest ancestor of the executable",
        "         containing Cargo.toml and crates/ or assets/",
        "",
        "Logging: RUST_LOG (default info)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_root_before_subcommand() {
        let (kind, options) = parse_args(&args(&["--root", "/tmp/game", "status"])).expect("parse");
        assert_eq!(kind, CommandKind::Status);
        assert_eq!(options.root, Some(PathBuf::from("/tmp/game")));
    }

    #[test]
    fn parses_demo_tick_budget() {
        let (kind, _) = parse_args(&args(&["demo", "--max-ticks", "120"])).expect("parse");
        assert_eq!(kind, CommandKind::Demo { max_ticks: Some(120) });

        let (kind, _) = parse_args(&args(&["demo"])).expect("parse");
        assert_eq!(kind, CommandKind::Demo { max_ticks: None });
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            parse_args(&args(&["demo", "--max-ticks", "soon"])).unwrap_err(),
            "invalid --max-ticks value 'soon' (expected u64)"
        );
        assert_eq!(
            parse_args(&args(&["goto"])).unwrap_err(),
            "goto requires exactly one scene key"
        );
        assert_eq!(
            parse_args(&args(&["--root"])).unwrap_err(),
            "missing value for --root"
        );
        assert_eq!(
            parse_args(&args(&["fly"])).unwrap_err(),
            "unknown subcommand 'fly'"
        );
    }
}
