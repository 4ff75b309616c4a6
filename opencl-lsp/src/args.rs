use std::iter::Peekable;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct Args {
    pub display_help: bool,
    pub display_version: bool,
    pub verbosity: u64,
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> anyhow::Result<Args> {
        let mut argv = std::env::args().peekable();
        parse_args(&mut argv)
    }
}

pub fn parse_args(argv: &mut Peekable<impl Iterator<Item = String>>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    argv.next(); // skip the program name

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--version" => args.display_version = true,
            "--help" => args.display_help = true,
            "--log-file" => match argv.next() {
                Some(path) => args.log_file = Some(path.into()),
                None => anyhow::bail!("--log-file must specify a path to write"),
            },
            arg if arg.starts_with("--") => {
                anyhow::bail!("unexpected double dash argument: {}", arg)
            }
            arg if arg.starts_with('-') => {
                for chr in arg.get(1..).unwrap().chars() {
                    match chr {
                        'v' => args.verbosity += 1,
                        'V' => args.display_version = true,
                        'h' => args.display_help = true,
                        _ => anyhow::bail!("unexpected short arg {}", chr),
                    }
                }
            }
            _ => anyhow::bail!("unexpected positional argument: {}", arg),
        }
    }

    Ok(args)
}

pub const HELP_TEXT: &str = "\
opencl-lsp

A language server for OpenCL C, speaking LSP over stdin/stdout.

USAGE:
    opencl-lsp [FLAGS]

FLAGS:
    -v, --verbose        Increase logging verbosity (repeatable: -v info, -vv debug, -vvv trace)
        --log-file PATH  Write logs to PATH instead of stderr
        --version        Print the version and exit
        --help           Print this message and exit
";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = std::iter::once("opencl-lsp".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .peekable();
        parse_args(&mut argv).unwrap()
    }

    #[test]
    fn no_flags_is_all_defaults() {
        let args = parse(&[]);
        assert_eq!(args.verbosity, 0);
        assert!(args.log_file.is_none());
        assert!(!args.display_version);
        assert!(!args.display_help);
    }

    #[test]
    fn repeated_short_v_accumulates_verbosity() {
        let args = parse(&["-v"]);
        assert_eq!(args.verbosity, 1);
        let args = parse(&["-vvv"]);
        assert_eq!(args.verbosity, 3);
        let args = parse(&["-v", "-v"]);
        assert_eq!(args.verbosity, 2);
    }

    #[test]
    fn log_file_consumes_the_following_argument() {
        let args = parse(&["--log-file", "/tmp/opencl-lsp.log"]);
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/opencl-lsp.log")));
    }

    #[test]
    fn log_file_without_a_path_is_an_error() {
        let mut argv = vec!["opencl-lsp".to_string(), "--log-file".to_string()]
            .into_iter()
            .peekable();
        assert!(parse_args(&mut argv).is_err());
    }

    #[test]
    fn version_and_help_flags() {
        let args = parse(&["--version"]);
        assert!(args.display_version);
        let args = parse(&["--help"]);
        assert!(args.display_help);
        let args = parse(&["-h"]);
        assert!(args.display_help);
        let args = parse(&["-V"]);
        assert!(args.display_version);
    }

    #[test]
    fn unknown_double_dash_flag_is_rejected() {
        let mut argv = vec!["opencl-lsp".to_string(), "--bogus".to_string()]
            .into_iter()
            .peekable();
        assert!(parse_args(&mut argv).is_err());
    }
}
