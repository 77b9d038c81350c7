//! Start argument filtering
//!
//! Pulls the data path and testnet switches out of a flat argument list
//! so the runner can own them. Everything else passes through untouched
//! and in order.

use std::path::PathBuf;

/// Options the runner extracts from pass-through arguments
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// `-d <path>` / `--datadir <path>`, last one wins
    pub data_path: Option<PathBuf>,
    /// `-t` / `--testnet`
    pub testnet: bool,
}

/// Split `args` into recognized start options and pass-through arguments
///
/// A data path flag without a value is dropped. Arguments after `--`
/// are passed through as-is, including the `--`.
pub fn filter_args(args: &[String]) -> (StartOptions, Vec<String>) {
    let mut options = StartOptions::default();
    let mut remaining = Vec::with_capacity(args.len());
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => {
                remaining.push(arg.clone());
                remaining.extend(iter.by_ref().cloned());
            }
            "-t" | "--testnet" => options.testnet = true,
            "-d" | "--datadir" => {
                if let Some(value) = iter.next_if(|next| !next.starts_with('-')) {
                    options.data_path = Some(PathBuf::from(value));
                }
            }
            other => match inline_data_path(other) {
                Some(value) if !value.is_empty() => {
                    options.data_path = Some(PathBuf::from(value));
                }
                Some(_) => {}
                None => remaining.push(arg.clone()),
            },
        }
    }

    (options, remaining)
}

/// Value of `-d<path>`, `-d=<path>` or `--datadir=<path>`
fn inline_data_path(arg: &str) -> Option<&str> {
    if let Some(value) = arg.strip_prefix("--datadir=") {
        return Some(value);
    }
    let value = arg.strip_prefix("-d")?;
    Some(value.strip_prefix('=').unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_data_path_flag() {
        let (options, remaining) = filter_args(&args(&["-d", "foo"]));
        assert_eq!(options.data_path, Some(PathBuf::from("foo")));
        assert!(remaining.is_empty());
    }

    #[test]
    fn data_path_between_other_args() {
        let (options, remaining) = filter_args(&args(&["x", "-d", "bar", "y"]));
        assert_eq!(options.data_path, Some(PathBuf::from("bar")));
        assert_eq!(remaining, args(&["x", "y"]));

        let (options, remaining) =
            filter_args(&args(&["other", "flag", "-d", "bar", "flag2"]));
        assert_eq!(options.data_path, Some(PathBuf::from("bar")));
        assert_eq!(remaining.join(" "), "other flag flag2");
    }

    #[test]
    fn dangling_data_path_flag() {
        let (options, remaining) = filter_args(&args(&["x", "-d"]));
        assert_eq!(options.data_path, None);
        assert_eq!(remaining, args(&["x"]));

        let (options, remaining) = filter_args(&args(&["flags", "flag2", "-d"]));
        assert_eq!(options.data_path, None);
        assert_eq!(remaining, args(&["flags", "flag2"]));
    }

    #[test]
    fn data_path_flag_does_not_swallow_next_flag() {
        let (options, remaining) = filter_args(&args(&["-d", "-t", "--gateway", "4102"]));
        assert_eq!(options.data_path, None);
        assert!(options.testnet);
        assert_eq!(remaining, args(&["--gateway", "4102"]));
    }

    #[test]
    fn inline_data_path_forms() {
        for form in ["-d/tmp/node", "-d=/tmp/node", "--datadir=/tmp/node"] {
            let (options, remaining) = filter_args(&args(&[form]));
            assert_eq!(options.data_path, Some(PathBuf::from("/tmp/node")), "{form}");
            assert!(remaining.is_empty());
        }

        let (options, _) = filter_args(&args(&["--datadir", "/tmp/long"]));
        assert_eq!(options.data_path, Some(PathBuf::from("/tmp/long")));
    }

    #[test]
    fn testnet_switches() {
        let (options, remaining) = filter_args(&args(&["--testnet", "-v"]));
        assert!(options.testnet);
        assert_eq!(remaining, args(&["-v"]));

        let (options, _) = filter_args(&args(&["-t"]));
        assert!(options.testnet);

        let (options, _) = filter_args(&args(&["--tor"]));
        assert!(!options.testnet);
    }

    #[test]
    fn double_dash_stops_filtering() {
        let (options, remaining) = filter_args(&args(&["a", "--", "-d", "kept", "-t"]));
        assert_eq!(options, StartOptions::default());
        assert_eq!(remaining, args(&["a", "--", "-d", "kept", "-t"]));
    }

    #[test]
    fn unrecognized_args_keep_order() {
        let input = args(&["--disablewallet", "-p", "5", "--storage", "x"]);
        let (_, remaining) = filter_args(&input);
        assert_eq!(remaining, input);
    }
}
