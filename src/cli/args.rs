//! Command-line argument parsing.

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Print usage
    Help,
    /// Connect and log notifications until Ctrl-C (default)
    Listen,
    /// Ask the server to push a test notification
    Test,
    /// Store a credential pair
    SignIn {
        access_token: String,
        refresh_token: String,
    },
    /// Remove the stored credential
    SignOut,
    /// Unrecognized input
    Invalid(String),
}

pub const USAGE: &str = "\
usage: teamnotify [command]

commands:
  listen                          connect and log notifications until Ctrl-C (default)
  test                            ask the server to push a test notification
  sign-in <access> <refresh>      store a credential pair
  sign-out                        remove the stored credential

options:
  -V, --version                   print version
  -h, --help                      print this help";

/// Parse command-line arguments (including the program name).
///
/// ```
/// use teamnotify::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["teamnotify".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let args: Vec<String> = args.skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        return CliCommand::Version;
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return CliCommand::Help;
    }

    match args.first().map(String::as_str) {
        None | Some("listen") => CliCommand::Listen,
        Some("test") => CliCommand::Test,
        Some("sign-out") => CliCommand::SignOut,
        Some("sign-in") => match (args.get(1), args.get(2)) {
            (Some(access), Some(refresh)) => CliCommand::SignIn {
                access_token: access.clone(),
                refresh_token: refresh.clone(),
            },
            _ => CliCommand::Invalid("sign-in needs an access token and a refresh token".to_string()),
        },
        Some(other) => CliCommand::Invalid(format!("unknown command: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliCommand {
        let mut all = vec!["teamnotify".to_string()];
        all.extend(args.iter().map(|a| a.to_string()));
        parse_args(all.into_iter())
    }

    #[test]
    fn test_parse_version_flag() {
        assert_eq!(parse(&["--version"]), CliCommand::Version);
        assert_eq!(parse(&["listen", "-V"]), CliCommand::Version);
    }

    #[test]
    fn test_parse_no_args_listens() {
        assert_eq!(parse(&[]), CliCommand::Listen);
        assert_eq!(parse(&["listen"]), CliCommand::Listen);
    }

    #[test]
    fn test_parse_test() {
        assert_eq!(parse(&["test"]), CliCommand::Test);
    }

    #[test]
    fn test_parse_sign_in() {
        assert_eq!(
            parse(&["sign-in", "a.b.c", "r"]),
            CliCommand::SignIn {
                access_token: "a.b.c".to_string(),
                refresh_token: "r".to_string(),
            }
        );
        assert!(matches!(parse(&["sign-in", "a.b.c"]), CliCommand::Invalid(_)));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse(&["frobnicate"]),
            CliCommand::Invalid("unknown command: frobnicate".to_string())
        );
    }
}
