//! Command-line interface

use clap::{Parser, Subcommand};
use common::Secret;

/// Arena API client that keeps the session's tokens fresh.
#[derive(Debug, Parser)]
#[command(name = "arena", version, about, long_about = None)]
pub struct Cli {
    /// Config file (falls back to CONFIG_PATH, then arena.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Sign in and store a fresh token pair
    Login {
        username: String,
        /// Prefer ARENA_PASSWORD; a flag value shows up in the process list
        #[arg(long, env = "ARENA_PASSWORD", hide_env_values = true, value_parser = parse_secret)]
        password: Secret<String>,
    },
    /// Forget the stored tokens
    Logout,
    /// Show whether a session is stored and when its access token expires
    Status,
    /// GET an API path
    Get { path: String },
    /// POST a JSON body to an API path
    Post {
        path: String,
        #[arg(value_parser = parse_json)]
        body: serde_json::Value,
    },
}

fn parse_secret(raw: &str) -> Result<Secret<String>, String> {
    Ok(Secret::from(raw))
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("body must be valid JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("arena").chain(args.iter().copied()))
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_each_command() {
        assert_eq!(
            parse(&["login", "ada", "--password", "pw"]).unwrap().command,
            Command::Login {
                username: "ada".into(),
                password: Secret::from("pw"),
            }
        );
        assert_eq!(parse(&["logout"]).unwrap().command, Command::Logout);
        assert_eq!(parse(&["status"]).unwrap().command, Command::Status);
        assert_eq!(
            parse(&["get", "/api/battles/"]).unwrap().command,
            Command::Get {
                path: "/api/battles/".into()
            }
        );
        assert_eq!(
            parse(&["post", "/api/votes/", r#"{"battle":7}"#])
                .unwrap()
                .command,
            Command::Post {
                path: "/api/votes/".into(),
                body: serde_json::json!({"battle": 7}),
            }
        );
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let cli = parse(&["login", "ada", "--password", "hunter2"]).unwrap();
        assert!(!format!("{cli:?}").contains("hunter2"));
    }

    #[test]
    fn config_flag_before_or_after_command() {
        let cli = parse(&["--config", "/etc/arena.toml", "status"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/arena.toml"));

        let cli = parse(&["status", "--config", "local.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("local.toml"));
        assert_eq!(cli.command, Command::Status);
    }

    #[test]
    fn config_flag_without_value_is_rejected() {
        assert!(parse(&["status", "--config"]).is_err());
    }

    #[test]
    fn unknown_or_incomplete_commands_are_rejected() {
        for args in [&[][..], &["get"][..], &["fly"][..]] {
            assert!(parse(args).is_err(), "{args:?} must not parse");
        }
    }

    #[test]
    fn post_body_must_be_json() {
        let err = parse(&["post", "/api/votes/", "{oops"]).unwrap_err();
        assert!(err.to_string().contains("valid JSON"), "got: {err}");
    }
}
