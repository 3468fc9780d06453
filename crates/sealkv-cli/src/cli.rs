use clap::{Args, Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "sealkv",
    about = "Encrypted and signed values in a key-value store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; prints the version when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Round-trip an encrypted and a signed probe through the configured store.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Write a JSON value under a key.
    Put(PutArgs),
    /// Read a value and print it as JSON.
    Get(GetArgs),
    /// Delete a key.
    Remove {
        key: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PutArgs {
    pub key: String,
    /// JSON document to store.
    pub json: String,
    /// Store a signed (readable) value instead of an encrypted one.
    #[arg(long)]
    pub sign: bool,
    /// Fail without writing if the key already exists.
    #[arg(long)]
    pub exclusive: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GetArgs {
    pub key: String,
    /// Read a signed value and check its signature.
    #[arg(long)]
    pub sign: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_none_when_missing_subcommand() {
        let cli = Cli::try_parse_from(["sealkv"]).expect("parse should succeed");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_health_subcommand() {
        let cli = Cli::try_parse_from(["sealkv", "health"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Health));
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli = Cli::try_parse_from(["sealkv", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Config(ConfigCommand::Init)));
    }

    #[test]
    fn parses_put_with_flags() {
        let cli = Cli::try_parse_from([
            "sealkv",
            "put",
            "foo",
            r#"{"Message":"bar"}"#,
            "--sign",
            "--exclusive",
        ])
        .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Put(PutArgs {
                key: "foo".into(),
                json: r#"{"Message":"bar"}"#.into(),
                sign: true,
                exclusive: true,
            }))
        );
    }

    #[test]
    fn parses_get_and_remove() {
        let cli = Cli::try_parse_from(["sealkv", "get", "foo"]).expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Get(GetArgs {
                key: "foo".into(),
                sign: false,
            }))
        );

        let cli = Cli::try_parse_from(["sealkv", "remove", "foo"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Remove { key: "foo".into() }));
    }

    #[test]
    fn put_requires_a_value() {
        assert!(Cli::try_parse_from(["sealkv", "put", "foo"]).is_err());
    }
}
