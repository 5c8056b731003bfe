use admin::{Command, DEFAULT_SERVER};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the snapbooth server
    #[arg(long, env = "SNAPBOOTH_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    admin::run(&args.server, &args.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from(["admin", "delete-media", "m-1"]).unwrap();
        assert_eq!(args.server, DEFAULT_SERVER);
        assert_eq!(args.command, Command::DeleteMedia { id: "m-1".into() });

        let args =
            Args::try_parse_from(["admin", "--server", "http://booth:1111", "reset-spins"]).unwrap();
        assert_eq!(args.server, "http://booth:1111");
        assert_eq!(args.command, Command::ResetSpins);

        assert!(Args::try_parse_from(["admin", "delete-media"]).is_err());
    }
}
