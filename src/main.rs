use clap::Parser;
use user_records::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::bootstrap()?;

    match cli.command {
        Command::Migrate => cli::migrate::run(&config).await,
        Command::CreateUser(args) => cli::user::create(&config, args).await,
        Command::CheckPassword(args) => cli::user::check_password(&config, args).await,
        Command::ShowUser(args) => cli::user::show(&config, args).await,
    }
}
