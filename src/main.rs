use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelshelf::logging::init().context("init logging")?;

    let cli = novelshelf::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let mut config = novelshelf::config::Config::from_env().context("load config")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if cli.headed {
        config.headless = false;
    }

    match cli.command {
        novelshelf::cli::Command::Search(args) => {
            novelshelf::commands::search(&config, args)
                .await
                .context("search")?;
        }
        novelshelf::cli::Command::Chapters(args) => {
            novelshelf::commands::chapters(&config, args)
                .await
                .context("chapters")?;
        }
        novelshelf::cli::Command::Read(args) => {
            novelshelf::commands::read(&config, args)
                .await
                .context("read")?;
        }
        novelshelf::cli::Command::Shelf {
            command: novelshelf::cli::ShelfCommand::List,
        } => {
            novelshelf::commands::shelf_list(&config).context("shelf list")?;
        }
        novelshelf::cli::Command::Shelf {
            command: novelshelf::cli::ShelfCommand::Remove(args),
        } => {
            novelshelf::commands::shelf_remove(&config, args).context("shelf remove")?;
        }
    }

    Ok(())
}
