mod aggregate;
mod cli;
mod dates;
mod db;
mod error;
mod fmt;
mod importer;
mod listing;
mod models;
mod registry;
mod settings;
mod store;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands, ReportCommands, ReportOutputArgs};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        None => cli::report::dispatch(ReportCommands::Dashboard {
            recent: aggregate::RECENT_ENROLLMENTS,
            out: ReportOutputArgs::default(),
        }),
        Some(command) => match command {
            Commands::Init {
                data_dir,
                center_name,
                currency,
            } => cli::init::run(data_dir, center_name, currency),
            Commands::Load { path } => cli::load::run(&path),
            Commands::Status => cli::status::run(),
            Commands::Add { command } => cli::records::add(command),
            Commands::List { command } => cli::records::list(command),
            Commands::Delete { kind, id } => cli::records::delete(&kind, id),
            Commands::Edit { kind, id, changes } => cli::records::edit(&kind, id, &changes),
            Commands::Settle { id, undo } => cli::records::settle(id, undo),
            Commands::Import { kind, file } => cli::import::run(&kind, &file),
            Commands::Report { command } => cli::report::dispatch(command),
            Commands::Demo => cli::demo::run(),
            Commands::Completions { shell } => {
                clap_complete::generate(shell, &mut Cli::command(), "inventaire", &mut std::io::stdout());
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
