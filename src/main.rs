mod backup;
mod categorizer;
mod cli;
mod db;
mod debt;
mod error;
mod fmt;
mod importer;
mod models;
mod reports;
mod reviewer;
mod settings;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{prelude::*, EnvFilter};

use cli::{
    AccountsCommands, BudgetCommands, CategoriesCommands, Cli, Commands, CreditLinesCommands,
    DebtCommands, ExportCommands, RulesCommands, TransactionsCommands, UploadsCommands,
};

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("simplefi=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir, name } => cli::init::run(data_dir, name),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                holder,
                date_col,
                amount_col,
                desc_col,
                date_format,
            } => cli::accounts::add(
                &name,
                holder.as_deref(),
                &date_col,
                &amount_col,
                &desc_col,
                date_format.as_deref(),
            ),
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::Delete { name } => cli::accounts::delete(&name),
        },
        Commands::Classes => cli::categories::classes(),
        Commands::Categories { command } => match command {
            CategoriesCommands::Add { name, class } => cli::categories::add(&name, &class),
            CategoriesCommands::List => cli::categories::list(),
            CategoriesCommands::Delete { name, class } => {
                cli::categories::delete(&name, class.as_deref())
            }
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                class,
                match_type,
                priority,
                min_amount,
                max_amount,
            } => cli::rules::add(
                &pattern,
                &category,
                class.as_deref(),
                &match_type,
                priority,
                min_amount,
                max_amount,
            ),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Import { file, account } => cli::import::run(&file, &account),
        Commands::Classify { all } => cli::classify::run(all),
        Commands::Transactions { command } => match command {
            TransactionsCommands::List {
                account,
                category,
                class,
                from,
                to,
                limit,
            } => cli::transactions::list(
                account.as_deref(),
                category.as_deref(),
                class.as_deref(),
                from.as_deref(),
                to.as_deref(),
                limit,
            ),
            TransactionsCommands::SetCategory {
                id,
                category,
                class,
            } => cli::transactions::set(id, &category, class.as_deref()),
            TransactionsCommands::ClearCategory { id } => cli::transactions::clear(id),
        },
        Commands::Summary {
            class,
            by_class,
            from,
            to,
            months,
        } => cli::summary::run(class.as_deref(), by_class, from.as_deref(), to.as_deref(), months),
        Commands::Unclassified { from, to } => {
            cli::transactions::unclassified(from.as_deref(), to.as_deref())
        }
        Commands::Budget { command } => match command {
            BudgetCommands::Set { class, value } => cli::summary::budget_set(&class, value),
            BudgetCommands::Clear { class } => cli::summary::budget_clear(&class),
            BudgetCommands::List { from, to } => {
                cli::summary::budget_list(from.as_deref(), to.as_deref())
            }
        },
        Commands::Debt { command } => match command {
            DebtCommands::Lines { command } => match command {
                CreditLinesCommands::Add {
                    name,
                    holder,
                    limit,
                    rate,
                    min_pay_pct,
                    min_pay_dlr,
                    annual_fee,
                    statement_day,
                    opened,
                    priority,
                } => cli::debt::add_line(cli::debt::NewCreditLine {
                    name: &name,
                    holder: holder.as_deref(),
                    limit,
                    rate,
                    min_pay_pct,
                    min_pay_dlr,
                    annual_fee,
                    statement_day,
                    opened: opened.as_deref(),
                    priority,
                }),
                CreditLinesCommands::List => cli::debt::list_lines(),
                CreditLinesCommands::Delete { name } => cli::debt::delete_line(&name),
            },
            DebtCommands::Statement {
                line,
                month,
                balance,
            } => cli::debt::statement(&line, &month, balance),
            DebtCommands::Summary { forecast } => cli::debt::summary(forecast),
        },
        Commands::Export { command } => match command {
            ExportCommands::Csv { output } => cli::backup::csv(output),
            ExportCommands::Db { output } => cli::backup::db(output),
            ExportCommands::List => cli::backup::list(),
            ExportCommands::Delete { file } => cli::backup::delete(&file),
        },
        Commands::Restore { file } => cli::backup::restore(&file),
        Commands::Purge { yes } => cli::backup::purge(yes),
        Commands::Uploads { command } => match command {
            UploadsCommands::List => cli::uploads::list(),
            UploadsCommands::Delete { id } => cli::uploads::delete(id),
        },
        Commands::Status => cli::status::run(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "simplefi", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
