use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::ListMode;
use shared::domain::{CategoryTable, MajorId, WordId};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod session_file;

use commands::App;
use config::{Overrides, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "wordbook", about = "Vocabulary flashcards on a hosted backend")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    supabase_url: Option<String>,
    #[arg(long)]
    anon_key: Option<String>,
    #[arg(long)]
    session_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Study,
    Checked,
    Uploaded,
}

impl From<ModeArg> for ListMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Study => ListMode::Study,
            ModeArg::Checked => ListMode::Checked,
            ModeArg::Uploaded => ListMode::Uploaded,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Prints the browser URL for an OAuth sign-in.
    OauthUrl {
        #[arg(long, default_value = "kakao")]
        provider: String,
        #[arg(long)]
        redirect_to: Option<String>,
    },
    /// Completes an OAuth sign-in from the URL the browser was redirected to.
    OauthCallback { redirect_url: String },
    Logout,
    Whoami,
    List {
        #[arg(long, default_value = "dontknow_word")]
        table: CategoryTable,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Study)]
        mode: ModeArg,
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(long, default_value = "dontknow_word")]
        table: CategoryTable,
        #[arg(long)]
        word: String,
        /// Comma separated, e.g. "이루다, 포함하다".
        #[arg(long)]
        meanings: String,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long)]
        major: Option<String>,
    },
    Check {
        id: WordId,
        #[arg(long, default_value = "dontknow_word")]
        table: CategoryTable,
    },
    Uncheck {
        id: WordId,
        #[arg(long, default_value = "dontknow_word")]
        table: CategoryTable,
    },
    Edit {
        id: WordId,
        #[arg(long, default_value = "dontknow_word")]
        table: CategoryTable,
        #[arg(long)]
        word: Option<String>,
        #[arg(long)]
        meanings: Option<String>,
        #[arg(long, conflicts_with = "clear_comment")]
        comment: Option<String>,
        #[arg(long)]
        clear_comment: bool,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    Delete {
        id: WordId,
        #[arg(long, default_value = "dontknow_word")]
        table: CategoryTable,
    },
    Majors {
        #[command(subcommand)]
        command: MajorsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MajorsCommand {
    List,
    Add { name: String },
    Rename { id: MajorId, name: String },
    Delete { id: MajorId },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(&cli.config);
    settings.apply_overrides(Overrides {
        supabase_url: cli.supabase_url,
        supabase_anon_key: cli.anon_key,
        session_file: cli.session_file,
    });
    let app = App::open(settings)?;

    match cli.command {
        Command::Login { email, password } => app.login(&email, &password).await?,
        Command::Signup { email, password } => app.signup(&email, &password).await?,
        Command::OauthUrl {
            provider,
            redirect_to,
        } => app.oauth_url(&provider, redirect_to.as_deref())?,
        Command::OauthCallback { redirect_url } => app.oauth_callback(&redirect_url).await?,
        Command::Logout => app.logout().await?,
        Command::Whoami => app.whoami().await?,
        Command::List {
            table,
            subject,
            page,
            query,
            mode,
            json,
        } => {
            app.list(commands::ListArgs {
                table,
                subject,
                page,
                query,
                mode: mode.into(),
                json,
            })
            .await?
        }
        Command::Add {
            table,
            word,
            meanings,
            comment,
            major,
        } => {
            app.add(client_core::WordDraft {
                word_en: word,
                meanings,
                comment,
                table,
                major_name: major,
            })
            .await?
        }
        Command::Check { id, table } => app.set_checked(table, id, true).await?,
        Command::Uncheck { id, table } => app.set_checked(table, id, false).await?,
        Command::Edit {
            id,
            table,
            word,
            meanings,
            comment,
            clear_comment,
            major,
            category,
        } => {
            let comment = if clear_comment {
                Some(None)
            } else {
                comment.map(Some)
            };
            app.edit(
                table,
                id,
                commands::EditArgs {
                    word,
                    meanings,
                    comment,
                    major,
                    category,
                },
            )
            .await?
        }
        Command::Delete { id, table } => app.delete(table, id).await?,
        Command::Majors { command } => match command {
            MajorsCommand::List => app.list_majors().await?,
            MajorsCommand::Add { name } => app.add_major(&name).await?,
            MajorsCommand::Rename { id, name } => app.rename_major(id, &name).await?,
            MajorsCommand::Delete { id } => app.delete_major(id).await?,
        },
    }

    Ok(())
}
