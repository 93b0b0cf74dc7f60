use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ims_app::ImsApp;
use ims_auth::FileTokenStore;
use ims_core::models::SearchQuery;
use ims_core::logging::init_logging;
use ims_core::{ImsConfig, ImsError, SiteId};
use ims_forms::{FormController, LoginDraft, LoginField};
use ims_services::SearchOutcome;

/// Command-line client for the Interaction Management System.
#[derive(Debug, Parser)]
#[command(name = "ims", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session token
    Login {
        email: String,
        password: String,
        #[arg(long)]
        remember: bool,
    },
    /// End the session and drop cached data
    Logout,
    /// List the sites the signed-in user can access
    Sites,
    /// Search interactions on a site
    Search {
        #[arg(long, env = "IMS_SITE")]
        site: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Print the dashboard summary for a site
    Dashboard {
        #[arg(long, env = "IMS_SITE")]
        site: String,
    },
}

async fn run(app: &ImsApp, command: Command) -> Result<()> {
    if !matches!(command, Command::Login { .. }) && app.restore().is_none() {
        return Err(ImsError::not_authenticated("not logged in").into_anyhow());
    }

    match command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            let mut form = FormController::new(LoginDraft::default());
            form.set_field(LoginField::Email, &email);
            form.set_field(LoginField::Password, &password);
            form.set_field(LoginField::RememberMe, if remember { "true" } else { "false" });

            let user = form.submit(|request| app.login(request)).await?;
            println!("logged in as {}", user.email);
        }
        Command::Logout => {
            app.logout().await;
            println!("logged out");
        }
        Command::Sites => {
            for site in app.auth().load_sites().await? {
                println!("{}\t{}", site.id, site.name);
            }
        }
        Command::Search { site, text } => {
            app.switch_site(&SiteId::new(site)).await?;
            let query = SearchQuery::text(text.join(" "));
            match app.search().search(&app.context(), query).await? {
                SearchOutcome::Applied(results) => println!("{}", serde_json::to_string_pretty(&results)?),
                SearchOutcome::Stale => {}
            }
        }
        Command::Dashboard { site } => {
            app.switch_site(&SiteId::new(site)).await?;
            let summary = app.dashboard().summary(&app.context()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ImsConfig::from_env()?;
    init_logging(&config.logging)?;

    let token_path = std::env::var("IMS_TOKEN_PATH").unwrap_or_else(|_| ".ims/token.json".to_string());
    let app = ImsApp::new(config, Arc::new(FileTokenStore::new(token_path)))?;

    if let Err(err) = run(&app, cli.command).await {
        eprintln!("{}", ImsError::user_message_for(&err));
        if let Some(ims) = ImsError::from_anyhow(&err) {
            if let Some(errors) = &ims.errors {
                eprintln!("{errors}");
            }
        }
        std::process::exit(1);
    }
    Ok(())
}
