use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::{
    action::ActionError,
    comment::Template,
    config::{ProcessEnv, SONAR_METRIC_KEYS},
    sonar::{SonarError, METRIC_DEFINITIONS},
};

mod action;
mod comment;
mod config;
mod event;
mod github;
mod metrics;
mod properties;
mod sonar;

#[derive(clap::Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Clone)]
enum Commands {
    /// Comment the SonarQube results on the pull request that triggered the
    /// workflow. This is the default.
    ///
    /// This command assumes to be run in GitHub Actions and to have access to
    /// the GitHub specific environment variables, along with `SONAR_HOST_URL`
    /// and `SONAR_TOKEN`.
    Action,
    /// Print the comment for the current results, without posting it.
    Preview {
        /// Directory containing `sonar-project.properties`. Defaults to
        /// `GITHUB_WORKSPACE`.
        #[clap(long)]
        workspace: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    if std::env::var("LOG_STYLE").as_deref().unwrap_or("human") == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .event_format(tracing_subscriber::fmt::format::json())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let args = Cli::parse();
    let template = Template::default();
    let run = async {
        match args.command.unwrap_or(Commands::Action) {
            Commands::Action => action::main(&ProcessEnv, &template).await.map(|_| ()),
            Commands::Preview { workspace } => {
                action::preview(&ProcessEnv, workspace, &template).await
            }
        }
    };

    tokio::select! {
        result = run => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => report(err),
        },
        Ok(()) = tokio::signal::ctrl_c() => {
            println!();
            ExitCode::SUCCESS
        }
    }
}

/// Explains why the action failed.
fn report(err: ActionError) -> ExitCode {
    match err {
        ActionError::Config(e) => {
            println!("error: {e}");
            if let Some(hint) = e.hint() {
                println!("{hint}");
            }
        }
        ActionError::Event(e) => println!("error: {e}"),
        ActionError::Properties(e) => println!("error: {e}"),
        ActionError::Sonar(SonarError::UnknownMetricKey(keys)) => {
            println!(
                "error: unknown sonar metric key set in {SONAR_METRIC_KEYS}: key={}",
                keys.join(", ")
            );
            println!("reference: {METRIC_DEFINITIONS}");
        }
        err => {
            error!("{err}");
            println!("error: {:?}", eyre::Report::new(err));
        }
    }

    ExitCode::FAILURE
}
