use anyhow::{Context, Result};
use bb_classroom::config::{self, Config};
use bb_classroom::{Account, Credentials};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::{debug, info, trace, warn};

mod logger;

#[derive(Parser, Debug)]
#[command(version, about = "Find and join your next Blackboard Collaborate session")]
struct Cli {
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[arg(long, env = "BB_USER")]
    user: Option<String>,

    #[arg(long, env = "BB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Show the next upcoming session (default)
    Next,
    /// List enrolled course ids
    Courses,
    /// Launch the next upcoming session and print its URL
    Join,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !Path::new(&cli.config).is_file() {
        let default_config = Config::default();
        config::save_config(&cli.config, &default_config).await?;
        eprintln!("no config file found, wrote defaults to {}", cli.config);
        return Ok(());
    }

    let config = config::load_config(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config))?;

    let _guard = logger::init_logger(&config.log)?;
    info!("config loaded: {}", cli.config);
    debug!(?config);

    let user = cli.user.context("missing --user (or BB_USER)")?;
    let password = cli.password.context("missing --password (or BB_PASSWORD)")?;
    let account = Account::login(&config.portal, Credentials::new(user, password))
        .await
        .context("login failed")?;
    trace!(cookies = ?account.cookies());

    let now = Utc::now();
    match cli.command.unwrap_or(Command::Next) {
        Command::Courses => {
            for course in account.courses().await? {
                println!("{}", course.course_id());
            }
        }
        Command::Next => match account.next_course_at(now).await? {
            Some(course) => {
                let title = course
                    .course()
                    .await?
                    .name
                    .clone()
                    .unwrap_or_else(|| course.course_id().to_string());
                println!("{title}");
                if let Some(session) = course.next_session_at(now).await? {
                    println!("  {}", session.name().unwrap_or(session.id()));
                }
                println!("  starts {}", course.start_time_at(now).await?);
                println!("  ends   {}", course.end_time_at(now).await?);
            }
            None => println!("no upcoming sessions"),
        },
        Command::Join => match account.next_session_at(now).await? {
            Some(session) => {
                let launch = session.join().await?;
                println!("{}", launch.url);
            }
            None => {
                warn!("nothing to join");
                println!("no upcoming sessions");
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_optional_at_parse_time() {
        let cli = Cli::try_parse_from(["bb-classroom", "--config", "fresh.toml"]).unwrap();
        assert_eq!(cli.config, "fresh.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn credentials_and_subcommand_parse() {
        let cli =
            Cli::try_parse_from(["bb-classroom", "--user", "u1", "--password", "pw", "join"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("u1"));
        assert_eq!(cli.password.as_deref(), Some("pw"));
        assert!(matches!(cli.command, Some(Command::Join)));
    }
}
