mod auth;
mod config;
mod http;
mod membership;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use platform_authz::{
    Action, Decision, Permissions, Reason, Registry, Resource, Role, Subject,
};
use platform_obs::{ObsConfig, init_tracing};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{TokenKeys, issue_token},
    config::AppConfig,
    http::{AppState, ServeConfig},
    membership::{InMemoryDirectory, MembershipLookup},
};

#[derive(Parser, Debug)]
#[command(name = "authz-server", version, about = "Organization authorization service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Print the rule table for every role.
    Rules,
    /// Evaluate a single authorization decision.
    Check(CheckCommand),
    /// Mint a bearer token for a user (development only).
    Token {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "SERVER_PORT", default_value_t = 3333)]
    port: u16,
    #[arg(long, value_name = "FILE", help = "Membership directory JSON, overrides MEMBERSHIP_DIRECTORY")]
    directory: Option<PathBuf>,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug)]
struct CheckCommand {
    #[arg(long, help = "ADMIN, MEMBER or BILLING")]
    role: Role,
    #[arg(long, help = "Subject user id; random when omitted")]
    subject: Option<Uuid>,
    #[arg(long, help = "Action, e.g. update or transfer_ownership")]
    action: Action,
    #[arg(
        long,
        help = "Resource type name (Project) or instance JSON ({\"__typename\":\"Project\",\"id\":..,\"ownerId\":..})"
    )]
    resource: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::from_env("authz-server"))?;
    let cli = Cli::parse();
    Registry::standard()
        .validate()
        .context("authorization rule table is incomplete")?;
    match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::Rules => {
            print_rules(Registry::standard());
            Ok(())
        }
        Command::Check(cmd) => run_check(cmd),
        Command::Token { user } => mint_token(user),
    }
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let config = AppConfig::load()?;
    let directory = match cmd.directory.as_ref().or(config.membership_directory.as_ref()) {
        Some(path) => {
            let directory = InMemoryDirectory::from_file(path)?;
            info!(organizations = directory.len(), path = %path.display(), "membership directory loaded");
            directory
        }
        None => {
            warn!("no membership directory configured; every organization lookup will miss");
            InMemoryDirectory::default()
        }
    };
    let directory: Arc<dyn MembershipLookup> = Arc::new(directory);
    let state = AppState {
        keys: Arc::new(TokenKeys::from_secret(&config.jwt_secret)),
        directory,
        cors_allowed_origins: config.cors_allowed_origins.into(),
    };
    http::serve((&cmd).into(), state).await
}

fn print_rules(registry: &Registry) {
    println!("baseline (all roles)");
    for rule in registry.baseline() {
        println!("  {rule}");
    }
    for role in Role::ALL {
        println!("{role}");
        for rule in registry.role_rules(role).unwrap_or_default() {
            println!("  {rule}");
        }
    }
}

fn run_check(cmd: CheckCommand) -> Result<()> {
    let raw = serde_json::from_str::<Value>(&cmd.resource)
        .unwrap_or_else(|_| Value::String(cmd.resource.clone()));
    let resource = Resource::from_json(&raw)?;
    let subject = Subject::new(cmd.subject.unwrap_or_else(Uuid::new_v4), cmd.role);
    let permissions = Permissions::new(Registry::standard(), subject);
    let decision = permissions.decide(cmd.action, &resource)?;
    println!("{}", describe(&permissions, &decision)?);
    Ok(())
}

fn describe(permissions: &Permissions<'_>, decision: &Decision) -> Result<String> {
    let verdict = if decision.is_allowed() { "ALLOW" } else { "DENY" };
    Ok(match decision.reason {
        Reason::NoMatchingRule => format!("{verdict} (no matching rule)"),
        Reason::Rule { index, specificity } => {
            let rule = permissions
                .rule_at(index)?
                .context("decision points past the rule list")?;
            format!("{verdict} by rule #{index} ({specificity:?} match): {rule}")
        }
    })
}

fn mint_token(user: Uuid) -> Result<()> {
    let config = AppConfig::load()?;
    let keys = TokenKeys::from_secret(&config.jwt_secret);
    let token =
        issue_token(user, config.token_ttl_minutes, &keys).context("failed to issue token")?;
    println!("{token}");
    Ok(())
}
