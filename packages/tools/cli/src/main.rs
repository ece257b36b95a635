//! Kennel CLI (`knl`)
//!
//! 접근 정책을 검증하고, 특정 요청에 대한 권한 평가 결과를 확인하는
//! Operator 도구입니다.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "knl")]
#[command(author, version, about = "Kennel CLI - inspect and check access policies", long_about = None)]
struct Cli {
    /// Policy file (overrides KNL_POLICY_FILE)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the access policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Evaluate one request against the policy
    Check {
        /// Requester role
        #[arg(long)]
        role: String,

        /// Requester ID
        #[arg(long)]
        id: String,

        /// Action (read, add, update, delete)
        #[arg(long)]
        action: String,

        /// Resource (user, users, dog, messages, favourites)
        #[arg(long)]
        resource: String,

        /// Target record as JSON (used for ownership conditions)
        #[arg(long)]
        data: Option<String>,

        /// Request payload as JSON (filtered on grant)
        #[arg(long)]
        payload: Option<String>,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Load the policy and report configuration errors
    Validate,

    /// List grants
    List {
        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        action: Option<String>,

        #[arg(long)]
        resource: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    let config = CliConfig::from_env();

    // 로깅 초기화
    let filter = config
        .log_filter
        .clone()
        .unwrap_or_else(|| "knl_cli=info,knl_core=info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = config.with_policy_override(cli.policy);
    tracing::debug!("Running with config: {:?}", config);

    match cli.command {
        Commands::Policy { action } => match action {
            PolicyAction::Validate => commands::policy::validate(&config, cli.format),
            PolicyAction::List {
                role,
                action,
                resource,
            } => commands::policy::list(
                &config,
                cli.format,
                commands::policy::GrantQuery {
                    role,
                    action,
                    resource,
                },
            ),
        },
        Commands::Check {
            role,
            id,
            action,
            resource,
            data,
            payload,
        } => commands::check::run(
            &config,
            cli.format,
            commands::check::CheckRequest {
                role,
                id,
                action,
                resource,
                data,
                payload,
            },
        ),
    }
}
