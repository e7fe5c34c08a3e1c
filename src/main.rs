use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use cashback_loyalty::{
    models::users::Role,
    repositories::{
        levels::{LevelRepository, LevelStore},
        users::UserRepository,
    },
    services,
    session::{SessionClaims, SessionSigner},
    settings,
};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Insert or overwrite the client level table from a TOML file.
    SeedLevels {
        #[arg(short, long, default_value = "levels.toml")]
        file: String,
    },
    /// Print every admin account.
    ListAdmins,
    /// Zero every user's monthly earnings.
    ResetMonthlyEarnings,
    /// Print a signed session token.
    IssueSession {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long, value_enum, default_value_t = Role::User)]
        role: Role,
        /// Lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log4rs) {
        eprintln!("[ERROR] {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    let settings = settings::Settings::new(&args.config).context("Could not load config file.")?;

    if let Command::IssueSession {
        user_id,
        role,
        ttl,
    } = args.command
    {
        let signer = SessionSigner::new(settings.session.key.as_bytes())?;
        let claims = SessionClaims::expiring(user_id, role, chrono::Utc::now().timestamp(), ttl)?;
        println!("{}", signer.issue(&claims)?);
        return Ok(());
    }

    let pool = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(&settings.postgres.url)
        .await
        .context("Could not connect to database.")?;

    match args.command {
        Command::Serve => {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Could not run migrations.")?;

            log::info!("Starting services.");
            services::start_services(pool, settings).await?;
        }
        Command::SeedLevels { file } => {
            let seed = settings::load_level_seed(&file)
                .with_context(|| format!("Could not read level seed {}.", file))?;
            LevelRepository::new(pool)
                .seed_levels(&seed.levels)
                .await
                .context("Could not seed client levels.")?;
            log::info!("Seeded {} client levels.", seed.levels.len());
        }
        Command::ListAdmins => {
            let admins = UserRepository::new(pool).list_admins().await?;
            for admin in &admins {
                println!("{}\t{}", admin.id, admin.email);
            }
            log::info!("Found {} admins.", admins.len());
        }
        Command::ResetMonthlyEarnings => {
            let reset = UserRepository::new(pool).reset_monthly_earnings().await?;
            log::info!("Reset monthly earnings of {} users.", reset);
        }
        Command::IssueSession { .. } => {}
    }

    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    log4rs::init_file(path, Default::default())
        .map_err(|e| anyhow::anyhow!("Could not initialize logging: {}", e))
}
