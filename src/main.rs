use std::path::PathBuf;

use clap::Parser;
use lms_analytics::{
    api::auth::hash_password,
    config::Config,
    model::{Role, User},
    server::serve,
    store::Store,
    utils::init_log,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "lms.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,
    /// Import a JSON fixture of documents into the store
    Seed { file: PathBuf },
    /// Create or replace a staff user
    CreateUser {
        #[arg(long)]
        id: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long, value_delimiter = ',', required = true)]
        roles: Vec<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        school: Option<String>,
    },
}

fn parse_role(role: &str) -> anyhow::Result<Role> {
    Ok(serde_json::from_value(serde_json::Value::String(
        role.trim().to_lowercase(),
    ))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let _guard = init_log(config.log_dir.clone())?;

    match args.command {
        Commands::Serve => serve(config).await?,
        Commands::Seed { file } => {
            let store = Store::connect(&config.database_url).await?;
            store.import_file(&file).await?;
            info!("imported {}", file.display());
        }
        Commands::CreateUser {
            id,
            name,
            email,
            password,
            roles,
            department,
            school,
        } => {
            let roles = roles
                .iter()
                .map(|r| parse_role(r))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let user = User {
                id,
                name,
                email,
                password_hash: hash_password(&password)?,
                roles,
                department,
                school,
            };
            let store = Store::connect(&config.database_url).await?;
            store.put(&user).await?;
            println!("User created with id: {}", user.id);
        }
    }
    Ok(())
}
