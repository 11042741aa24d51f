use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "eqi")]
#[command(about = "EquilibreInvest CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Offline rebalance of a portfolio file
    Rebalance {
        /// Portfolio file (YAML or JSON) with a `holdings` list
        #[arg(long)]
        portfolio: String,

        /// Amount to invest; `1000.50` and `1000,50` are both accepted
        #[arg(long, allow_hyphen_values = true)]
        contribution: String,

        /// Price file (YAML or JSON map ticker -> price). Without it the
        /// configured price service is used.
        #[arg(long)]
        prices: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Print the full result as JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Confirmed simulation history (Postgres)
    Simulations {
        #[command(subcommand)]
        cmd: SimulationsCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum SimulationsCmd {
    /// List a user's simulations, newest first
    List {
        #[arg(long)]
        user: String,
    },

    /// Print one simulation as JSON
    Show {
        #[arg(long)]
        user: String,

        /// Simulation id
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = eqi_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Rebalance {
            portfolio,
            contribution,
            prices,
            config_paths,
            json,
        } => {
            commands::rebalance::run(commands::rebalance::RebalanceArgs {
                portfolio_path: portfolio,
                contribution,
                prices_path: prices,
                config_paths,
                json,
            })
            .await?;
        }

        Commands::Db { cmd } => {
            let pool = eqi_store::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = eqi_store::status(&pool).await?;
                    println!(
                        "db_ok={} has_holdings_table={} has_simulations_table={}",
                        s.ok, s.has_holdings_table, s.has_simulations_table
                    );
                }
                DbCmd::Migrate => {
                    eqi_store::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Simulations { cmd } => match cmd {
            SimulationsCmd::List { user } => commands::simulations::list(&user).await?,
            SimulationsCmd::Show { user, id } => commands::simulations::show(&user, &id).await?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
