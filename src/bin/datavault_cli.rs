use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use datavault::logging::LoggingSystem;
use datavault::{
    load_vault_config, AesGcmBlobCipher, AuditAction, AuditQuery, BlobCipher, Vault,
};
use log::{info, warn};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the vault configuration file
    #[arg(short, long, default_value = "config/vault.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Promote the user with the given email to admin
    MakeAdmin {
        #[arg(short, long, required = true)]
        email: String,
    },
    /// List verified organisations
    Orgs {},
    /// Show row counts per tree
    Stats {},
    /// Show audit log entries, newest first
    Audit {
        /// Only entries for this dataset
        #[arg(short, long)]
        dataset: Option<u64>,

        /// Only entries with this action
        #[arg(short, long)]
        action: Option<String>,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Summarise rewards credited to an owner
    Rewards {
        #[arg(short, long, required = true)]
        owner: u64,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

/// Loads the blob key from `DATAVAULT_BLOB_KEY`. None of the admin commands
/// decrypt content, so a throwaway key is used when it is unset.
fn blob_cipher() -> Result<Arc<dyn BlobCipher>, Box<dyn std::error::Error>> {
    match std::env::var("DATAVAULT_BLOB_KEY") {
        Ok(key) => Ok(Arc::new(AesGcmBlobCipher::from_base64(&key)?)),
        Err(_) => {
            warn!("DATAVAULT_BLOB_KEY not set, dataset content cannot be decrypted");
            Ok(Arc::new(AesGcmBlobCipher::new(&AesGcmBlobCipher::generate_key())))
        }
    }
}

/// Main entry point for the vault admin CLI.
///
/// # Command-Line Arguments
///
/// * `-c, --config <PATH>` - Path to the vault configuration file (default: config/vault.toml)
/// * Subcommands:
///   * `make-admin --email <EMAIL>` - Promote a user to admin
///   * `orgs` - List verified organisations
///   * `stats` - Show row counts per tree
///   * `audit` - Show audit log entries
///   * `rewards --owner <ID>` - Summarise an owner's rewards
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, logging cannot be
/// initialized, the vault cannot be opened, or the command fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_vault_config(Some(&cli.config))?;
    LoggingSystem::init(&config.logging)?;
    info!("Opening vault at {}", config.storage_path.display());
    let vault = Vault::open_with_system_clock(config, blob_cipher()?)?;

    match cli.command {
        Commands::MakeAdmin { email } => {
            let user = vault.users().promote_to_admin(&email)?;
            println!("{} is now an admin.", user.email);
        }
        Commands::Orgs {} => {
            for org in vault.users().list_org_directory()? {
                println!("{}\t{}\t{}", org.id, org.name, org.email);
            }
        }
        Commands::Stats {} => {
            let mut stats: Vec<_> = vault.db().get_stats().into_iter().collect();
            stats.sort();
            for (tree, rows) in stats {
                println!("{}\t{}", tree, rows);
            }
        }
        Commands::Audit {
            dataset,
            action,
            limit,
        } => {
            let query = AuditQuery {
                dataset_id: dataset,
                action: action.map(|a| a.parse::<AuditAction>()).transpose()?,
                limit: Some(limit),
                ..Default::default()
            };
            for entry in vault.audit().query(&query)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    entry.at.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.dataset_id.map_or("-".to_string(), |id| id.to_string()),
                    entry.actor_id.map_or("-".to_string(), |id| id.to_string()),
                    entry.actor_role.map_or("-", |role| role.as_str()),
                    entry.metadata
                );
            }
        }
        Commands::Rewards { owner, from, to } => {
            let rewards = vault.rewards();
            let total = rewards.total_credits(owner, from, to)?;
            println!(
                "Total: {} {} (~{:.2})",
                total,
                rewards.config().unit,
                rewards.config().value_cents(total) as f64 / 100.0
            );
            println!("By dataset:");
            for summary in rewards.summary_by_dataset(owner, from, to)? {
                println!(
                    "  {}\t{}\t{} credits\t{} events\tlast {}",
                    summary.dataset_id,
                    summary.dataset_name,
                    summary.totals.credits,
                    summary.totals.events,
                    summary.totals.last_at.format("%Y-%m-%d")
                );
            }
            println!("By organisation:");
            for summary in rewards.summary_by_org(owner, from, to)? {
                println!(
                    "  {}\t{}\t{} credits\t{} events",
                    summary.org_id, summary.org_name, summary.totals.credits, summary.totals.events
                );
            }
        }
    }

    Ok(())
}
