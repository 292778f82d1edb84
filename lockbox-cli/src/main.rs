//! Lockbox CLI
//!
//! Unlocks the remote vault with the master password, runs one command
//! against the working set, and saves it back when the command changed it.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lockbox_core::import::enpass;
use lockbox_core::model::{now_millis, Secret, SecretField};
use lockbox_core::sync::{HttpStorage, SaveReport, SyncConfig, SyncEngine};
use lockbox_core::{LockboxError, Vault};
use rpassword::prompt_password;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lockbox", about = "Client for an end-to-end encrypted password vault")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "lockbox.toml")]
    config: PathBuf,

    /// Server URL override
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty vault on the server
    Init,

    /// List secrets
    List {
        /// Only secrets in this folder
        #[arg(long)]
        folder: Option<Uuid>,

        /// Only secrets whose label contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one secret, including its password
    Show {
        /// Secret ID
        id: Uuid,
    },

    /// Add a new secret
    Add {
        #[arg(long)]
        label: String,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,

        /// Website URL, may be repeated
        #[arg(long)]
        website: Vec<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Folder to file the secret under
        #[arg(long)]
        folder: Option<Uuid>,
    },

    /// List folders
    Folders,

    /// Create a folder
    AddFolder {
        label: String,
    },

    /// Import an Enpass JSON export
    Import {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        SyncConfig::load(&cli.config)?
    } else {
        info!("No config file found, using defaults");
        SyncConfig::default()
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let engine = SyncEngine::new(HttpStorage::new(&config)?, config);
    let master_password = prompt_password("Master password: ")?;

    if let Commands::Init = cli.command {
        engine.initialize(&master_password).await?;
        println!("Created a new vault");
        return Ok(());
    }

    let mut vault = match engine.fetch(&master_password).await {
        Ok(vault) => vault,
        Err(e) if e.is_incorrect_password() => bail!("Incorrect master password"),
        Err(e) => return Err(e.into()),
    };

    match cli.command {
        Commands::Init => {}
        Commands::List { folder, search } => {
            let secrets = vault.search(search.as_deref().unwrap_or(""));
            for secret in secrets
                .into_iter()
                .filter(|s| folder.map_or(true, |id| s.in_folder(&id)))
            {
                println!(
                    "{}  {}  {}",
                    secret.id,
                    secret.label.value,
                    secret.value(SecretField::Username).unwrap_or("")
                );
            }
        }
        Commands::Show { id } => {
            let secret = vault
                .secret(&id)
                .ok_or_else(|| LockboxError::NotFound(format!("secret {}", id)))?;
            print_secret(&vault, secret);
        }
        Commands::Add {
            label,
            username,
            email,
            password,
            website,
            notes,
            folder,
        } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password("Password for the new secret (empty for none): ")?,
            };

            let now = now_millis();
            let mut secret = Secret::new(label, now);
            let fields = [
                (SecretField::Username, username),
                (SecretField::Email, email),
                (SecretField::Password, Some(password).filter(|p| !p.is_empty())),
                (SecretField::Notes, notes),
            ];
            for (field, value) in fields {
                if let Some(value) = value {
                    secret.set(field, value, now);
                }
            }
            if !website.is_empty() {
                secret.set_websites(website, now);
            }
            if let Some(folder) = folder {
                secret.set_folders(vec![folder], now);
            }

            let id = vault.add_secret(secret)?;
            save(&engine, &mut vault).await?;
            println!("Added secret {}", id);
        }
        Commands::Folders => {
            for folder in vault.folders() {
                let count = vault.secrets_in_folder(&folder.id).len();
                println!("{}  {}  ({} secrets)", folder.id, folder.label, count);
            }
        }
        Commands::AddFolder { label } => {
            let id = vault.add_folder(label, now_millis());
            save(&engine, &mut vault).await?;
            println!("Added folder {}", id);
        }
        Commands::Import { file } => {
            let batch = enpass::import_file(&file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            let summary = vault.import(batch);
            if summary.secrets_added + summary.folders_added > 0 {
                save(&engine, &mut vault).await?;
            }
            println!(
                "Imported {} secrets and {} folders ({} already present)",
                summary.secrets_added, summary.folders_added, summary.skipped
            );
        }
    }

    engine.lock().await;
    Ok(())
}

async fn save(engine: &SyncEngine<HttpStorage>, vault: &mut Vault) -> Result<SaveReport> {
    let report = engine.save(vault).await?;
    if report.merged {
        println!(
            "Merged changes from another device ({} attempts)",
            report.attempts
        );
    }
    Ok(report)
}

fn print_secret(vault: &Vault, secret: &Secret) {
    println!("ID:       {}", secret.id);
    println!("Label:    {}", secret.label.value);
    for field in SecretField::ALL {
        if field == SecretField::Label {
            continue;
        }
        if let Some(value) = secret.value(field).filter(|v| !v.is_empty()) {
            println!("{:<9} {}", format!("{}:", field.as_str()), value);
        }
    }
    for website in secret.websites() {
        println!("Website:  {}", website);
    }
    for id in &secret.folders.value {
        let label = vault.folder(id).map(|f| f.label.as_str()).unwrap_or("?");
        println!("Folder:   {}", label);
    }
}
