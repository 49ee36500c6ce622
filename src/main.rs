//! `webpush` - encrypt and send Web Push messages from the command line.
//!
//! See the `webpush_aesgcm` library for the core functionality.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use clap::{Parser, Subcommand};
use webpush_aesgcm::dispatch::{encryption_header, encryption_key_header};
use webpush_aesgcm::notification::parse_endpoint;
use webpush_aesgcm::{
    crypto, keys, Config, DispatchPool, Dispatcher, HttpTransport, Notification, PushSubscription,
    RecipientKeyPair, Transport,
};

#[derive(Parser)]
#[command(name = "webpush")]
#[command(version)]
#[command(about = "Encrypt and send Web Push (aesgcm128) notifications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a recipient key pair for testing
    Keygen,
    /// Encrypt a payload and print the headers and body
    Encrypt {
        /// Recipient public key (base64url)
        #[arg(long)]
        p256dh: String,
        /// Payload text
        #[arg(long, conflicts_with = "payload_file", required_unless_present = "payload_file")]
        payload: Option<String>,
        /// Read the payload from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },
    /// Decrypt a message with a recipient private key
    Decrypt {
        /// Recipient private key (base64url, 32 bytes)
        #[arg(long)]
        private_key: String,
        /// Sender public key from the Encryption-Key header (base64url)
        #[arg(long)]
        dh: String,
        /// Salt from the Encryption header (base64url)
        #[arg(long)]
        salt: String,
        /// Encrypted body (base64url)
        #[arg(long)]
        body: String,
    },
    /// Send an encrypted notification to an endpoint
    Send {
        /// Push service endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Recipient public key (base64url)
        #[arg(long)]
        p256dh: String,
        /// Payload text
        #[arg(long)]
        payload: String,
        /// Time-to-live in seconds (defaults to config)
        #[arg(long)]
        ttl: Option<u32>,
    },
    /// Send an encrypted notification to one or more subscription JSON files
    SendSubscription {
        /// Path to a browser subscription JSON file (repeatable)
        #[arg(long, required = true)]
        subscription: Vec<PathBuf>,
        /// Payload text
        #[arg(long)]
        payload: String,
        /// Time-to-live in seconds (defaults to config)
        #[arg(long)]
        ttl: Option<u32>,
    },
    /// Send a plaintext legacy GCM message (needs WEBPUSH_GCM_API_KEY)
    SendLegacy {
        /// GCM endpoint URL
        #[arg(long)]
        endpoint: String,
        /// JSON body
        #[arg(long)]
        body: String,
        /// Time-to-live in seconds (defaults to config)
        #[arg(long)]
        ttl: Option<u32>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let pair = RecipientKeyPair::generate();
            println!("p256dh:      {}", pair.public_key_base64url());
            println!("private_key: {}", pair.private_key_base64url().as_str());
            Ok(())
        }
        Commands::Encrypt {
            p256dh,
            payload,
            payload_file,
        } => {
            let payload = match (payload, payload_file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read payload from {}", path.display()))?,
                (None, None) => anyhow::bail!("either --payload or --payload-file is required"),
            };
            let recipient = keys::public_key_from_base64url(&p256dh)?;
            let encrypted = crypto::encrypt(&recipient, &payload)?;

            println!("Encryption: {}", encryption_header(&encrypted));
            println!("Encryption-Key: {}", encryption_key_header(&encrypted));
            println!("Body: {}", BASE64URL.encode(encrypted.ciphertext()));
            Ok(())
        }
        Commands::Decrypt {
            private_key,
            dh,
            salt,
            body,
        } => {
            let pair = RecipientKeyPair::from_base64url(&private_key)?;
            let sender = keys::public_key_from_base64url(&dh)?;
            let salt: [u8; crypto::SALT_LEN] = keys::decode_base64url(&salt)?
                .try_into()
                .map_err(|bytes: Vec<u8>| {
                    anyhow::anyhow!("salt must be {} bytes, got {}", crypto::SALT_LEN, bytes.len())
                })?;
            let ciphertext = keys::decode_base64url(&body)?;

            let plaintext = crypto::decrypt(pair.secret_key(), &sender, &salt, &ciphertext)?;
            println!("{}", String::from_utf8_lossy(&plaintext));
            Ok(())
        }
        Commands::Send {
            endpoint,
            p256dh,
            payload,
            ttl,
        } => {
            let config = Config::load()?;
            let notification = Notification::encrypted(
                parse_endpoint(&endpoint)?,
                keys::public_key_from_base64url(&p256dh)?,
                payload,
                ttl.unwrap_or(config.default_ttl),
            );
            send_one(&config, &notification).await
        }
        Commands::SendSubscription {
            subscription,
            payload,
            ttl,
        } => {
            let config = Config::load()?;
            let ttl = ttl.unwrap_or(config.default_ttl);

            let mut notifications = Vec::with_capacity(subscription.len());
            for path in &subscription {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let sub = PushSubscription::from_json(&json)
                    .with_context(|| format!("Invalid subscription in {}", path.display()))?;
                notifications.push(Notification::from_subscription(&sub, payload.as_bytes(), ttl)?);
            }

            let pool = DispatchPool::from_config(&config);
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(&config)?);
            let results = pool
                .send_all(Arc::new(Dispatcher::from_config(&config)), transport, notifications)
                .await;

            let mut failed = 0;
            for (path, result) in subscription.iter().zip(results) {
                match result {
                    Ok(response) => println!("{}: HTTP {}", path.display(), response.status),
                    Err(e) => {
                        failed += 1;
                        println!("{}: failed ({}): {}", path.display(), e.kind(), e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} notifications failed", subscription.len());
            }
            Ok(())
        }
        Commands::SendLegacy { endpoint, body, ttl } => {
            let config = Config::load()?;
            let notification =
                Notification::legacy(parse_endpoint(&endpoint)?, body, ttl.unwrap_or(config.default_ttl));
            send_one(&config, &notification).await
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("Config directory: {}", Config::config_dir()?.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!(
                "legacy_api_key: {}",
                if config.legacy_api_key.is_some() { "<set>" } else { "<not set>" }
            );
            Ok(())
        }
    }
}

async fn send_one(config: &Config, notification: &Notification) -> Result<()> {
    let transport = HttpTransport::from_config(config)?;
    let response = Dispatcher::from_config(config)
        .send(&transport, notification)
        .await
        .context("Push delivery failed")?;
    println!("HTTP {}", response.status);
    if !response.body.is_empty() {
        println!("{}", response.body);
    }
    Ok(())
}
