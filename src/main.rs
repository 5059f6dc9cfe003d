//! s3ctl
//!
//! Command-line front end for the archival S3 client. Connection settings
//! come from the environment (or a `.env` file).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::{pin_mut, TryStreamExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archival_s3::{ClientConfig, S3Client};

/// Inspect and clean up S3-compatible buckets.
///
/// Reads S3_ENDPOINT, S3_REGION, S3_ACCESS_KEY, S3_SECRET_KEY and the
/// optional S3_DISABLE_SSL / S3_RETRY_* variables.
#[derive(Parser, Debug)]
#[command(name = "s3ctl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a bucket (no-op if we already own it)
    CreateBucket { bucket: String },

    /// Upload a local file
    Put {
        bucket: String,
        key: String,
        file: PathBuf,
    },

    /// Download an object to a local file
    Get {
        bucket: String,
        key: String,
        dest: PathBuf,
    },

    /// Print object metadata as JSON
    Meta { bucket: String, key: String },

    /// List every object in a bucket as JSON lines
    List { bucket: String },

    /// Delete a single object
    Delete { bucket: String, key: String },

    /// Delete every object in a bucket, reporting keys that survived
    Empty { bucket: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for listings
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "archival_s3=debug,s3ctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = ClientConfig::from_env().context("Failed to load S3 configuration")?;
    let client = S3Client::connect(&config).context("Failed to initialize S3 client")?;

    match cli.command {
        Command::CreateBucket { bucket } => {
            client.create_bucket(&bucket).await?;
            tracing::info!("Bucket {} ready", bucket);
        }
        Command::Put { bucket, key, file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let meta = client.put_object(&bucket, &key, data).await?;
            println!("{}", serde_json::to_string(&meta)?);
        }
        Command::Get { bucket, key, dest } => {
            let written = client.write_object_to_file(&bucket, &key, &dest).await?;
            tracing::info!("Wrote {} bytes to {}", written, dest.display());
        }
        Command::Meta { bucket, key } => {
            let meta = client.get_object_meta(&bucket, &key).await?;
            println!("{}", serde_json::to_string(&meta)?);
        }
        Command::List { bucket } => {
            let objects = client.list_objects(&bucket);
            pin_mut!(objects);
            while let Some(object) = objects.try_next().await? {
                println!("{}", serde_json::to_string(&object)?);
            }
        }
        Command::Delete { bucket, key } => {
            let reply = client.delete_object(&bucket, &key).await?;
            tracing::info!("Deleted {}/{}: {:?}", bucket, key, reply);
        }
        Command::Empty { bucket } => {
            let failed_keys = client.empty_bucket(&bucket).await;
            if !failed_keys.is_empty() {
                for key in &failed_keys {
                    println!("{}", key);
                }
                eprintln!("{} keys could not be deleted", failed_keys.len());
                std::process::exit(4); // Partial failure
            }
            tracing::info!("Bucket {} emptied", bucket);
        }
    }

    Ok(())
}
