//! Uploader CLI
//!
//! Uploads local files to a route of a presigned-upload server.

use clap::{Arg, ArgAction, Command};
use presigned_upload::{LogLevel, UploadFile, UploadOptions, Uploader, UploaderConfig};
use std::future::Future;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

fn cli() -> Command {
    Command::new("uploader")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Presigned upload client")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .help("Server URL, overrides the configuration file")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload files to an endpoint")
                .arg(Arg::new("endpoint").help("Route slug").required(true))
                .arg(
                    Arg::new("files")
                        .help("Files to upload")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .help("Route input as JSON"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
        .subcommand(Command::new("schedule").about("Print the completion polling schedule"))
}

fn load_config(matches: &clap::ArgMatches) -> Result<UploaderConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => UploaderConfig::from_file(path)?,
        None => UploaderConfig::new(""),
    };

    if let Some(server) = matches.get_one::<String>("server") {
        config = config.server_url(server.as_str());
    }
    if matches.get_flag("verbose") {
        config = config.log_level(LogLevel::Debug);
    }
    Ok(config)
}

/// Token cancelled once `signal` resolves
fn cancel_on<F>(signal: F) -> CancellationToken
where
    F: Future + Send + 'static,
{
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        signal.await;
        trigger.cancel();
    });
    token
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    env_logger::Builder::from_default_env()
        .filter_level(config.effective_log_level().into())
        .init();

    match matches.subcommand() {
        Some(("upload", sub_matches)) => {
            let endpoint = sub_matches
                .get_one::<String>("endpoint")
                .ok_or("missing endpoint")?;

            let mut files = Vec::new();
            for path in sub_matches.get_many::<PathBuf>("files").into_iter().flatten() {
                files.push(UploadFile::from_path(path).await?);
            }

            let cancellation = cancel_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted, cancelling uploads");
                } else {
                    futures::future::pending::<()>().await;
                }
            });

            let mut options = UploadOptions::new()
                .cancellation(cancellation)
                .on_upload_begin(|name| eprintln!("Uploading {}", name))
                .on_progress(|progress| {
                    log::debug!(
                        "{}: {:.1}% ({}/{})",
                        progress.file_name,
                        progress.percentage * 100.0,
                        progress.bytes_uploaded,
                        progress.total_bytes
                    );
                });
            if let Some(input) = sub_matches.get_one::<String>("input") {
                options = options.input(serde_json::from_str(input)?);
            }

            let uploader = Uploader::new(config)?;
            let results = uploader.upload_files(endpoint, files, options).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Some(("config", _)) => {
            println!("{}", config.to_json()?);
        }
        Some(("schedule", _)) => {
            let policy = config.backoff_policy();
            println!("Initial delay: {:?}", policy.initial_delay);

            let mut elapsed = policy.initial_delay;
            for (i, delay) in policy.schedule().enumerate().take(10_000) {
                if elapsed + delay > policy.max_elapsed {
                    break;
                }
                elapsed += delay;
                println!("  retry {:>3}: wait {:?} (elapsed {:?})", i + 1, delay, elapsed);
            }
            println!("Give up after: {:?}", policy.max_elapsed);
        }
        _ => {
            eprintln!("No subcommand provided. Use --help for usage information.");
            std::process::exit(1);
        }
    }

    Ok(())
}
