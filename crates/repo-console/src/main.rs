//! Console client for the remote code repository, plus a demo server.
//!
//! The client side is a thin consumer of the comm layer's request API:
//! each subcommand issues one request, marshals the callback result back
//! onto the main task over a oneshot channel, prints it, and runs the
//! graceful two-phase shutdown.

mod handlers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use repo_comm::{
    check_in_folder, CheckInFolder, CommConfig, CommService, Endpoint, FileKey, PathsConfig,
    RepoServer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "repo-console")]
#[command(about = "Console client for the remote code repository")]
struct Args {
    /// Host to bind the client listener to
    #[arg(long, default_value = CommConfig::DEFAULT_HOST)]
    bind_host: String,

    /// Port to bind the client listener to (0 = auto-assign)
    #[arg(long, default_value_t = 0)]
    bind_port: u16,

    /// Repository server host
    #[arg(long, default_value = CommConfig::DEFAULT_HOST)]
    server_host: String,

    /// Repository server port
    #[arg(long, default_value_t = CommConfig::DEFAULT_SERVER_PORT)]
    server_port: u16,

    /// User identity sent with requests
    #[arg(long, default_value = "console")]
    user: String,

    /// Enable debug logging and the verbose message echo
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether the repository server is alive
    Ping,
    /// List packages in the repository
    Packages {
        #[arg(long)]
        category: Option<String>,
    },
    /// List the files of a package
    Files { package: String },
    /// Show a file's metadata (key form: package#namespace#filename.version)
    Metadata { key: String },
    /// Request a file's text; it is delivered to the local save directory
    Text { key: String },
    /// Check a file out of the repository
    CheckOut {
        key: String,
        /// Also check out the file's dependency closure
        #[arg(long)]
        with_dependencies: bool,
    },
    /// Check a package folder into the repository
    CheckIn {
        source_dir: PathBuf,
        #[arg(long)]
        package: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = PathsConfig::STAGING_DIR_NAME)]
        staging_dir: PathBuf,
        /// Filename patterns, applied in order
        #[arg(long, default_values_t = [String::from("*.h"), String::from("*.cpp")])]
        patterns: Vec<String>,
    },
    /// Run the demo repository server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    if matches!(args.command, Command::Serve) {
        return serve(&args).await;
    }
    run_client(&args).await
}

async fn run_client(args: &Args) -> Result<()> {
    let service = CommService::new(args.bind_host.clone(), args.bind_port);
    service
        .start(args.server_host.clone(), args.server_port)
        .await?;
    let requests = service.requests()?;
    let verbose = args.debug;
    let user = args.user.as_str();

    match &args.command {
        Command::Ping => {
            let (tx, rx) = oneshot::channel();
            requests
                .ping(verbose, move |response| {
                    let _ = tx.send(response);
                })
                .await?;
            let response = rx.await?;
            println!("server alive: {}", response.server_active);
        }
        Command::Packages { category } => {
            let (tx, rx) = oneshot::channel();
            requests
                .get_repo_packages(category.as_deref(), user, verbose, move |response| {
                    let _ = tx.send(response);
                })
                .await?;
            for package in rx.await?.packages {
                println!("{package}");
            }
        }
        Command::Files { package } => {
            let (tx, rx) = oneshot::channel();
            requests
                .get_package_files(package, user, verbose, move |response| {
                    let _ = tx.send(response);
                })
                .await?;
            for file in rx.await?.files {
                println!("{file}");
            }
        }
        Command::Metadata { key } => {
            let file: FileKey = key.parse()?;
            let (tx, rx) = oneshot::channel();
            requests
                .get_file_metadata(&file, user, verbose, move |response| {
                    let _ = tx.send(response);
                })
                .await?;
            let metadata = rx.await?.metadata;
            println!("author:      {}", metadata.author);
            println!("description: {}", metadata.description);
            for dependency in metadata.dependencies {
                println!("dependency:  {dependency}");
            }
        }
        Command::Text { key } => {
            let file: FileKey = key.parse()?;
            let (tx, rx) = oneshot::channel();
            requests
                .get_file_text(&file, user, verbose, move |response| {
                    let _ = tx.send(response);
                })
                .await?;
            let response = rx.await?;
            println!(
                "file text requested ({}); it arrives in the {} directory",
                response.request_id,
                PathsConfig::SAVE_DIR_NAME
            );
        }
        Command::CheckOut {
            key,
            with_dependencies,
        } => {
            let file: FileKey = key.parse()?;
            let (tx, rx) = oneshot::channel();
            requests
                .check_out(&file, *with_dependencies, user, verbose, move |response| {
                    let _ = tx.send(response);
                })
                .await?;
            println!("check-out success: {}", rx.await?.success);
        }
        Command::CheckIn {
            source_dir,
            package,
            namespace,
            description,
            category,
            staging_dir,
            patterns,
        } => {
            let options = CheckInFolder {
                package: package.clone(),
                namespace: namespace.clone(),
                description: description.clone(),
                category: category.clone(),
                source_dir: source_dir.clone(),
                staging_dir: staging_dir.clone(),
                patterns: patterns.clone(),
                user_id: args.user.clone(),
                verbose,
            };
            let (tx, rx) = oneshot::channel();
            let issued = check_in_folder(&requests, &options, move |responses| {
                let _ = tx.send(responses);
            })
            .await?;
            info!(issued, "check-in requests posted");
            for response in rx.await? {
                println!(
                    "check-in {}: success={}",
                    response.request_id, response.success
                );
            }
        }
        Command::Serve => unreachable!("handled before client setup"),
    }

    let (tx, rx) = oneshot::channel();
    service
        .stop(move || {
            let _ = tx.send(());
        })
        .await?;
    rx.await?;
    Ok(())
}

async fn serve(args: &Args) -> Result<()> {
    let endpoint = Endpoint::new(args.server_host.clone(), args.server_port);
    let handle = RepoServer::start(&endpoint, Arc::new(handlers::DemoHandlers)).await?;
    info!(endpoint = %handle.endpoint(), "demo repository server running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.stop().await?;
    Ok(())
}
