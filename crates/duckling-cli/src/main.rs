//! Duckling CLI - Gemini proxy for the HTTP web

mod server;

use clap::{ArgAction, Parser, Subcommand};
use duckling::{
    ConfigError, ConversionOptions, FetchOptions, Gateway, GeminiRequest, GeminiResponse, VERSION,
};
use server::{ServeError, Server};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Duckling Proxy - serves HTTP pages to Gemini clients as gemtext
#[derive(Parser, Debug)]
#[command(name = "duckling")]
#[command(author, about, long_about = None, disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Where to start citation numbering
    #[arg(short = 's', long, default_value_t = 1)]
    citation_start: usize,

    /// Use footnote style citation markers
    #[arg(short = 'm', long)]
    citation_markers: bool,

    /// Number the links
    #[arg(short = 'n', long)]
    numbered_links: bool,

    /// Pretty tables - works with most simple tables
    #[arg(short = 'r', long)]
    pretty_tables: bool,

    /// Emit links to included images
    #[arg(short = 'e', long, default_value_t = true, action = ArgAction::Set)]
    emit_images_as_links: bool,

    /// Emit gathered links after this many blocks
    #[arg(short = 'l', long, default_value_t = 2)]
    link_emit_frequency: usize,

    /// Server certificate path (PEM)
    #[arg(short = 'c', long)]
    server_cert: Option<PathBuf>,

    /// Server private key path (PEM)
    #[arg(short = 'k', long)]
    server_key: Option<PathBuf>,

    /// User agent for HTTP requests
    #[arg(short = 'u', long, default_value = "")]
    user_agent: String,

    /// Max seconds to allow for a download
    #[arg(short = 't', long, default_value_t = 10)]
    max_download_time: u64,

    /// Max seconds to allow for a connection
    #[arg(short = 'T', long, default_value_t = 5)]
    max_connect_time: u64,

    /// Port to serve on
    #[arg(short = 'p', long, default_value_t = 1965)]
    port: u16,

    /// Address to bind to
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    address: String,

    /// Do not convert HTML, pass it through as is
    #[arg(long)]
    unfiltered: bool,

    /// Print the version and exit
    #[arg(short = 'v', long)]
    version: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one URL through the proxy and print the Gemini response
    Fetch {
        /// URL to fetch
        url: String,
    },
}

impl Cli {
    /// Build the gateway described by the flags
    fn gateway(&self) -> Result<Gateway, ConfigError> {
        let conversion = ConversionOptions::builder()
            .citation_start(self.citation_start)
            .citation_markers(self.citation_markers)
            .numbered_links(self.numbered_links)
            .pretty_tables(self.pretty_tables)
            .emit_images_as_links(self.emit_images_as_links)
            .link_emit_frequency(self.link_emit_frequency)
            .build()?;

        let fetch = FetchOptions::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(Duration::from_secs(self.max_connect_time))
            .total_timeout(Duration::from_secs(self.max_download_time))
            .build()?;

        Ok(Gateway::builder()
            .fetch_options(fetch)
            .conversion_options(conversion)
            .filter_markup(!self.unfiltered)
            .build())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.version {
        writeln_safe(&format!("Duckling Proxy v{}", VERSION));
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Fatal");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ServeError> {
    let gateway = cli.gateway()?;

    match &cli.command {
        Some(Commands::Fetch { url }) => {
            run_fetch(&gateway, url).await;
            Ok(())
        }
        None => run_server(&cli, gateway).await,
    }
}

async fn run_fetch(gateway: &Gateway, url: &str) {
    let line = format!("{}\r\n", url);
    let response = match GeminiRequest::parse(line.as_bytes()) {
        Ok(request) => gateway.handle(&request.url).await,
        Err(e) => GeminiResponse::bad_request(&e),
    };

    write_safe(&response.header_bytes());
    if let Some(body) = &response.body {
        write_safe(body);
    }
}

async fn run_server(cli: &Cli, gateway: Gateway) -> Result<(), ServeError> {
    let material = server::load_key_material(
        std::env::var("CERT").ok(),
        std::env::var("KEY").ok(),
        cli.server_cert.as_deref(),
        cli.server_key.as_deref(),
    )?;
    let tls = server::tls_config(&material)?;

    info!(
        "Starting Duckling Proxy v{} on {} port: {}",
        VERSION, cli.address, cli.port
    );

    let listener = server::bind(&cli.address, cli.port).await?;
    Server::new(gateway, tls)
        .serve(listener, shutdown_signal())
        .await;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await
        }
    }
}

/// Write to stdout, exit silently on broken pipe
fn write_safe(bytes: &[u8]) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = handle.write_all(bytes).and_then(|_| handle.flush()) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

fn writeln_safe(s: &str) {
    write_safe(format!("{}\n", s).as_bytes());
}
