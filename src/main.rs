//! cyphered - serve a directory over HTTPS with a throwaway certificate
//!
//! Generates a self-signed certificate for `--host` at startup, serves
//! `--path` with it, and removes the certificate files on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use cyphered_cert::{CertificateIssuer, LifecycleGuard};
use cyphered_server::{FileServer, FileServerConfig, TlsFiles};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// cyphered - Serve a directory over HTTPS with a throwaway self-signed certificate
#[derive(Parser, Debug)]
#[command(name = "cyphered")]
#[command(about = "Serve a directory over HTTPS with a throwaway self-signed certificate")]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
#[command(long_about = r#"
Serve a directory over HTTPS. Unless a certificate is given, a P-256
self-signed certificate valid for one year is generated for --host and
written to the temp directory. It is removed again on Ctrl+C or SIGTERM.

EXAMPLES:
  # Serve the current directory on https://127.0.0.1:8443
  cyphered

  # Serve ./public for other machines on the LAN
  cyphered --path ./public --host 192.168.1.20 --port 9443

  # Use an existing certificate
  cyphered --cert cert.pem --key key.pem

  # Plain HTTP
  cyphered --http --port 8080
"#)]
struct Cli {
    /// Port to open
    #[arg(long, env = "CYPHERED_PORT", default_value_t = 8443)]
    port: u16,

    /// Path to expose
    #[arg(long, env = "CYPHERED_PATH", default_value = "./")]
    path: PathBuf,

    /// IP address or DNS name the generated certificate is issued for
    #[arg(long, env = "CYPHERED_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Address to listen on
    #[arg(long, env = "CYPHERED_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Serve plain HTTP instead of HTTPS
    #[arg(long, env = "CYPHERED_HTTP", conflicts_with_all = ["cert", "key"])]
    http: bool,

    /// PEM certificate to serve with instead of generating one
    #[arg(long, env = "CYPHERED_CERT", requires = "key")]
    cert: Option<PathBuf>,

    /// PEM private key matching --cert
    #[arg(long, env = "CYPHERED_KEY", requires = "cert")]
    key: Option<PathBuf>,

    /// Directory for the generated certificate files (default: OS temp dir)
    #[arg(long, env = "CYPHERED_CERT_DIR", conflicts_with_all = ["http", "cert"])]
    cert_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// How connections are secured
#[derive(Debug, PartialEq)]
enum Transport {
    Http,
    /// Operator-supplied files, never deleted
    ProvidedTls { cert_path: PathBuf, key_path: PathBuf },
    GeneratedTls,
}

impl Cli {
    fn transport(&self) -> Transport {
        if self.http {
            return Transport::Http;
        }
        match (&self.cert, &self.key) {
            (Some(cert_path), Some(key_path)) => Transport::ProvidedTls {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            },
            _ => Transport::GeneratedTls,
        }
    }

    fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    info!("cyphered starting...");

    // Paths the guard deletes on shutdown: only what we generated
    let mut generated: Vec<PathBuf> = Vec::new();

    let tls = match cli.transport() {
        Transport::Http => {
            warn!("⚠️  TLS disabled, serving plain HTTP");
            None
        }
        Transport::ProvidedTls {
            cert_path,
            key_path,
        } => Some(TlsFiles {
            cert_path,
            key_path,
        }),
        Transport::GeneratedTls => {
            let mut issuer = CertificateIssuer::new();
            if let Some(ref dir) = cli.cert_dir {
                issuer = issuer.with_temp_dir(dir);
            }

            let issued = issuer
                .issue(&cli.host)
                .context("Failed to generate self-signed certificate")?;
            generated = issued.paths();

            Some(TlsFiles {
                cert_path: issued.cert_path().to_path_buf(),
                key_path: issued.key_path().to_path_buf(),
            })
        }
    };

    LifecycleGuard::register(generated.clone()).context("Failed to install signal handler")?;

    let config = FileServerConfig {
        bind_addr: cli.bind_addr(),
        root: cli.path.clone(),
        tls,
    };

    let server = match FileServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            // Not serving, so nothing else will clean up
            LifecycleGuard::new(generated).clean();
            return Err(e).context("Failed to start file server");
        }
    };

    // With --port 0 the kernel picks the port
    let addr = server.local_addr().context("Failed to read listening address")?;
    let scheme = if server.is_tls() { "https" } else { "http" };
    info!("Starting up the server in {} mode on {}", scheme, addr);

    server.serve().await.context("File server stopped")?;

    Ok(())
}
