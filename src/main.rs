//! Certstore CLI - root CA generation, leaf issuance and certificate inspection

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

use certstore::tls::{self, CertificateEncoding};
use certstore::{CertStore, Config, Digest, GeneratedCa, ParsedCertificate, RemoteCertificateFetcher};

#[derive(Parser)]
#[command(name = "certstore")]
#[command(about = "On-demand X.509 leaf certificates for TLS interception proxies")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a root CA and export it
    GenerateCa {
        /// CA bundle path; the certificate files are written next to it
        #[arg(short, long)]
        out: PathBuf,

        /// RSA key size (overrides config)
        #[arg(long)]
        key_bits: Option<usize>,

        /// Signing digest: sha256, sha384 or sha512 (overrides config)
        #[arg(long)]
        digest: Option<Digest>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Issue (or look up) a leaf certificate
    Cert {
        /// Common name of the leaf
        common_name: String,

        /// DNS subjectAltName entries, in order
        #[arg(long = "san")]
        sans: Vec<String>,

        /// CA bundle (overrides config)
        #[arg(long)]
        ca: Option<PathBuf>,

        /// Store directory (overrides config). Without one the PEM is printed.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the details of a certificate file
    Inspect {
        /// Certificate file
        file: PathBuf,

        /// Read the file as DER instead of PEM
        #[arg(long)]
        der: bool,
    },

    /// Print the certificate a TLS server presents
    Fetch {
        host: String,
        port: u16,

        /// Server name to send; no SNI extension when omitted
        #[arg(long)]
        sni: Option<String>,

        /// Connect and handshake timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_logging(cli_level: Option<&str>, config: &Config) {
    let level = cli_level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> certstore::Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::parse(""),
    }
}

fn print_certificate(cert: &ParsedCertificate) -> Result<(), Box<dyn std::error::Error>> {
    let format_name = |attrs: &[(String, String)]| {
        attrs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let (algorithm, bits) = cert.key_info();

    println!("  Common name: {}", cert.common_name().unwrap_or("(none)"));
    println!("  Subject:     {}", format_name(cert.subject()));
    println!("  Issuer:      {}", format_name(cert.issuer()));
    if cert.subject_alt_names().is_empty() {
        println!("  SANs:        (none)");
    } else {
        println!("  SANs:        {}", cert.subject_alt_names().join(", "));
    }
    println!("  Not before:  {}", cert.not_before()?.format(&Rfc3339)?);
    println!("  Not after:   {}", cert.not_after()?.format(&Rfc3339)?);
    println!("  Expired:     {}", cert.has_expired());
    println!("  Serial:      {}", cert.serial());
    println!("  Key:         {:?} {} bits", algorithm, bits);
    println!("  SHA-256:     {}", cert.digest("sha256")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::GenerateCa {
            out,
            key_bits,
            digest,
            config,
        } => {
            let cfg = load_config(config.as_ref())?;
            init_logging(log_level, &cfg);

            let mut settings = cfg.ca.settings();
            if let Some(bits) = key_bits {
                settings.key_bits = bits;
            }
            if let Some(digest) = digest {
                settings.digest = digest;
            }

            println!("Generating CA certificate...");

            let ca = tokio::task::spawn_blocking(move || GeneratedCa::generate(&settings)).await??;
            let paths = ca.export(&out)?;

            println!("CA certificate generated successfully!");
            println!();
            println!("  Bundle (key + cert): {}", paths.bundle.display());
            println!("  Certificate (PEM):   {}", paths.cert_pem.display());
            println!("  Certificate (CER):   {}", paths.cert_cer.display());
            println!("  PKCS#12:             {}", paths.cert_p12.display());
            println!();
            println!("To issue a leaf:");
            println!(
                "  certstore cert example.com --san example.com --ca {}",
                paths.bundle.display()
            );
            println!();
            println!("IMPORTANT: The bundle and the PKCS#12 file hold the private key!");
        }

        Commands::Cert {
            common_name,
            sans,
            ca,
            store,
            config,
        } => {
            let cfg = load_config(config.as_ref())?;
            init_logging(log_level, &cfg);

            let Some(ca_bundle) = ca.or_else(|| cfg.ca.bundle_path()) else {
                eprintln!("Error: a CA bundle is required.");
                eprintln!();
                eprintln!("Either set [ca] path in the config file or pass --ca.");
                eprintln!();
                eprintln!("To generate a new CA:");
                eprintln!("  certstore generate-ca --out ./mitmproxy-ca.pem");
                std::process::exit(1);
            };

            let Some(dir) = store.or_else(|| cfg.store.directory.clone()) else {
                tls::issue(
                    &ca_bundle,
                    &common_name,
                    &sans,
                    cfg.ca.digest,
                    std::io::stdout().lock(),
                )?;
                return Ok(());
            };

            let store = CertStore::open(dir)?.with_digest(cfg.ca.digest);
            match store.get_certificate(&common_name, &sans, Some(ca_bundle.as_path()))? {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("Error: '{}' is not an acceptable hostname", common_name);
                    std::process::exit(1);
                }
            }
        }

        Commands::Inspect { file, der } => {
            init_logging(log_level, &Config::default());

            let cert = if der {
                ParsedCertificate::load(&std::fs::read(&file)?, CertificateEncoding::Der)?
            } else {
                ParsedCertificate::from_file(&file)?
            };
            println!("Certificate: {}", file.display());
            print_certificate(&cert)?;
        }

        Commands::Fetch {
            host,
            port,
            sni,
            timeout,
        } => {
            init_logging(log_level, &Config::default());

            let fetcher = RemoteCertificateFetcher::new(Duration::from_secs(timeout));
            let cert = fetcher.fetch(&host, port, sni.as_deref()).await?;
            println!("Certificate presented by {}:{}", host, port);
            print_certificate(&cert)?;
        }

        Commands::ValidateConfig { config } => {
            println!("Validating configuration: {}", config.display());

            let cfg = Config::from_file(&config)?;

            println!("Configuration is valid!");
            println!();
            println!(
                "  CA bundle: {}",
                cfg.ca
                    .bundle_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  Key bits: {}", cfg.ca.key_bits);
            println!("  Digest: {}", cfg.ca.digest);
            println!("  CA subject: CN={}, O={}", cfg.ca.common_name, cfg.ca.organization);
            println!(
                "  Store: {}",
                cfg.store
                    .directory
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(temporary)".to_string())
            );
            println!("  Log level: {}", cfg.logging.level);
        }
    }

    Ok(())
}
