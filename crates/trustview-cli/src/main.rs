//! TrustView CLI — `tvc` command.
//!
//! Validates certificate paths against a local trust view and inspects or
//! maintains that view: assessments, certificates, the watchlist and
//! stored revocation data.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use trustview::config::{RevocationSettings, ValidationSettings};
use trustview::retry::transact;
use trustview::revocation::info::{supported_urls, CrlData, CrlInfo, ServiceKey};
use trustview::time::{micros_to_rfc3339, now_micros};
use trustview::{
    refresh_trust_view, Configuration, LocalModel, Model, OfflineFetcher, RetryPolicy,
    RevocationValidator, TrustCertificate, TrustView, TrustViewError, ValidationOracle,
    ValidationRequest, ValidationResult, Validator,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

fn trustview_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".trustview")
}

fn default_store() -> PathBuf {
    trustview_dir().join("trustview.json")
}

fn default_config() -> PathBuf {
    trustview_dir().join("config.json")
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// TrustView CLI — validate certificate paths against an evidence-based
/// local trust view.
#[derive(Parser, Debug)]
#[command(
    name = "tvc",
    about = "TrustView CLI",
    version,
    long_about = "tvc — TrustView CLI\n\nValidate certificate paths against a local, evidence-based trust view\nand maintain its assessments, watchlist and revocation data."
)]
struct Cli {
    /// Trust view snapshot file (default: ~/.trustview/trustview.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Configuration file (default: ~/.trustview/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a certificate path given as a JSON validation request
    Validate {
        /// Request file
        request: PathBuf,
    },

    /// List trust assessments
    Assessments,

    /// List certificates known to the trust view
    Certs {
        /// Only trusted certificates
        #[arg(long, conflicts_with = "untrusted")]
        trusted: bool,

        /// Only untrusted certificates
        #[arg(long)]
        untrusted: bool,
    },

    /// Inspect and edit the certificate watchlist
    Watchlist {
        #[command(subcommand)]
        subcommand: WatchlistCommands,
    },

    /// Revocation checking
    Revocation {
        #[command(subcommand)]
        subcommand: RevocationCommands,
    },

    /// Remove expired watchlist entries, assessments and certificates
    Clean,

    /// Remove all assessments and certificates
    Erase,

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
enum WatchlistCommands {
    /// List watched certificates
    List,

    /// Watch a certificate given as JSON
    Add {
        /// Certificate file
        certificate: PathBuf,
    },

    /// Stop watching a certificate given as JSON
    Remove {
        /// Certificate file
        certificate: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum RevocationCommands {
    /// Check every certificate of the trust view using stored revocation data
    Check,

    /// Store CRL data obtained elsewhere
    ImportCrl {
        /// CRL import file: {"issuer": <certificate>, "urls": [...], "crl": {...}}
        file: PathBuf,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;
    let store = cli.store.unwrap_or_else(default_store);
    let config = cli.config.unwrap_or_else(default_config);

    let result = match cli.command {
        Commands::Validate { request } => cmd_validate(&store, &config, &request),
        Commands::Assessments => cmd_assessments(&store, verbose),
        Commands::Certs { trusted, untrusted } => cmd_certs(&store, trusted, untrusted),
        Commands::Watchlist { subcommand } => match subcommand {
            WatchlistCommands::List => cmd_watchlist_list(&store),
            WatchlistCommands::Add { certificate } => cmd_watchlist_add(&store, &certificate),
            WatchlistCommands::Remove { certificate } => cmd_watchlist_remove(&store, &certificate),
        },
        Commands::Revocation { subcommand } => match subcommand {
            RevocationCommands::Check => cmd_revocation_check(&store, &config),
            RevocationCommands::ImportCrl { file } => cmd_import_crl(&store, &file),
        },
        Commands::Clean => cmd_clean(&store, &config),
        Commands::Erase => cmd_erase(&store),
        Commands::Config => cmd_config(&config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn open_model(store: &Path) -> Result<LocalModel> {
    log::debug!("Using trust view {}", store.display());
    if let Some(parent) = store.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    LocalModel::open(store).with_context(|| format!("failed to open trust view {}", store.display()))
}

fn load_config(path: &Path) -> Result<Configuration> {
    Configuration::load(path).with_context(|| format!("failed to load configuration {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Stand-in for a remote validation service: none is reachable from the
/// command line.
struct Unreachable;

impl ValidationOracle for Unreachable {
    fn query(&self, _certificate: &TrustCertificate) -> trustview::Result<ValidationResult> {
        Err(TrustViewError::OracleFailure(
            "no validation service is reachable from tvc; set override-validation-service-result"
                .into(),
        ))
    }
}

fn print_certificate(certificate: &TrustCertificate, flags: &str) {
    println!(
        "  {:<20} {:<28} {:<28} {}",
        certificate.serial, certificate.issuer, certificate.subject, flags
    );
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_validate(store: &Path, config: &Path, request: &Path) -> Result<()> {
    let model = open_model(store)?;
    let config = load_config(config)?;
    let request: ValidationRequest = read_json(request)?;

    let revocation = Arc::new(RevocationValidator::new(
        Arc::new(OfflineFetcher),
        RevocationSettings::from_config(&config)?,
    ));
    let validator = Validator::new(Arc::new(Unreachable)).with_revocation(revocation);
    let info = validator.validate(&model, &config, &request);

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_assessments(store: &Path, verbose: bool) -> Result<()> {
    let model = open_model(store)?;
    let view = model.open_trust_view()?;
    let mut assessments = view.assessments();
    assessments.sort_by(|a, b| a.key.cmp(&b.key));

    println!("Assessments ({}):", assessments.len());
    if assessments.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for assessment in &assessments {
        println!("  {}", assessment.key);
        match assessment.o_kl.opinion() {
            Some(o_kl) => println!("    key legitimacy:   {o_kl}"),
            None => println!("    key legitimacy:   (absent)"),
        }
        println!(
            "    trust as CA:      {}  E={:.4}",
            assessment.o_it_ca,
            assessment.o_it_ca.expectation()
        );
        println!(
            "    trust for hosts:  {}  E={:.4}",
            assessment.o_it_ee,
            assessment.o_it_ee.expectation()
        );
        if verbose {
            println!("    updated:          {}", micros_to_rfc3339(assessment.updated_at));
            for certificate in &assessment.s {
                println!("    seen:             {certificate}");
            }
        }
    }
    Ok(())
}

fn cmd_certs(store: &Path, trusted: bool, untrusted: bool) -> Result<()> {
    let model = open_model(store)?;
    let view = model.open_trust_view()?;
    let mut certificates = if trusted {
        view.trusted_certificates()
    } else if untrusted {
        view.untrusted_certificates()
    } else {
        view.certificates()
    };
    certificates.sort();

    println!("Certificates ({}):", certificates.len());
    if certificates.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    println!("  {:<20} {:<28} {:<28} FLAGS", "SERIAL", "ISSUER", "SUBJECT");
    println!("  {}", "-".repeat(90));
    for certificate in &certificates {
        let mut flags = Vec::new();
        if view.is_trusted(certificate) {
            flags.push("trusted");
        }
        if view.is_untrusted(certificate) {
            flags.push("untrusted");
        }
        if view.is_revoked(certificate) {
            flags.push("revoked");
        }
        print_certificate(certificate, &flags.join(","));
    }
    Ok(())
}

fn cmd_watchlist_list(store: &Path) -> Result<()> {
    let model = open_model(store)?;
    let view = model.open_trust_view()?;
    let mut watchlist = view.watchlist();
    watchlist.sort_by(|a, b| a.0.cmp(&b.0));

    println!("Watchlist ({}):", watchlist.len());
    if watchlist.is_empty() {
        println!("  (none)");
    }
    for (certificate, added) in &watchlist {
        print_certificate(certificate, &format!("since {}", micros_to_rfc3339(*added)));
    }
    Ok(())
}

fn cmd_watchlist_add(store: &Path, certificate: &Path) -> Result<()> {
    let model = open_model(store)?;
    let certificate: TrustCertificate = read_json(certificate)?;
    certificate.validate()?;

    transact(&model, &RetryPolicy::validation(), |view| {
        view.add_to_watchlist(&certificate, now_micros());
        Ok(())
    })?;
    println!("Watching {certificate}");
    Ok(())
}

fn cmd_watchlist_remove(store: &Path, certificate: &Path) -> Result<()> {
    let model = open_model(store)?;
    let certificate: TrustCertificate = read_json(certificate)?;

    let removed = transact(&model, &RetryPolicy::validation(), |view| {
        let watched = view.watchlist_timestamp(&certificate).is_some();
        view.remove_from_watchlist(&certificate);
        Ok(watched)
    })?;
    if !removed {
        return Err(anyhow!("{certificate} is not on the watchlist"));
    }
    println!("Stopped watching {certificate}");
    Ok(())
}

fn cmd_revocation_check(store: &Path, config: &Path) -> Result<()> {
    let model = open_model(store)?;
    let config = load_config(config)?;
    let validator = RevocationValidator::new(
        Arc::new(OfflineFetcher),
        RevocationSettings::from_config(&config)?,
    );

    let report = refresh_trust_view(&model, &validator, &RetryPolicy::revocation())
        .context("revocation check failed")?;
    println!("Checked:  {}", report.checked);
    println!("Revoked:  {}", report.revoked);
    Ok(())
}

#[derive(Deserialize)]
struct CrlImport {
    issuer: TrustCertificate,
    urls: Vec<String>,
    crl: CrlData,
}

fn cmd_import_crl(store: &Path, file: &Path) -> Result<()> {
    let model = open_model(store)?;
    let import: CrlImport = read_json(file)?;
    let urls = supported_urls(&import.urls);
    if urls.is_empty() {
        return Err(anyhow!("no supported CRL URL in {}", file.display()));
    }
    let revoked = import.crl.revoked_serials.len();
    let info = CrlInfo::from_data(ServiceKey::new(import.issuer.clone(), &urls), import.crl);

    transact(&model, &RetryPolicy::validation(), |view| {
        view.add_crl(info.clone());
        Ok(())
    })?;
    println!(
        "Imported CRL of {} ({} revoked serials)",
        import.issuer, revoked
    );
    Ok(())
}

fn cmd_clean(store: &Path, config: &Path) -> Result<()> {
    let model = open_model(store)?;
    let settings = ValidationSettings::from_config(&load_config(config)?)?;

    let (assessments, certificates) = transact(&model, &RetryPolicy::validation(), |view| {
        view.clean(
            now_micros(),
            settings.watchlist_expiration,
            settings.assessment_expiration,
        );
        Ok((view.assessments().len(), view.certificates().len()))
    })?;
    println!("Trust view cleaned: {assessments} assessments, {certificates} certificates remain");
    Ok(())
}

fn cmd_erase(store: &Path) -> Result<()> {
    let model = open_model(store)?;
    transact(&model, &RetryPolicy::validation(), |view| {
        view.erase();
        Ok(())
    })?;
    println!("Trust view erased");
    Ok(())
}

fn cmd_config(config: &Path) -> Result<()> {
    let config = load_config(config)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
