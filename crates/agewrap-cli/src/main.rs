//! agewrap: small age-style file encryption
//!
//! Commands:
//!   keygen                 - generate an X25519 key pair with custom prefixes
//!   encrypt / decrypt      - one file or stdin/stdout, key or passphrase
//!   encrypt-dir <dir>      - encrypt every file in a directory in place
//!   decrypt-dir <dir>      - decrypt every file in a directory in place
//!   config show            - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use agewrap_core::config::{AgewrapConfig, DEFAULT_CONFIG_PATH};
use agewrap_crypto::{
    x25519, Decryptor, Encryptor, Identity, Recipient, ScryptIdentity, ScryptRecipient,
    TransportEncoding,
};
use agewrap_files::{BatchOptions, BatchReport, ProgressFn, RotateOnWrite};

/// Environment variable consulted before prompting for a passphrase
const PASSPHRASE_ENV: &str = "AGEWRAP_PASSPHRASE";

/// Backup directory used by the dir commands when none is configured
const DEFAULT_BACKUP_DIR_NAME: &str = ".agewrap-backup";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "agewrap",
    version,
    about = "Encrypt files for X25519 keys or a passphrase",
    long_about = "agewrap: age-style envelope encryption with custom key prefixes, \
                  text transport encoding and in-place directory rotation"
)]
struct Cli {
    /// Path to agewrap.toml configuration file
    #[arg(long, short = 'c', env = "AGEWRAP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (overrides config; RUST_LOG takes precedence over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a key pair
    Keygen {
        /// Human-readable prefix for the public key (overrides config)
        #[arg(long)]
        public_prefix: Option<String>,
        /// Human-readable prefix for the private key (overrides config)
        #[arg(long)]
        private_prefix: Option<String>,
        /// Write the private key here instead of stdout (created with mode 0600)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Encrypt a file or stdin
    Encrypt {
        /// Recipient public key (repeatable)
        #[arg(long = "recipient", short = 'r', conflicts_with = "passphrase")]
        recipients: Vec<String>,
        /// Encrypt with a passphrase instead of public keys
        #[arg(long, short = 'p')]
        passphrase: bool,
        #[command(flatten)]
        io: IoArgs,
    },

    /// Decrypt a file or stdin
    Decrypt {
        /// Private key file (repeatable)
        #[arg(long = "identity", short = 'i', conflicts_with = "passphrase")]
        identities: Vec<PathBuf>,
        /// Decrypt with a passphrase
        #[arg(long, short = 'p')]
        passphrase: bool,
        #[command(flatten)]
        io: IoArgs,
    },

    /// Encrypt every regular file in a directory, replacing each in place
    #[command(name = "encrypt-dir")]
    EncryptDir {
        dir: PathBuf,
        /// Recipient public key
        #[arg(long, short = 'r')]
        recipient: String,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Decrypt every regular file in a directory, replacing each in place
    #[command(name = "decrypt-dir")]
    DecryptDir {
        dir: PathBuf,
        /// Private key file
        #[arg(long = "identity", short = 'i')]
        identity: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct IoArgs {
    /// Input file (default: stdin)
    input: Option<PathBuf>,
    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    /// Key prefix (overrides config)
    #[arg(long)]
    prefix: Option<String>,
    /// Ciphertext is base64 text using the configured transport encoding
    #[arg(long, short = 'a')]
    text: bool,
    /// Ciphertext is base64 text in this encoding (implies --text)
    #[arg(long)]
    encoding: Option<TransportEncoding>,
}

#[derive(clap::Args, Debug)]
struct BatchArgs {
    /// Key prefix (overrides config)
    #[arg(long)]
    prefix: Option<String>,
    /// Where previous versions are kept (default: <dir>/.agewrap-backup)
    #[arg(long)]
    backup_dir: Option<PathBuf>,
    /// Transport encoding for ciphertext files (overrides config)
    #[arg(long)]
    encoding: Option<TransportEncoding>,
    /// Keep going after a file fails
    #[arg(long)]
    keep_going: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AgewrapConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    init_logging(level, &config.log.format);

    match cli.command {
        Commands::Keygen { public_prefix, private_prefix, output } => cmd_keygen(
            &config,
            public_prefix.as_deref(),
            private_prefix.as_deref(),
            output.as_deref(),
        ),
        Commands::Encrypt { recipients, passphrase, io } => {
            cmd_encrypt(&config, &recipients, passphrase, &io)
        }
        Commands::Decrypt { identities, passphrase, io } => {
            cmd_decrypt(&config, &identities, passphrase, &io)
        }
        Commands::EncryptDir { dir, recipient, batch } => {
            cmd_encrypt_dir(&config, &dir, &recipient, &batch).await
        }
        Commands::DecryptDir { dir, identity, batch } => {
            cmd_decrypt_dir(&config, &dir, &identity, &batch).await
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

/// Logs go to stderr; stdout carries key and ciphertext output.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Key and passphrase helpers ────────────────────────────────────────────────

/// Read a private key file: the first non-empty line that is not a `#` comment.
fn read_private_key(path: &Path) -> Result<SecretString> {
    let content = SecretString::from(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
    );
    content
        .expose_secret()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(SecretString::from)
        .with_context(|| format!("no key found in {}", path.display()))
}

fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        return Ok(SecretString::from(passphrase));
    }
    let first = SecretString::from(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    if first.expose_secret().is_empty() {
        anyhow::bail!("passphrase must not be empty");
    }
    if confirm {
        let second = SecretString::from(
            rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?,
        );
        if first.expose_secret() != second.expose_secret() {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(first)
}

fn transport(
    config: &AgewrapConfig,
    text: bool,
    encoding: Option<TransportEncoding>,
) -> Result<Option<TransportEncoding>> {
    match encoding {
        Some(enc) => Ok(Some(enc)),
        None if text => Ok(Some(configured_encoding(config)?)),
        None => Ok(None),
    }
}

fn configured_encoding(config: &AgewrapConfig) -> Result<TransportEncoding> {
    config
        .transport
        .encoding
        .parse()
        .context("parsing transport.encoding from config")
}

fn read_input(input: Option<&Path>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match input {
        Some(path) => {
            buf = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading stdin")?;
        }
    }
    Ok(buf)
}

fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

// ── `agewrap keygen` ──────────────────────────────────────────────────────────

fn cmd_keygen(
    config: &AgewrapConfig,
    public_prefix: Option<&str>,
    private_prefix: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let public_prefix = public_prefix.unwrap_or(&config.keys.public_prefix);
    let private_prefix = private_prefix.unwrap_or(&config.keys.private_prefix);

    let (public, private) =
        agewrap_crypto::generate_key_pair(public_prefix, private_prefix, &mut rand::rngs::OsRng)
            .context("generating key pair")?;

    let rendered = SecretString::from(format!(
        "# public key: {public}\n{}\n",
        private.expose_secret()
    ));

    match output {
        Some(path) => {
            let mut file = create_private_file(path)?;
            file.write_all(rendered.expose_secret().as_bytes())
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Public key: {public}");
        }
        None => {
            print!("{}", rendered.expose_secret());
        }
    }
    Ok(())
}

/// Create a new file readable only by the owner. Refuses to overwrite.
fn create_private_file(path: &Path) -> Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .with_context(|| format!("creating key file (will not overwrite): {}", path.display()))
}

// ── `agewrap encrypt` ─────────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &AgewrapConfig,
    recipient_keys: &[String],
    passphrase: bool,
    io: &IoArgs,
) -> Result<()> {
    let recipients: Vec<Recipient> = if passphrase {
        let mut recipient = ScryptRecipient::new(read_passphrase(true)?);
        recipient
            .set_work_factor(config.scrypt.work_factor)
            .context("applying scrypt.work_factor")?;
        vec![recipient.into()]
    } else {
        if recipient_keys.is_empty() {
            anyhow::bail!("no recipients: pass --recipient or --passphrase");
        }
        let prefix = io.prefix.as_deref().unwrap_or(&config.keys.public_prefix);
        recipient_keys
            .iter()
            .map(|key| {
                x25519::Recipient::from_prefixed_str(key, prefix)
                    .map(Recipient::from)
                    .with_context(|| format!("parsing recipient {key}"))
            })
            .collect::<Result<_>>()?
    };

    let plaintext = read_input(io.input.as_deref())?;
    let encryptor = Encryptor::new(&recipients).context("building header")?;
    let mut output = open_output(io.output.as_deref())?;

    match transport(config, io.text, io.encoding)? {
        Some(encoding) => {
            let mut writer = encryptor
                .wrap_output(Vec::new(), &mut rand::rngs::OsRng)
                .context("writing header")?;
            writer.write_all(&plaintext).context("encrypting payload")?;
            let container = writer.finish().context("finishing payload")?;
            writeln!(output, "{}", encoding.encode(&container)).context("writing output")?;
        }
        None => {
            let mut writer = encryptor
                .wrap_output(&mut output, &mut rand::rngs::OsRng)
                .context("writing header")?;
            writer.write_all(&plaintext).context("encrypting payload")?;
            writer.finish().context("finishing payload")?;
        }
    }
    output.flush().context("flushing output")?;
    Ok(())
}

// ── `agewrap decrypt` ─────────────────────────────────────────────────────────

fn cmd_decrypt(
    config: &AgewrapConfig,
    identity_files: &[PathBuf],
    passphrase: bool,
    io: &IoArgs,
) -> Result<()> {
    let identities: Vec<Identity> = if passphrase {
        let identity = ScryptIdentity::new(read_passphrase(false)?)
            .with_max_work_factor(config.scrypt.max_work_factor);
        vec![identity.into()]
    } else {
        if identity_files.is_empty() {
            anyhow::bail!("no identities: pass --identity or --passphrase");
        }
        let prefix = io.prefix.as_deref().unwrap_or(&config.keys.private_prefix);
        identity_files
            .iter()
            .map(|path| {
                let key = read_private_key(path)?;
                x25519::Identity::from_prefixed_str(key.expose_secret(), prefix)
                    .map(Identity::from)
                    .with_context(|| format!("parsing private key in {}", path.display()))
            })
            .collect::<Result<_>>()?
    };

    let mut input = read_input(io.input.as_deref())?;
    if let Some(encoding) = transport(config, io.text, io.encoding)? {
        let text = std::str::from_utf8(&input).context("ciphertext is not text")?;
        input = encoding.decode(text.trim()).context("decoding ciphertext")?;
    }

    let decryptor = Decryptor::new(input.as_slice()).context("reading header")?;
    if decryptor.is_scrypt() && !passphrase {
        anyhow::bail!("file is passphrase-encrypted, use --passphrase");
    }
    let mut reader = decryptor.decrypt(&identities).context("unwrapping file key")?;

    // Buffer so nothing reaches the output unless the whole payload verifies
    let mut plaintext = Vec::new();
    reader.read_to_end(&mut plaintext).context("decrypting payload")?;

    let mut output = open_output(io.output.as_deref())?;
    output.write_all(&plaintext).context("writing output")?;
    output.flush().context("flushing output")?;
    Ok(())
}

// ── `agewrap encrypt-dir` / `decrypt-dir` ─────────────────────────────────────

fn batch_setup(
    config: &AgewrapConfig,
    dir: &Path,
    args: &BatchArgs,
) -> Result<(RotateOnWrite, BatchOptions)> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }
    let backup_dir = args
        .backup_dir
        .clone()
        .or_else(|| config.batch.backup_dir.clone())
        .unwrap_or_else(|| dir.join(DEFAULT_BACKUP_DIR_NAME));

    let options = BatchOptions {
        fail_fast: config.batch.fail_fast && !args.keep_going,
        encoding: match args.encoding {
            Some(enc) => enc,
            None => configured_encoding(config)?,
        },
        keep_backups: config.batch.keep_backups,
    };
    Ok((RotateOnWrite::new(backup_dir), options))
}

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, path| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
    })
}

fn print_report(operation: &str, rotate: &RotateOnWrite, report: &BatchReport) -> Result<()> {
    println!();
    println!("{operation} complete:");
    println!("  processed: {} files", report.processed.len());
    println!("  failed:    {} files", report.failed.len());
    println!("  skipped:   {} files", report.skipped.len());
    println!("  backups:   {}", rotate.backup_dir().display());
    for failure in &report.failed {
        println!("  ✗ {}: {}", failure.path.display(), failure.error);
    }
    if !report.is_complete() {
        anyhow::bail!(
            "{operation} incomplete: {} failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        );
    }
    Ok(())
}

async fn cmd_encrypt_dir(
    config: &AgewrapConfig,
    dir: &Path,
    recipient: &str,
    args: &BatchArgs,
) -> Result<()> {
    let (rotate, options) = batch_setup(config, dir, args)?;
    let prefix = args.prefix.as_deref().unwrap_or(&config.keys.public_prefix);

    let pb = make_progress_bar("encrypt");
    let progress = progress_callback(&pb);
    let report = agewrap_files::encrypt_dir(dir, &rotate, recipient, prefix, &options, Some(&progress))
        .await
        .with_context(|| format!("encrypting directory {}", dir.display()))?;
    pb.finish_with_message("done".to_string());

    print_report("encrypt", &rotate, &report)
}

async fn cmd_decrypt_dir(
    config: &AgewrapConfig,
    dir: &Path,
    identity: &Path,
    args: &BatchArgs,
) -> Result<()> {
    let (rotate, options) = batch_setup(config, dir, args)?;
    let prefix = args.prefix.as_deref().unwrap_or(&config.keys.private_prefix);
    let private_key = read_private_key(identity)?;

    let pb = make_progress_bar("decrypt");
    let progress = progress_callback(&pb);
    let report =
        agewrap_files::decrypt_dir(dir, &rotate, &private_key, prefix, &options, Some(&progress))
            .await
            .with_context(|| format!("decrypting directory {}", dir.display()))?;
    pb.finish_with_message("done".to_string());

    print_report("decrypt", &rotate, &report)
}

// ── `agewrap config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &AgewrapConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml_string().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
