use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use companion::keys::{
    ADD_TOKEN_MANUALLY_KEY, ADD_TOKEN_VIA_QR_TAG_KEY, COMPENSATE_CLOCK_DRIFT_KEY,
    NEW_TOKEN_VALIDATION_KEY, QR_TAG_VALIDATION_KEY, UPDATE_DISPLAY_NAME_KEY, field_key,
    validation_key,
};
use companion::{
    CompanionError, DeviceLink, FileSettings, ImagePick, QrTagDecoder, SettingsStorage,
    SyncOutcome, SyncProtocol,
};
use shared::error::SharedError;
use shared::schema::{CompanionMessage, encode_companion_message};
use shared::tokens::TokenField;
use shared::totp::{self, ClockDrift, PLACEHOLDER_CODE};

const DEFAULT_SETTINGS_FILE: &str = "companion-settings.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "Wrist authenticator companion")]
struct Cli {
    /// JSON file acting as the settings channel.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Append every device-bound payload to this file, one JSON document per line.
    #[arg(long, value_name = "PATH")]
    outbox: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every token with its current code.
    List,
    /// Add a token through the manual entry form.
    Add(AddArgs),
    /// Set the display name of a token; an empty name restores the default.
    Rename {
        index: usize,
        name: String,
    },
    Remove {
        index: usize,
    },
    /// Move the token at FROM to position TO.
    Reorder {
        from: usize,
        to: usize,
    },
    /// Import a token from a file holding the text of a decoded QR tag.
    Import {
        #[arg(value_name = "PATH")]
        image: PathBuf,
    },
    /// Compute clock drift from a device timestamp and send it.
    Calibrate {
        #[arg(long, value_name = "MILLIS")]
        device_time_ms: u64,
    },
    /// Enable or disable clock drift compensation.
    Compensate {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct AddArgs {
    #[arg(long)]
    label: String,
    #[arg(long, default_value = "")]
    issuer: String,
    #[arg(long)]
    secret: String,
    #[arg(long)]
    algorithm: Option<String>,
    #[arg(long)]
    digits: Option<String>,
    #[arg(long)]
    period: Option<String>,
}

/// Reads the otpauth text from the file named by the image URI.
struct FileTagDecoder;

impl QrTagDecoder for FileTagDecoder {
    fn decode(&mut self, image_uri: &str) -> Result<String, CompanionError> {
        let text = fs::read_to_string(image_uri)?;
        Ok(text.trim().to_owned())
    }
}

/// Device link for the command line: payloads go to the outbox file or the log.
struct OutboxLink {
    path: Option<PathBuf>,
}

impl DeviceLink for OutboxLink {
    fn send_payload(&mut self, payload: &[u8]) -> Result<(), SharedError> {
        let Some(path) = &self.path else {
            log::info!("device payload: {}", String::from_utf8_lossy(payload));
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| SharedError::Link(format!("{}: {err}", path.display())))?;
        file.write_all(payload)
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|err| SharedError::Link(format!("{}: {err}", path.display())))
    }
}

type CliProtocol = SyncProtocol<FileSettings, OutboxLink, FileTagDecoder>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings = FileSettings::open(&cli.settings)
        .with_context(|| format!("opening {}", cli.settings.display()))?;
    let link = OutboxLink {
        path: cli.outbox.clone(),
    };
    let mut protocol = SyncProtocol::new(settings, link, FileTagDecoder)?;
    protocol.initialize()?;

    run(&mut protocol, cli.command)
}

fn run(protocol: &mut CliProtocol, command: Command) -> Result<()> {
    match command {
        Command::List => list(protocol),
        Command::Add(args) => add(protocol, &args),
        Command::Rename { index, name } => {
            let token = protocol
                .store()
                .get(index)
                .cloned()
                .with_context(|| format!("no token at index {index}"))?;
            let update = json!({ "token": token, "value": { "name": name } });
            let outcome = protocol.apply_setting(UPDATE_DISPLAY_NAME_KEY, &update.to_string())?;
            println!("{}", describe(&outcome));
            Ok(())
        }
        Command::Remove { index } => {
            let removed = protocol.remove_token(index)?;
            println!("Removed {}", removed.default_display_name());
            Ok(())
        }
        Command::Reorder { from, to } => {
            protocol.reorder_token(from, to)?;
            list(protocol)
        }
        Command::Import { image } => {
            let pick = ImagePick {
                image_uri: image.display().to_string(),
            };
            let outcome =
                protocol.apply_setting(ADD_TOKEN_VIA_QR_TAG_KEY, &serde_json::to_string(&pick)?)?;
            println!("{}", describe(&outcome));
            if let Some(message) = protocol.settings().get_item(QR_TAG_VALIDATION_KEY) {
                println!("  {message}");
            }
            Ok(())
        }
        Command::Calibrate { device_time_ms } => {
            let payload =
                encode_companion_message(&CompanionMessage::DeviceTime { now_ms: device_time_ms })?;
            let drift = protocol.handle_device_payload(&payload, unix_time_ms()?)?;
            println!("Clock drift sent to device: {} ms", drift.as_millis());
            Ok(())
        }
        Command::Compensate { enabled } => {
            let outcome =
                protocol.apply_setting(COMPENSATE_CLOCK_DRIFT_KEY, &enabled.to_string())?;
            println!("{}", describe(&outcome));
            Ok(())
        }
    }
}

fn add(protocol: &mut CliProtocol, args: &AddArgs) -> Result<()> {
    let inputs = [
        (TokenField::Label, Some(&args.label)),
        (TokenField::Issuer, Some(&args.issuer)),
        (TokenField::Secret, Some(&args.secret)),
        (TokenField::Algorithm, args.algorithm.as_ref()),
        (TokenField::Digits, args.digits.as_ref()),
        (TokenField::Period, args.period.as_ref()),
    ];
    for (field, value) in inputs {
        let value = json!({ "name": value.map(String::as_str).unwrap_or_default() });
        protocol.apply_setting(field_key(field), &value.to_string())?;
    }

    let outcome = protocol.apply_setting(ADD_TOKEN_MANUALLY_KEY, "true")?;
    println!("{}", describe(&outcome));
    if outcome == SyncOutcome::TokenRejected {
        for field in TokenField::ALL {
            if let Some(message) = protocol.settings().get_item(validation_key(field)) {
                println!("  {field}: {message}");
            }
        }
        if let Some(message) = protocol.settings().get_item(NEW_TOKEN_VALIDATION_KEY) {
            println!("  {message}");
        }
    }
    Ok(())
}

fn list(protocol: &CliProtocol) -> Result<()> {
    let store = protocol.store();
    if store.is_empty() {
        println!("No tokens configured.");
        return Ok(());
    }

    let now_ms = unix_time_ms()?;
    for (index, token) in store.list().iter().enumerate() {
        let code = totp::compute_code(token, now_ms, ClockDrift::ZERO)
            .map(|code| totp::format_code(&code))
            .unwrap_or_else(|err| {
                log::warn!("token {index} cannot produce a code: {err}");
                PLACEHOLDER_CODE.to_owned()
            });
        println!("{index:>3}  {code:<9}  {}", store.display_name(token));
    }
    Ok(())
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::TokenAdded(id) | SyncOutcome::QrImported(id) => format!("Added token {id}"),
        SyncOutcome::DisplayNameUpdated(_) => "Display name updated".to_owned(),
        SyncOutcome::DisplayNameCleared(_) => "Display name reset to default".to_owned(),
        SyncOutcome::ClockDriftToggled(enabled) => {
            format!("Clock drift compensation {}", if *enabled { "on" } else { "off" })
        }
        SyncOutcome::TokenRejected | SyncOutcome::QrRejected => "Token rejected".to_owned(),
        other => format!("{other:?}"),
    }
}

fn unix_time_ms() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(elapsed.as_millis() as u64)
}
