//! CLI subcommands: `bulwark consent …` works on the file-backed consent
//! record, `bulwark privacy …` files data requests with the privacy endpoints.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use bulwark_consent::{
    AnalyticsGate, ConsentCategory, ConsentEvents, ConsentManager, ConsentUpdate, FileStorage,
};
use bulwark_core::SiteConfig;
use bulwark_leads::{DeletionRequest, LeadClient, UnsubscribeRequest};

pub const USAGE: &str = "\
Usage: bulwark consent <action>

Actions:
  show                         Print the stored record
  accept-all                   Grant every category
  reject-all                   Refuse every optional category
  set <category>=<bool> ...    Save explicit choices (omitted = refused)
  check <category>             Print whether a category is allowed
  reset                        Forget the record";

pub const PRIVACY_USAGE: &str = "\
Usage: bulwark privacy <action>

Actions:
  delete-data <email> [reason]  Ask for all data held about <email> to be erased
  unsubscribe <email> [reason]  Stop marketing email to <email>";

/// Top-level subcommand, decided before any configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Consent,
    Privacy,
    Help,
    Unknown(String),
}

impl Command {
    pub fn parse(args: &[String]) -> Self {
        match args.get(1).map(String::as_str) {
            None => Self::Serve,
            Some("consent") => Self::Consent,
            Some("privacy") => Self::Privacy,
            Some("--help" | "-h" | "help") => Self::Help,
            Some(other) => Self::Unknown(other.to_string()),
        }
    }

    /// Whether running this command reads `SiteConfig` (and creates the data directory).
    pub fn needs_config(&self) -> bool {
        matches!(self, Self::Serve | Self::Consent | Self::Privacy)
    }
}

fn manager(config: &SiteConfig) -> ConsentManager {
    let storage = FileStorage::new(&config.data_paths.consent_file);
    ConsentManager::new(
        Arc::new(storage),
        ConsentEvents::new(),
        config.consent.clone(),
    )
}

/// Run one consent action and return what should be printed.
pub fn run(config: &SiteConfig, args: &[String]) -> anyhow::Result<String> {
    let manager = manager(config);
    let action = args.first().map(String::as_str).unwrap_or("show");

    match action {
        "show" => Ok(show(&manager)),
        "accept-all" => {
            let record = manager.accept_all();
            Ok(serde_json::to_string_pretty(&record)?)
        }
        "reject-all" => {
            let record = manager.reject_all();
            Ok(serde_json::to_string_pretty(&record)?)
        }
        "set" => {
            let update = parse_update(&args[1..])?;
            let record = manager.save_consent_preferences(update);
            Ok(serde_json::to_string_pretty(&record)?)
        }
        "check" => {
            let name = args
                .get(1)
                .ok_or_else(|| anyhow!("check needs a category\n\n{}", USAGE))?;
            let category: ConsentCategory = name.parse()?;
            Ok(format!("{}: {}", category, manager.has_consent(category)))
        }
        "reset" => {
            manager.reset_consent();
            Ok("Consent reset".into())
        }
        other => bail!("Unknown consent action: {}\n\n{}", other, USAGE),
    }
}

/// File a privacy request against `BULWARK_API_BASE`.
pub async fn run_privacy(config: &SiteConfig, args: &[String]) -> anyhow::Result<String> {
    let (action, email) = match args {
        [action, email, ..] => (action.as_str(), email.clone()),
        _ => bail!("{}", PRIVACY_USAGE),
    };
    let reason = (args.len() > 2).then(|| args[2..].join(" "));
    let client = LeadClient::new(config.api_base.as_str())?;

    let accepted = match action {
        "delete-data" => {
            client
                .request_data_deletion(&DeletionRequest::new(email, reason))
                .await?
        }
        "unsubscribe" => {
            client
                .unsubscribe(&UnsubscribeRequest::new(email, reason))
                .await?
        }
        other => bail!("Unknown privacy action: {}\n\n{}", other, PRIVACY_USAGE),
    };

    Ok(if accepted {
        format!("{} request accepted", action)
    } else {
        format!("{} request was not accepted", action)
    })
}

fn show(manager: &ConsentManager) -> String {
    let gate = AnalyticsGate::init(manager);
    match manager.get_consent_preferences() {
        Some(record) => format!(
            "{}\nanalytics tracking: {}",
            serde_json::to_string_pretty(&record).unwrap_or_default(),
            if gate.is_enabled() { "on" } else { "off" }
        ),
        None => "No consent on file (banner will be shown)".into(),
    }
}

fn parse_update(pairs: &[String]) -> anyhow::Result<ConsentUpdate> {
    let mut update = ConsentUpdate::default();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected <category>=<bool>, got '{}'", pair))?;
        let enabled: bool = value
            .parse()
            .map_err(|_| anyhow!("'{}' is not true or false", value))?;
        match name.parse::<ConsentCategory>()? {
            ConsentCategory::Essential => bail!("essential cookies cannot be refused or set"),
            ConsentCategory::Analytics => update.analytics = Some(enabled),
            ConsentCategory::Marketing => update.marketing = Some(enabled),
        }
    }
    Ok(update)
}
