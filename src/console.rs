//! Line console for driving a station from a serial or terminal session.
//!
//! The console stands in for the provisioning host's web form: fields are
//! submitted as `key=value` pairs and network outcomes are reported by hand.
//!
//! # Example Session
//!
//! ```text
//! > submit wifi_ssid=HomeNet wifi_password=password123 lat=40.41 lng=-3.70 mqtt_user=me mqtt_pass=secret tx=1 remote_tune=1 telemetry3rd=1 auto_update=1
//! Joining 'HomeNet'... report the outcome with 'join ok' or 'join fail'
//! Applied 6 field(s): wifi_ssid, wifi_password, lat, lng, mqtt_user, mqtt_pass
//! Mode: connecting
//!
//! > join ok
//! Mode: connected
//!
//! > tx off
//! Enable TX (HAM licence / no preamp) = false
//! ```

use crate::config::{FieldGroup, FieldKind, FormField, OperationalFlag};
use std::collections::HashMap;

/// Parsed console command.
#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    /// Show the decoded configuration.
    Show,
    /// List form fields with their constraints.
    Fields,
    /// Submit form fields.
    Submit(HashMap<String, String>),
    /// Set an operational flag.
    SetFlag { flag: OperationalFlag, value: bool },
    /// Report the outcome of a network join.
    Join { ok: bool },
    /// Advance the clock by some seconds.
    Tick { secs: u64 },
    /// Clear network credentials.
    ResetAp,
    /// Restore all defaults.
    ResetAll,
    /// Show mode and board.
    Status,
    /// Print the configuration report as JSON.
    Json,
    /// Show help.
    Help,
    /// Leave the console.
    Quit,
    /// Unknown or invalid command.
    Unknown(String),
}

/// Default `tick` step in seconds.
pub const DEFAULT_TICK_SECS: u64 = 60;

impl ConsoleCommand {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ConsoleCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        if let Some(flag) = parse_flag_name(cmd) {
            return match parse_switch(args) {
                Some(value) => ConsoleCommand::SetFlag { flag, value },
                None => ConsoleCommand::Unknown(format!("Usage: {} on|off", cmd)),
            };
        }

        match cmd.to_lowercase().as_str() {
            "show" | "config" | "c" => ConsoleCommand::Show,
            "fields" | "f" => ConsoleCommand::Fields,
            "submit" | "set" => match parse_pairs(args) {
                Some(pairs) if !pairs.is_empty() => ConsoleCommand::Submit(pairs),
                _ => ConsoleCommand::Unknown("Usage: submit <field>=<value> ...".to_string()),
            },
            "join" => match args {
                "ok" => ConsoleCommand::Join { ok: true },
                "fail" => ConsoleCommand::Join { ok: false },
                _ => ConsoleCommand::Unknown("Usage: join ok|fail".to_string()),
            },
            "tick" | "t" => {
                if args.is_empty() {
                    return ConsoleCommand::Tick {
                        secs: DEFAULT_TICK_SECS,
                    };
                }
                match args.parse() {
                    Ok(secs) => ConsoleCommand::Tick { secs },
                    Err(_) => ConsoleCommand::Unknown("Usage: tick [seconds]".to_string()),
                }
            }
            "reset-ap" => ConsoleCommand::ResetAp,
            "reset-all" => ConsoleCommand::ResetAll,
            "status" | "stat" | "s" => ConsoleCommand::Status,
            "json" => ConsoleCommand::Json,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

fn parse_flag_name(cmd: &str) -> Option<OperationalFlag> {
    match cmd.to_lowercase().as_str() {
        "tx" => Some(OperationalFlag::AllowTx),
        "tune" => Some(OperationalFlag::RemoteTune),
        "telemetry" => Some(OperationalFlag::Telemetry3rd),
        "test" => Some(OperationalFlag::TestMode),
        "update" => Some(OperationalFlag::AutoUpdate),
        _ => None,
    }
}

fn parse_switch(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse `key=value` pairs separated by whitespace. Values may be empty.
fn parse_pairs(args: &str) -> Option<HashMap<String, String>> {
    args.split_whitespace()
        .map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Format form fields grouped as the portal renders them.
pub fn format_fields(fields: &[FormField]) -> String {
    let mut output = String::new();
    let mut group: Option<FieldGroup> = None;
    for field in fields {
        if group != Some(field.group) {
            output.push_str(&format!("{}:\n", field.group.title()));
            group = Some(field.group);
        }
        let value = match field.kind {
            FieldKind::Password => "<hidden>".to_string(),
            _ if field.value.is_empty() => "<empty>".to_string(),
            _ => field.value.clone(),
        };
        let mut constraints = vec![format!("max {}", field.max_len)];
        if field.required {
            constraints.push("required".to_string());
        }
        if let (Some(min), Some(max)) = (field.min, field.max) {
            constraints.push(format!("{}..{}", min, max));
        }
        output.push_str(&format!(
            "  {:<14} {:<24} [{}]\n",
            field.name,
            value,
            constraints.join(", ")
        ));
    }
    output
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  show                     Show decoded configuration
  fields                   List form fields and constraints
  submit <k>=<v> ...       Submit form fields like the web form does:
                           an empty password keeps the stored one, and a
                           flag key left out (tx, remote_tune, telemetry3rd,
                           test, auto_update) clears that flag
  tx|tune|telemetry|test|update on|off
                           Set an operational flag
  join ok|fail             Report network join outcome
  tick [secs]              Advance the clock (default 60s)
  reset-ap                 Clear network credentials
  reset-all                Restore all defaults
  status                   Show mode and board
  json                     Print configuration report as JSON
  help                     Show this help
  quit                     Exit

Shortcuts: c=show, f=fields, t=tick, s=status, h=help, q=quit

Examples:
  submit wifi_ssid=HomeNet wifi_password=password123 lat=40.4168 lng=-3.7038 mqtt_user=me mqtt_pass=secret tx=1 remote_tune=1 telemetry3rd=1 auto_update=1
  tx off
"#;
