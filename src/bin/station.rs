//! Interactive ground-station simulator.
//!
//! Runs the configuration core against a console provisioning host: form
//! submissions, network outcomes and timer ticks are typed at the prompt.
//!
//! ```text
//! cargo run --bin station [config-path]
//! ```
//!
//! The configuration record is kept in `~/.groundstation-esp32/config.bin`
//! unless a path is given. Type `help` for commands.

use groundstation_esp32::board::DisplayPins;
use groundstation_esp32::config::{ConfigStore, FormField, SubmitError, WifiCredentials};
use groundstation_esp32::console::{self, ConsoleCommand};
use groundstation_esp32::persistence_host::FileStorage;
use groundstation_esp32::provisioning::{ConfigPortal, NetworkEvent, ProvisioningHost};
use groundstation_esp32::station::Station;
use groundstation_esp32::storage::ConfigStorage;
use log::{error, info};
use std::convert::Infallible;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Provisioning host that prints what a real host would do.
struct ConsoleHost;

impl ProvisioningHost for ConsoleHost {
    type Error = Infallible;

    fn serve_portal(&mut self, fields: &[FormField]) {
        print_line(&format!(
            "Serving access point with {} form fields ('fields' to list)",
            fields.len()
        ));
    }

    fn join_network(&mut self, credentials: &WifiCredentials) -> Result<(), Infallible> {
        print_line(&format!(
            "Joining '{}'... report the outcome with 'join ok' or 'join fail'",
            credentials.ssid
        ));
        Ok(())
    }

    fn leave_network(&mut self) {
        print_line("Left network");
    }
}

fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn print_line(msg: &str) {
    println!("{}", msg);
    let _ = std::io::stdout().flush();
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Simulated time on top of the wall clock.
///
/// The offset is dropped whenever the mode changes so ticks only count
/// towards the current mode.
struct SimClock {
    offset: Duration,
}

impl SimClock {
    fn now(&self) -> Instant {
        Instant::now() + self.offset
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    platform_init();

    info!("=== Ground station simulator starting ===");

    let storage = match std::env::args().nth(1) {
        Some(path) => FileStorage::new(path),
        None => match FileStorage::at_default_path() {
            Ok(storage) => storage,
            Err(e) => {
                error!("No config location: {}", e);
                return;
            }
        },
    };
    info!("Config file: {:?}", storage.path());

    let mut station = Station::new(ConfigStore::new(storage), ConsoleHost);

    // No display bus on the host.
    let mut probe = |_: &DisplayPins| false;
    match station.boot(&mut probe) {
        Ok(outcome) => info!("Configuration {:?}", outcome),
        Err(e) => {
            error!("Failed to initialize configuration: {}", e);
            return;
        }
    }

    print_line("");
    print_line("Ground station ready. Type 'help' for commands.");
    print_line("");
    print_prompt();

    let cancel = CancellationToken::new();
    let stdin_cancel = cancel.clone();

    // The stdin loop owns the station.
    let stdin_task = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();
        let mut clock = SimClock {
            offset: Duration::ZERO,
        };

        while !stdin_cancel.is_cancelled() {
            let Some(Ok(line)) = lines.next() else {
                break;
            };
            let mode_before = station.mode();
            let cmd = ConsoleCommand::parse(&line);
            if cmd == ConsoleCommand::Quit {
                break;
            }
            handle_command(cmd, &mut station, &mut clock);

            if station.poll(clock.now()).is_some() {
                print_line(&format!("Mode: {}", station.mode()));
            }
            if station.mode() != mode_before {
                clock.offset = Duration::ZERO;
            }
            print_prompt();
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            print_line("\nShutting down...");
            cancel.cancel();
        }
        result = stdin_task => {
            if let Err(e) = result {
                error!("Stdin task error: {}", e);
            }
        }
    }

    info!("Shutdown complete");
}

fn handle_command<S: ConfigStorage>(
    cmd: ConsoleCommand,
    station: &mut Station<S, ConsoleHost>,
    clock: &mut SimClock,
) {
    match cmd {
        ConsoleCommand::Show => {
            station.store().print_config();
            print_line(&station.store().report().to_string());
        }

        ConsoleCommand::Fields => {
            print_line(&console::format_fields(&station.form_fields()));
        }

        ConsoleCommand::Submit(pairs) => match station.apply_submitted_fields(&pairs) {
            Ok(changed) if changed.is_empty() => print_line("Nothing changed"),
            Ok(changed) => {
                let names: Vec<&str> = changed.iter().map(|id| id.name()).collect();
                print_line(&format!(
                    "Applied {} field(s): {}",
                    changed.len(),
                    names.join(", ")
                ));
                print_line(&format!("Mode: {}", station.mode()));
            }
            Err(SubmitError::Rejected(errors)) => {
                print_line("Submission rejected, nothing changed:");
                for e in errors {
                    print_line(&format!("  {}", e));
                }
            }
            Err(e) => print_line(&format!("Error: {}", e)),
        },

        ConsoleCommand::SetFlag { flag, value } => match station.set_flag(flag, value) {
            Ok(()) => print_line(&format!("{} = {}", flag, value)),
            Err(e) => print_line(&format!("Failed to save: {}", e)),
        },

        ConsoleCommand::Join { ok } => {
            let event = if ok {
                NetworkEvent::Joined
            } else {
                NetworkEvent::JoinFailed
            };
            station.on_network_event(event);
            print_line(&format!("Mode: {}", station.mode()));
        }

        ConsoleCommand::Tick { secs } => {
            clock.offset += Duration::from_secs(secs);
            match station.mode_machine().ap_time_left(clock.now()) {
                Some(left) if station.store().has_credentials() => {
                    print_line(&format!("AP timeout in {}s", left.as_secs()))
                }
                _ => print_line(&format!("Advanced {}s", secs)),
            }
        }

        ConsoleCommand::ResetAp => match station.reset_ap_config() {
            Ok(()) => print_line(&format!("Credentials cleared. Mode: {}", station.mode())),
            Err(e) => print_line(&format!("Failed to save: {}", e)),
        },

        ConsoleCommand::ResetAll => match station.reset_all_config() {
            Ok(()) => print_line(&format!("Defaults restored. Mode: {}", station.mode())),
            Err(e) => print_line(&format!("Failed to save: {}", e)),
        },

        ConsoleCommand::Status => {
            let profile = station.store().board_profile();
            print_line(&format!(
                "Station Status:\n  Mode: {}\n  AP mode: {}\n  Connected: {}\n  Board: {}\n  Active config: {}",
                station.mode(),
                station.is_ap_mode(),
                station.is_connected(),
                profile.label,
                if station.active_config().is_some() {
                    "frozen at join"
                } else {
                    "none"
                }
            ));
        }

        ConsoleCommand::Json => match station.store().report().to_json() {
            Ok(json) => print_line(&json),
            Err(e) => print_line(&format!("Error: {}", e)),
        },

        ConsoleCommand::Help => print_line(console::HELP_TEXT),

        // Handled by the input loop.
        ConsoleCommand::Quit => {}

        ConsoleCommand::Unknown(msg) => {
            if !msg.is_empty() {
                print_line(&msg);
            }
        }
    }
}
