//! Command-line tool for SwitchBot Bots
//!
//! Scans, reads status and sends commands to SwitchBot Bots over BLE, or
//! runs the configured switches until interrupted.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info};
use serde::Serialize;

use switchbot_ble_bridge_lib::accessory::BotPlatform;
use switchbot_ble_bridge_lib::commands::{
    ServerStatus, find_device, get_status, normalize_mac, press_bot, scan_devices, server_status, turn_off_bot,
    turn_on_bot,
};
use switchbot_ble_bridge_lib::config::AppConfig;
use switchbot_ble_bridge_lib::core::bluetooth::{BotMode, BotStatus, DeviceAdvertisement, DeviceType};
use switchbot_ble_bridge_lib::core::{Disambiguator, MatchContext};
use switchbot_ble_bridge_lib::logging;
use switchbot_ble_bridge_lib::state::AppState;

/// Pause between devices in bulk operations
const BULK_OPERATION_PAUSE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "switchbot-ble-bridge", version)]
#[command(about = "Control SwitchBot Bot devices over Bluetooth Low Energy")]
struct Cli {
    /// Configuration file, defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Unattended mode: never prompt, print JSON
    #[arg(long, global = true)]
    api_mode: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby SwitchBot devices
    Scan {
        /// Scan duration in milliseconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Show a Bot's state, mode and battery
    Status { device: Option<String> },
    /// Press a Bot
    Press { device: Option<String> },
    /// Turn a Switch-mode Bot on
    On { device: Option<String> },
    /// Turn a Switch-mode Bot off
    Off { device: Option<String> },
    /// Turn on every nearby Switch-mode Bot
    AutoOn,
    /// Turn off every nearby Switch-mode Bot
    AutoOff,
    /// Show platform and privilege information
    Server,
    /// Write a default configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the normalized form of a MAC address
    Normalize { mac: String },
    /// Find a device by full or partial MAC address
    Find { mac: String },
    /// Serve the configured switches until interrupted
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info });

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Error executing command: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let started_at = Instant::now();
    let cli_ctx = CliContext { api_mode: cli.api_mode };

    // Commands that never touch the radio
    match &cli.command {
        Commands::Normalize { mac } => {
            return match normalize_mac(mac) {
                Some(normalized) => {
                    println!("Original MAC: {}", mac);
                    println!("Normalized MAC: {}", normalized);
                    Ok(ExitCode::SUCCESS)
                }
                None => bail!("Please provide the MAC address to normalize"),
            };
        }
        Commands::Server => {
            cli_ctx.print_server_status(&server_status(started_at).await)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::InitConfig { force } => {
            match AppConfig::init_config(cli.config.as_deref(), *force).await? {
                Some(path) => println!("Config written to {}", path.display()),
                None => println!("Config already exists, use --force to replace it"),
            }
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = AppConfig::load_config(cli.config.as_deref()).await?;
    if !cli.verbose {
        logging::set_level(config.bridge.level_filter());
    }

    let app_state = AppState::new(config.bridge.clone()).await?;
    let cancel_token = app_state.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling pending Bluetooth operations");
            cancel_token.cancel();
        }
    });

    match cli.command {
        Commands::Normalize { .. } | Commands::Server | Commands::InitConfig { .. } => Ok(ExitCode::SUCCESS),
        Commands::Scan { duration } => {
            let devices = scan_devices(&app_state, duration).await;
            cli_ctx.print_devices(&devices)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Find { mac } => {
            let Some(address) = find_device(&app_state, &mac, &cli_ctx.match_context()).await else {
                println!("No matching device found");
                return Ok(ExitCode::SUCCESS);
            };
            if !cli_ctx.api_mode {
                println!("Device found! Normalized MAC address: {}", address);
            }
            let status = get_status(&app_state, &address).await;
            cli_ctx.print_status(&status)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { device } => {
            let Some(target) = cli_ctx.resolve_target(&app_state, device).await? else {
                println!("Operation cancelled");
                return Ok(ExitCode::SUCCESS);
            };
            let status = get_status(&app_state, &target).await;
            cli_ctx.print_status(&status)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Press { device } => {
            let Some(target) = cli_ctx.resolve_target(&app_state, device).await? else {
                println!("Operation cancelled");
                return Ok(ExitCode::SUCCESS);
            };
            info!("Pressing device {}...", target);
            let outcome = press_bot(&app_state, &target).await;
            cli_ctx.print_json_or(&outcome, "✓ Press command sent successfully")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::On { device } => cli_ctx.switch(&app_state, device, true).await,
        Commands::Off { device } => cli_ctx.switch(&app_state, device, false).await,
        Commands::AutoOn => {
            cli_ctx.operate_all(&app_state, true).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::AutoOff => {
            cli_ctx.operate_all(&app_state, false).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run => {
            let platform = BotPlatform::from_config(&config.devices, app_state.get_switchbot_manager_arc(), &config.bridge);
            platform.start();
            info!("Serving {} switch(es), press Ctrl-C to stop", platform.switches().len());
            app_state.cancel_token().cancelled().await;
            platform.shutdown();
            Ok(ExitCode::SUCCESS)
        }
    }
}

struct CliContext {
    api_mode: bool,
}

impl CliContext {
    fn match_context(&self) -> MatchContext<'static> {
        if self.api_mode {
            MatchContext::Unattended
        } else {
            MatchContext::Interactive(Some(&PromptPicker))
        }
    }

    /// Resolves the operand of a device command. Without one, the operator
    /// picks from a fresh scan.
    async fn resolve_target(&self, app_state: &AppState, device: Option<String>) -> Result<Option<String>> {
        match device {
            Some(device) => {
                if let Some(normalized) = normalize_mac(&device).filter(|n| *n != device) {
                    info!("Normalized MAC address: {}", normalized);
                }
                Ok(find_device(app_state, &device, &self.match_context()).await)
            }
            None if self.api_mode => bail!("A device id is required in API mode"),
            None => {
                let devices = scan_devices(app_state, None).await;
                if devices.is_empty() {
                    println!("No SwitchBot devices found");
                    return Ok(None);
                }
                self.print_devices(&devices)?;
                let answer = prompt(&format!("Select device (1-{}, empty to cancel): ", devices.len()))?;
                Ok(answer
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| devices.get(i))
                    .map(|d| d.address.clone()))
            }
        }
    }

    /// `on`/`off`: refuses Bots that are not in Switch mode.
    async fn switch(&self, app_state: &AppState, device: Option<String>, on: bool) -> Result<ExitCode> {
        let verb = if on { "on" } else { "off" };
        let Some(target) = self.resolve_target(app_state, device).await? else {
            println!("Operation cancelled");
            return Ok(ExitCode::SUCCESS);
        };

        info!("Checking device {} mode...", target);
        let status = get_status(app_state, &target).await;
        if status.mode != Some(BotMode::Switch) {
            println!(
                "⚠ Cannot turn {} device: Device is in {} mode, not Switch mode",
                verb,
                mode_label(status.mode)
            );
            println!("For devices in Press mode, use 'press' command instead of '{}'", verb);
            return Ok(ExitCode::from(1));
        }

        info!("Turning {} device {}...", verb, target);
        let outcome = if on {
            turn_on_bot(app_state, &target).await
        } else {
            turn_off_bot(app_state, &target).await
        };
        self.print_json_or(&outcome, &format!("✓ Turn {} command sent successfully", verb))?;
        Ok(ExitCode::SUCCESS)
    }

    /// `auto-on`/`auto-off` over every scanned Switch-mode Bot.
    async fn operate_all(&self, app_state: &AppState, on: bool) -> Result<()> {
        let action = if on { "turn on" } else { "turn off" };
        let devices: Vec<DeviceAdvertisement> = scan_devices(app_state, None)
            .await
            .into_iter()
            .filter(|d| d.device_type == DeviceType::Bot)
            .collect();
        if devices.is_empty() {
            println!("No SwitchBot devices found");
            return Ok(());
        }

        println!("Found {} devices, preparing to {}:", devices.len(), action);
        for device in &devices {
            println!("  {}", device.address);
        }
        if !self.api_mode {
            let confirmation = prompt(&format!("Are you sure you want to {} all these devices? (y/n): ", action))?;
            if !confirmation.eq_ignore_ascii_case("y") {
                println!("Operation cancelled");
                return Ok(());
            }
        }

        let mut summary = BulkSummary::default();
        for (i, device) in devices.iter().enumerate() {
            println!("\n[{}/{}] Checking device: {}", i + 1, devices.len(), device.address);
            let status = get_status(app_state, &device.address).await;
            if status.mode != Some(BotMode::Switch) {
                let reason = format!("Device is in {} mode, not Switch mode", mode_label(status.mode));
                println!("⚠ Skipping device {}: {}", device.address, reason);
                summary.skipped.push((device.address.clone(), reason));
                continue;
            }

            let outcome = if on {
                turn_on_bot(app_state, &device.address).await
            } else {
                turn_off_bot(app_state, &device.address).await
            };
            if outcome.command_sent {
                println!("✓ {} command sent successfully", action);
                summary.success.push(device.address.clone());
            } else {
                let error = outcome.error.unwrap_or_else(|| "Unknown error".to_string());
                println!("✗ {} command send failed: {}", action, error);
                summary.failed.push((device.address.clone(), error));
            }

            tokio::time::sleep(BULK_OPERATION_PAUSE).await;
        }

        summary.print();
        Ok(())
    }

    fn print_devices(&self, devices: &[DeviceAdvertisement]) -> Result<()> {
        if self.api_mode {
            println!("{}", serde_json::to_string_pretty(devices)?);
            return Ok(());
        }
        if devices.is_empty() {
            println!("No SwitchBot devices found");
            return Ok(());
        }
        println!("Found {} SwitchBot devices:", devices.len());
        for (index, device) in devices.iter().enumerate() {
            println!("\nDevice {}:", index + 1);
            println!("Device ID: {}", device.address);
            println!("Type: {}", device.device_type);
            println!("Mode: {}", mode_label(device.mode()));
            println!("State: {}", device.state());
            println!("Battery: {}", battery_label(device.battery()));
        }
        Ok(())
    }

    fn print_status(&self, status: &BotStatus) -> Result<()> {
        if self.api_mode {
            println!("{}", serde_json::to_string_pretty(status)?);
            return Ok(());
        }
        if let Some(error) = &status.error {
            println!("Failed to get status of {}: {}", status.device_id, error);
            return Ok(());
        }
        println!("Device ID: {}", status.device_id);
        println!("Type: {}", status.device_type);
        println!("Mode: {}", mode_label(status.mode));
        println!(
            "State: {}",
            status.state.map(|s| s.to_string()).unwrap_or_else(|| "Unknown".to_string())
        );
        println!("Battery: {}", battery_label(status.battery));
        Ok(())
    }

    fn print_server_status(&self, status: &ServerStatus) -> Result<()> {
        if self.api_mode {
            println!("{}", serde_json::to_string_pretty(status)?);
            return Ok(());
        }
        println!("Platform: {}", status.platform);
        println!("Version: {}", status.runtime_version);
        println!("Uptime: {} ({})", status.uptime, status.uptime_human);
        println!("Elevated privileges: {}", if status.has_elevated_privileges { "Yes" } else { "No" });
        println!("{}", status.privilege_message);
        Ok(())
    }

    fn print_json_or<T: Serialize>(&self, value: &T, text: &str) -> Result<()> {
        if self.api_mode {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text);
        }
        Ok(())
    }
}

#[derive(Default)]
struct BulkSummary {
    success: Vec<String>,
    failed: Vec<(String, String)>,
    skipped: Vec<(String, String)>,
}

impl BulkSummary {
    fn print(&self) {
        println!("\nOperation summary:");
        println!("✓ Success: {} devices", self.success.len());
        println!("✗ Failed: {} devices", self.failed.len());
        println!("⚠ Skipped: {} devices (not in Switch mode)", self.skipped.len());

        if !self.failed.is_empty() {
            println!("\nFailed devices:");
            for (index, (address, error)) in self.failed.iter().enumerate() {
                println!("  {}. {} - Error: {}", index + 1, address, error);
            }
        }
        if !self.skipped.is_empty() {
            println!("\nSkipped devices (not in Switch mode):");
            for (index, (address, reason)) in self.skipped.iter().enumerate() {
                println!("  {}. {} - Reason: {}", index + 1, address, reason);
            }
        }
    }
}

/// Asks on the terminal when a partial address matches several devices.
struct PromptPicker;

impl Disambiguator for PromptPicker {
    fn choose(&self, candidates: &[&DeviceAdvertisement]) -> Option<usize> {
        println!("Found {} possible matches:", candidates.len());
        for (index, device) in candidates.iter().enumerate() {
            println!("  {}. {} ({})", index + 1, device.address, device.device_type);
        }
        let question = format!("Select device (1-{}, empty to use the address as given): ", candidates.len());
        let answer = tokio::task::block_in_place(|| prompt(&question)).ok()?;
        answer.parse::<usize>().ok()?.checked_sub(1)
    }
}

fn prompt(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

fn mode_label(mode: Option<BotMode>) -> String {
    mode.map(|m| m.to_string()).unwrap_or_else(|| "unknown".to_string())
}

fn battery_label(battery: Option<u8>) -> String {
    battery.map(|b| format!("{}%", b)).unwrap_or_else(|| "Unknown".to_string())
}
