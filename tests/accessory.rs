mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BOT_ADDRESS, FakeBot, FakeClient, ScanEvent, bot_advertisement};
use switchbot_ble_bridge_lib::accessory::{BotPlatform, BotSwitch};
use switchbot_ble_bridge_lib::config::bridge_config::BridgeConfig;
use switchbot_ble_bridge_lib::config::device_config::{DeviceConfig, SwitchMode};
use switchbot_ble_bridge_lib::core::SwitchBotManager;
use switchbot_ble_bridge_lib::core::bluetooth::{BotCommand, BotMode, PowerState};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(8);

fn shared_manager(client: FakeClient) -> Arc<Mutex<SwitchBotManager<FakeClient>>> {
    Arc::new(Mutex::new(SwitchBotManager::new(Arc::new(client), BridgeConfig::default())))
}

fn device(mode: SwitchMode) -> DeviceConfig {
    DeviceConfig {
        name: Some("Coffee".into()),
        device_id: Some("DD:0B:72:15:C3:39".into()),
        mode,
        ..DeviceConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn switch_mode_turns_the_bot_on() {
    let bot = FakeBot::new(BOT_ADDRESS, Some(BotMode::Switch));
    let manager = shared_manager(FakeClient::new().with_discoveries(vec![Ok(vec![bot.clone()])]));
    let switch = Arc::new(BotSwitch::new(device(SwitchMode::Switch), manager.clone(), COMMAND_TIMEOUT));

    assert!(switch.set_on(true).await);

    assert_eq!(bot.sent(), vec![BotCommand::TurnOn]);
    assert!(switch.get_on());
    assert_eq!(manager.lock().await.logical_state(BOT_ADDRESS), PowerState::On);

    assert!(!switch.set_on(false).await);
    assert_eq!(bot.sent(), vec![BotCommand::TurnOn, BotCommand::TurnOff]);
}

#[tokio::test(start_paused = true)]
async fn press_mode_reports_off_after_the_delay() {
    let bot = FakeBot::new(BOT_ADDRESS, Some(BotMode::Press));
    let manager = shared_manager(FakeClient::new().with_discoveries(vec![Ok(vec![bot.clone()])]));
    let switch = Arc::new(BotSwitch::new(device(SwitchMode::Press), manager, COMMAND_TIMEOUT));
    let mut changes = switch.subscribe();

    assert!(switch.set_on(true).await);
    assert_eq!(bot.sent(), vec![BotCommand::Press]);

    let started = Instant::now();
    changes.wait_for(|on| !on).await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1100), "{elapsed:?}");
    assert!(!switch.get_on());
}

#[tokio::test(start_paused = true)]
async fn auto_off_also_applies_in_switch_mode() {
    let bot = FakeBot::new(BOT_ADDRESS, Some(BotMode::Switch));
    let manager = shared_manager(FakeClient::new().with_discoveries(vec![Ok(vec![bot.clone()])]));
    let config = DeviceConfig {
        auto_off: true,
        auto_off_delay_secs: 5,
        ..device(SwitchMode::Switch)
    };
    let switch = Arc::new(BotSwitch::new(config, manager, COMMAND_TIMEOUT));

    assert!(switch.set_on(true).await);
    sleep(Duration::from_secs(4)).await;
    assert!(switch.get_on());
    sleep(Duration::from_secs(2)).await;
    assert!(!switch.get_on());
}

#[tokio::test(start_paused = true)]
async fn slow_command_is_answered_at_the_timeout() {
    let bot = FakeBot::new(BOT_ADDRESS, Some(BotMode::Switch)).with_send_delay(Duration::from_secs(20));
    let manager = shared_manager(FakeClient::new().with_discoveries(vec![Ok(vec![bot.clone()])]));
    let switch = Arc::new(BotSwitch::new(device(SwitchMode::Switch), manager, COMMAND_TIMEOUT));

    let started = Instant::now();
    assert!(switch.set_on(true).await);
    assert!(started.elapsed() < Duration::from_secs(9));
    assert!(bot.sent().is_empty());

    // The command carries on in the background
    sleep(Duration::from_secs(15)).await;
    assert_eq!(bot.sent(), vec![BotCommand::TurnOn]);
}

#[tokio::test(start_paused = true)]
async fn press_mode_is_not_forced_on_timeout() {
    let bot = FakeBot::new(BOT_ADDRESS, Some(BotMode::Press)).with_send_delay(Duration::from_secs(20));
    let manager = shared_manager(FakeClient::new().with_discoveries(vec![Ok(vec![bot.clone()])]));
    let switch = Arc::new(BotSwitch::new(device(SwitchMode::Press), manager, COMMAND_TIMEOUT));

    assert!(!switch.set_on(true).await);
    assert!(!switch.get_on());
}

#[tokio::test(start_paused = true)]
async fn missing_device_id_only_updates_the_state() {
    let client = FakeClient::new();
    let manager = shared_manager(client);
    let config = DeviceConfig {
        device_id: None,
        ..device(SwitchMode::Switch)
    };
    let switch = Arc::new(BotSwitch::new(config, manager.clone(), COMMAND_TIMEOUT));

    assert!(switch.set_on(true).await);
    assert!(switch.get_on());
    assert!(manager.lock().await.executor().cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_check_mirrors_the_advertised_state() {
    let client = FakeClient::new().with_events(vec![ScanEvent::advert(
        20,
        bot_advertisement(BOT_ADDRESS, BotMode::Switch, PowerState::Off),
    )]);
    let config = DeviceConfig {
        enable_status_check: true,
        status_check_interval_secs: 30,
        ..device(SwitchMode::Switch)
    };
    let switch = Arc::new(BotSwitch::new(config, shared_manager(client), COMMAND_TIMEOUT));

    switch.start_status_check();
    sleep(Duration::from_secs(29)).await;
    assert!(!switch.get_on());

    sleep(Duration::from_secs(2)).await;
    assert!(switch.get_on());
    switch.stop_status_check();
}

#[tokio::test(start_paused = true)]
async fn platform_skips_incomplete_entries() {
    let devices = vec![
        device(SwitchMode::Switch),
        DeviceConfig {
            name: Some("Nameless".into()),
            ..DeviceConfig::default()
        },
        DeviceConfig {
            device_id: Some("e1:22:33:44:55:66".into()),
            ..DeviceConfig::default()
        },
    ];

    let platform = BotPlatform::from_config(&devices, shared_manager(FakeClient::new()), &BridgeConfig::default());

    assert_eq!(platform.switches().len(), 1);
    assert_eq!(platform.switches()[0].name(), "Coffee");
    assert_eq!(platform.switches()[0].device_id(), Some("DD:0B:72:15:C3:39"));
    platform.start();
    platform.shutdown();
}
