//! Common test utilities

use std::time::Duration;

use racetimer::coordinator::{CoordinatorConfig, RaceCoordinator};
use racetimer::RacePhase;

/// Coordinator with the given capacity and lap count and the default countdowns
pub fn coordinator(max_participants: usize, target_laps: u32) -> RaceCoordinator {
    RaceCoordinator::new(
        CoordinatorConfig::builder()
            .max_participants(max_participants)
            .target_laps(target_laps)
            .build()
            .unwrap(),
    )
}

/// Address of the `n`-th test device
#[allow(dead_code)]
pub fn device(n: u8) -> String {
    format!("{n}.{n}.{n}.{n}")
}

/// Lap of `secs` seconds
#[allow(dead_code)]
pub fn lap(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Register devices `1..=count`, returning their addresses
#[allow(dead_code)]
pub async fn register_devices(coordinator: &RaceCoordinator, count: u8) -> Vec<String> {
    let mut devices = Vec::new();
    for n in 1..=count {
        let address = device(n);
        coordinator.register(&address).await.unwrap();
        devices.push(address);
    }
    devices
}

/// Poll until the coordinator reaches `phase` or `timeout` elapses
#[allow(dead_code)]
pub async fn wait_for_phase(coordinator: &RaceCoordinator, phase: RacePhase, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if coordinator.phase().await == phase {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    coordinator.phase().await == phase
}
