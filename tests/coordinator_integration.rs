//! Integration tests for the race coordinator
//!
//! These tests drive complete race lifecycles through the public API:
//! - Registration and capacity
//! - Start and finish countdowns, including cancellation
//! - Finish ordering and results
//! - Concurrent lap submission

mod common;

use std::time::Duration;

use common::{coordinator, device, lap, register_devices, wait_for_phase};
use racetimer::coordinator::CoordinatorError;
use racetimer::RacePhase;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_registration_is_idempotent() {
    let coordinator = coordinator(2, 10);

    let first = coordinator.register("10.0.0.1").await.unwrap();
    let again = coordinator.register("10.0.0.1").await.unwrap();

    assert_eq!(first, again);
    assert_eq!(coordinator.participants().await.len(), 1);
}

#[tokio::test]
async fn test_ids_follow_registration_order() {
    let coordinator = coordinator(5, 10);

    for n in 1..=5u8 {
        assert_eq!(coordinator.register(&device(n)).await, Ok(u32::from(n)));
    }
    // Duplicates never consume an id
    assert_eq!(coordinator.register(&device(3)).await, Ok(3));

    let ids: Vec<u32> = coordinator.participants().await.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_capacity_enforced() {
    let max = 3;
    let coordinator = coordinator(max, 10);

    for n in 1..=max as u8 {
        assert!(coordinator.register(&device(n)).await.is_ok());
    }

    let rejected = coordinator.register(&device(9)).await.unwrap_err();
    assert_eq!(rejected, CoordinatorError::CapacityReached { current: 3, max: 3 });

    // A known device still gets its id back
    assert_eq!(coordinator.register(&device(1)).await, Ok(1));
}

#[tokio::test]
async fn test_failed_registration_does_not_consume_id() {
    let coordinator = coordinator(1, 10);

    coordinator.register("10.0.0.1").await.unwrap();
    assert!(coordinator.register("10.0.0.2").await.is_err());
    assert!(coordinator.register("garbage").await.is_err());

    coordinator.set_max_participants(2).await.unwrap();
    assert_eq!(coordinator.register("10.0.0.2").await, Ok(2));
}

// ============================================================================
// Countdowns
// ============================================================================

#[tokio::test]
async fn test_countdown_monotonic_until_race_starts() {
    let coordinator = coordinator(2, 10);
    coordinator.start_race(Some(120), None).await.unwrap();

    let mut last = coordinator.millis_remaining().await;
    assert!(last >= 0);

    loop {
        let phase = coordinator.phase().await;
        let remaining = coordinator.millis_remaining().await;
        if phase == RacePhase::InProgress {
            assert_eq!(coordinator.millis_remaining().await, -1);
            break;
        }
        if remaining >= 0 {
            assert!(remaining <= last, "remaining went up: {last} -> {remaining}");
            last = remaining;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_cancel_reverts_to_registration() {
    let coordinator = coordinator(2, 10);
    coordinator.register("10.0.0.1").await.unwrap();

    coordinator.start_race(Some(50), None).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::StartCountdown);

    coordinator.cancel_countdown().await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::Registration);
    assert_eq!(coordinator.millis_remaining().await, -1);

    // The cancelled countdown never starts a race
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(coordinator.phase().await, RacePhase::Registration);
    assert!(coordinator.all_races().await.is_empty());

    // Registration is open again
    assert_eq!(coordinator.register("10.0.0.2").await, Ok(2));
}

#[tokio::test]
async fn test_cancel_after_expiry_is_rejected_not_fatal() {
    let coordinator = coordinator(2, 10);
    coordinator.start_race(Some(10), None).await.unwrap();

    assert!(wait_for_phase(&coordinator, RacePhase::InProgress, Duration::from_secs(2)).await);
    assert_eq!(
        coordinator.cancel_countdown().await,
        Err(CoordinatorError::NoActiveCountdown)
    );
    assert_eq!(coordinator.phase().await, RacePhase::InProgress);
}

#[tokio::test]
async fn test_restart_after_cancel_uses_new_countdown() {
    let coordinator = coordinator(2, 10);

    coordinator.start_race(Some(40), None).await.unwrap();
    coordinator.cancel_countdown().await.unwrap();
    coordinator.start_race(Some(5_000), None).await.unwrap();

    // The first countdown's deadline passes without effect
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.phase().await, RacePhase::StartCountdown);
    assert!(coordinator.all_races().await.is_empty());

    coordinator.cancel_countdown().await.unwrap();
}

// ============================================================================
// Finishing
// ============================================================================

#[tokio::test]
async fn test_single_participant_skips_finish_countdown() {
    let laps = 3;
    let coordinator = coordinator(2, laps);
    coordinator.register("1.1.1.1").await.unwrap();
    coordinator.start_race(Some(0), None).await.unwrap();

    for secs in [61, 62] {
        coordinator.add_lap_result("1.1.1.1", lap(secs)).await.unwrap();
        assert_eq!(coordinator.phase().await, RacePhase::InProgress);
    }

    coordinator.add_lap_result("1.1.1.1", lap(63)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::Finished);
    assert_eq!(coordinator.millis_remaining().await, -1);
}

#[tokio::test]
async fn test_three_participants_finish_order() {
    let laps = 4;
    let coordinator = coordinator(3, laps);
    register_devices(&coordinator, 3).await;
    coordinator.start_race(Some(0), None).await.unwrap();

    for round in 0..laps - 1 {
        for n in [1, 2, 3] {
            coordinator
                .add_lap_result(&device(n), lap(60 + u64::from(round)))
                .await
                .unwrap();
        }
    }

    coordinator.add_lap_result(&device(3), lap(58)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::FinishCountdown);

    coordinator.add_lap_result(&device(1), lap(59)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::FinishCountdown);

    coordinator.add_lap_result(&device(2), lap(60)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::Finished);
    assert_eq!(coordinator.finish_order_for_last_race().await, vec![3, 1, 2]);
}

#[tokio::test]
async fn test_finish_countdown_expiry_ends_race() {
    let laps = 2;
    let coordinator = coordinator(3, laps);
    coordinator
        .update_settings(racetimer::coordinator::SettingsUpdate {
            finish_countdown_ms: Some(30),
            ..Default::default()
        })
        .await
        .unwrap();
    register_devices(&coordinator, 3).await;
    coordinator.start_race(Some(0), None).await.unwrap();

    coordinator.add_lap_result(&device(2), lap(60)).await.unwrap();
    coordinator.add_lap_result(&device(2), lap(60)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::FinishCountdown);

    assert!(wait_for_phase(&coordinator, RacePhase::Finished, Duration::from_secs(2)).await);
    assert_eq!(coordinator.finish_order_for_last_race().await, vec![2]);

    // Only the finisher has a result
    assert_eq!(coordinator.last_race_result(2).await.unwrap().place, 1);
    assert_eq!(
        coordinator.last_race_result(1).await,
        Err(CoordinatorError::ResultNotFound(1))
    );
}

#[tokio::test]
async fn test_laps_after_cancelled_finish_countdown_keep_racing() {
    let coordinator = coordinator(3, 1);
    register_devices(&coordinator, 3).await;
    coordinator.start_race(Some(0), None).await.unwrap();

    coordinator.add_lap_result(&device(1), lap(60)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::FinishCountdown);
    coordinator.cancel_countdown().await.unwrap();

    for n in [1, 2] {
        coordinator.add_lap_result(&device(n), lap(61)).await.unwrap();
        assert_eq!(coordinator.phase().await, RacePhase::InProgress);
        assert_eq!(coordinator.millis_remaining().await, -1);
    }

    coordinator.add_lap_result(&device(3), lap(62)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::Finished);
    assert_eq!(coordinator.finish_order_for_last_race().await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_end_to_end_two_participants() {
    let coordinator = coordinator(10, 10);
    coordinator.set_max_participants(2).await.unwrap();

    assert_eq!(coordinator.register("1.1.1.1").await, Ok(1));
    assert_eq!(coordinator.register("2.2.2.2").await, Ok(2));
    assert_eq!(
        coordinator.start_race(Some(0), None).await,
        Ok(RacePhase::InProgress)
    );

    for i in 0..10u64 {
        let duration = lap(61 + i);

        coordinator.add_lap_result("1.1.1.1", duration).await.unwrap();
        if i == 9 {
            assert_eq!(coordinator.phase().await, RacePhase::FinishCountdown);
        } else {
            assert_eq!(coordinator.phase().await, RacePhase::InProgress);
        }

        coordinator.add_lap_result("2.2.2.2", duration).await.unwrap();
    }

    assert_eq!(coordinator.phase().await, RacePhase::Finished);
    assert_eq!(coordinator.finish_order_for_last_race().await, vec![1, 2]);

    let winner = coordinator.last_race_result(1).await.unwrap();
    assert_eq!(winner.place, 1);
    assert_eq!(winner.overall_time, "00:10:55");
    assert_eq!(winner.fastest_lap, "00:01:01");
    assert_eq!(winner.fastest_lap_number, 1);

    let results = coordinator.current_race_results().await;
    assert_eq!(results[&1].len(), 10);
    assert_eq!(results[&2][9].to_string(), "10: 00:01:10");
}

#[tokio::test]
async fn test_lap_for_unregistered_device_changes_nothing() {
    let coordinator = coordinator(2, 10);
    register_devices(&coordinator, 2).await;
    coordinator.start_race(Some(0), None).await.unwrap();
    coordinator.add_lap_result(&device(1), lap(60)).await.unwrap();

    let before = coordinator.current_race_results().await;
    let err = coordinator.add_lap_result("9.9.9.9", lap(60)).await.unwrap_err();

    assert_eq!(err, CoordinatorError::ParticipantNotFound("9.9.9.9".to_string()));
    assert_eq!(coordinator.current_race_results().await, before);
    assert_eq!(coordinator.phase().await, RacePhase::InProgress);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_final_laps_start_one_countdown() {
    let laps = 2;
    let coordinator = coordinator(4, laps);
    register_devices(&coordinator, 4).await;
    coordinator.start_race(Some(0), None).await.unwrap();

    for n in 1..=4u8 {
        coordinator.add_lap_result(&device(n), lap(60)).await.unwrap();
    }

    let submissions: Vec<_> = (1..=3u8)
        .map(|n| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.add_lap_result(&device(n), lap(61)).await })
        })
        .collect();
    for handle in futures::future::join_all(submissions).await {
        handle.unwrap().unwrap();
    }

    assert_eq!(coordinator.phase().await, RacePhase::FinishCountdown);
    let order = coordinator.finish_order_for_last_race().await;
    assert_eq!(order.len(), 3);
    assert!(!order.contains(&4));

    coordinator.add_lap_result(&device(4), lap(62)).await.unwrap();
    assert_eq!(coordinator.phase().await, RacePhase::Finished);
    assert_eq!(coordinator.finish_order_for_last_race().await.len(), 4);
}

#[tokio::test]
async fn test_many_successive_races() {
    let coordinator = coordinator(2, 1);
    register_devices(&coordinator, 2).await;

    for _ in 0..1000 {
        coordinator.start_race(Some(0), None).await.unwrap();
        coordinator.add_lap_result(&device(2), lap(30)).await.unwrap();
        coordinator.add_lap_result(&device(1), lap(31)).await.unwrap();
        assert_eq!(coordinator.phase().await, RacePhase::Finished);
    }

    let races = coordinator.all_races().await;
    assert_eq!(races.len(), 1000);
    assert!(races.iter().all(|race| race.finish_order == vec![2, 1]));
    assert_eq!(races[999].index, 999);

    // Lifetime lap logs keep growing across races
    assert_eq!(coordinator.participants().await[0].lap_count, 1000);
}
