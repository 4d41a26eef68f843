//! Lifecycle transitions as seen through the service.

use std::sync::Arc;

use roundkeep_core::{
    EngineConfig, Event, EventId, MemoryRoundStore, Operation, Role, Round, RoundCreateFields,
    RoundEditableFields, RoundError, RoundMode, RoundService, RoundState, RoundStore, RoundType,
    ScoreSubmission, ShortlistRule,
};

async fn setup(rounds: usize) -> (RoundService, EventId, Vec<Round>) {
    let store = Arc::new(MemoryRoundStore::new());
    let event_id = EventId::from("EVT01");
    store
        .create_event(Event::new(event_id.clone(), "E01", "Spring Cup"))
        .await
        .unwrap();
    let service = RoundService::new(store, EngineConfig::default()).unwrap();

    let mut created = Vec::new();
    for i in 0..rounds {
        let fields =
            RoundCreateFields::new(format!("Round {}", i + 1), RoundType::Title, RoundMode::Offline);
        created.push(
            service
                .create_round(&Role::Admin, &event_id, fields)
                .await
                .unwrap(),
        );
    }
    (service, event_id, created)
}

#[tokio::test]
async fn test_frozen_round_rejects_edit_and_delete() {
    let (service, event_id, rounds) = setup(2).await;
    let frozen = service
        .freeze_round(&Role::Admin, &rounds[0].id)
        .await
        .unwrap();
    assert!(frozen.is_frozen());
    assert_eq!(frozen.state(), RoundState::Frozen);

    let edits = RoundEditableFields {
        name: Some("Renamed".to_string()),
        ..RoundEditableFields::default()
    };
    let err = service
        .update_round(&Role::Admin, &event_id, 1, edits)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoundError::InvalidTransition {
            state: RoundState::Frozen,
            operation: Operation::EditRound,
            ..
        }
    ));

    let err = service
        .delete_round(&Role::Admin, &event_id, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoundError::InvalidTransition {
            operation: Operation::DeleteRound,
            ..
        }
    ));

    let stored = service.round_details(&rounds[0].id).await.unwrap();
    assert_eq!(stored.name, "Round 1");
    assert_eq!(service.rounds(&event_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_second_freeze_is_rejected() {
    let (service, _, rounds) = setup(1).await;
    service
        .freeze_round(&Role::Admin, &rounds[0].id)
        .await
        .unwrap();
    let err = service
        .freeze_round(&Role::Admin, &rounds[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, RoundError::InvalidTransition { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_evaluate_requires_freeze_and_is_terminal() {
    let (service, _, rounds) = setup(1).await;
    let id = &rounds[0].id;

    let err = service.evaluate_round(&Role::Admin, id).await.unwrap_err();
    assert!(matches!(
        err,
        RoundError::InvalidTransition {
            state: RoundState::Active,
            ..
        }
    ));

    service.freeze_round(&Role::Admin, id).await.unwrap();
    let evaluated = service.evaluate_round(&Role::Admin, id).await.unwrap();
    assert!(evaluated.is_evaluated());
    assert!(evaluated.is_frozen());

    assert!(service.evaluate_round(&Role::Admin, id).await.is_err());
    assert!(service.freeze_round(&Role::Admin, id).await.is_err());
    assert!(service
        .shortlist(&Role::Admin, id, ShortlistRule::TopK(1))
        .await
        .is_err());
}

#[tokio::test]
async fn test_freeze_captures_stats_and_blocks_scoring() {
    let (service, _, rounds) = setup(1).await;
    let id = &rounds[0].id;
    for (team, points) in [("t1", 80.0), ("t2", 60.0), ("t3", 0.0)] {
        service
            .record_score(
                &Role::Admin,
                id,
                ScoreSubmission::new(team).with_points("total", points),
            )
            .await
            .unwrap();
    }

    let frozen = service.freeze_round(&Role::Admin, id).await.unwrap();
    let stats = frozen.stats().unwrap();
    assert_eq!(stats.participated_count, 3);
    assert_eq!(stats.max_score, 80.0);
    assert_eq!(stats.min_score, 60.0);
    assert_eq!(stats.avg_score, 70.0);
    assert_eq!(service.round_stats(id).await.unwrap(), *stats);

    let err = service
        .record_score(
            &Role::Admin,
            id,
            ScoreSubmission::new("t4").with_points("total", 50.0),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoundError::InvalidTransition {
            operation: Operation::RecordScore,
            ..
        }
    ));
}

#[tokio::test]
async fn test_round_invariants_hold_after_every_transition() {
    let (service, event_id, rounds) = setup(3).await;
    service
        .freeze_round(&Role::Admin, &rounds[1].id)
        .await
        .unwrap();
    service
        .evaluate_round(&Role::Admin, &rounds[1].id)
        .await
        .unwrap();

    let event = service.event(&event_id).await.unwrap();
    event.validate().unwrap();
    for round in event.rounds() {
        round.check_invariants().unwrap();
        if round.is_evaluated() {
            assert!(round.is_frozen());
        }
    }
}
