//! End-to-end flows through `RoundService`: access, scoring, shortlisting.

use std::sync::Arc;

use roundkeep_core::metrics::METRICS;
use roundkeep_core::{
    Criterion, EngineConfig, Event, EventId, EventSnapshot, IntegrityWarning, LabelKind,
    MemoryRoundStore, Operation, Role, Round, RoundCreateFields, RoundEditableFields, RoundError,
    RoundMode, RoundService, RoundStore, RoundType, ScoreSubmission, ShortlistRule, TeamId,
};

fn rubric() -> Vec<Criterion> {
    vec![
        Criterion::new("Clarity", 50.0),
        Criterion::new("Originality", 50.0),
    ]
}

async fn setup() -> (RoundService, Arc<MemoryRoundStore>, EventId, Round) {
    roundkeep_core::telemetry::init_test_tracing();
    let store = Arc::new(MemoryRoundStore::new());
    let event_id = EventId::from("EVT01");
    store
        .create_event(Event::new(event_id.clone(), "E01", "Spring Cup"))
        .await
        .unwrap();
    let service = RoundService::new(store.clone(), EngineConfig::default()).unwrap();
    let round = service
        .create_round(
            &Role::Admin,
            &event_id,
            RoundCreateFields::new("Pitch", RoundType::Title, RoundMode::Offline)
                .with_criteria(rubric())
                .with_club("Debate Society"),
        )
        .await
        .unwrap();
    (service, store, event_id, round)
}

async fn score(service: &RoundService, round: &Round, team: &str, clarity: f64, originality: f64) {
    service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new(team)
                .with_points("Clarity", clarity)
                .with_points("Originality", originality),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_judge_cannot_delete_round() {
    let (service, _, event_id, round) = setup().await;
    let denied_before = METRICS.snapshot().mutations_denied;

    let err = service
        .delete_round(&Role::from("judge"), &event_id, round.round_number())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoundError::InsufficientRole {
            operation: Operation::DeleteRound,
            ..
        }
    ));
    assert_eq!(err.kind(), "insufficient_role");

    let rounds = service.rounds(&event_id).await.unwrap();
    assert_eq!(rounds.len(), 1);
    assert_eq!(rounds[0].id, round.id);
    assert!(METRICS.snapshot().mutations_denied > denied_before);
}

#[tokio::test]
async fn test_every_mutation_requires_admin() {
    let (service, _, event_id, round) = setup().await;
    let club = Role::from("clubs");

    let denied = |result: Result<(), RoundError>| {
        assert!(matches!(result, Err(RoundError::InsufficientRole { .. })));
    };

    denied(
        service
            .create_event(&club, Event::new("EVT02", "E02", "Autumn Cup"))
            .await
            .map(|_| ()),
    );
    denied(
        service
            .create_round(
                &club,
                &event_id,
                RoundCreateFields::new("Extra", RoundType::Rolling, RoundMode::Online),
            )
            .await
            .map(|_| ()),
    );
    denied(
        service
            .update_round(&club, &event_id, 1, RoundEditableFields::default())
            .await
            .map(|_| ()),
    );
    denied(service.update_criteria(&club, &round.id, rubric()).await.map(|_| ()));
    denied(service.freeze_round(&club, &round.id).await.map(|_| ()));
    denied(service.evaluate_round(&club, &round.id).await.map(|_| ()));
    denied(
        service
            .record_score(&club, &round.id, ScoreSubmission::new("t1"))
            .await
            .map(|_| ()),
    );
    denied(
        service
            .shortlist(&club, &round.id, ShortlistRule::TopK(1))
            .await
            .map(|_| ()),
    );
    denied(
        service
            .set_round_weight(&club, &round.id, 50.0)
            .await
            .map(|_| ()),
    );

    let stored = service.round_details(&round.id).await.unwrap();
    assert_eq!(stored, round);
    assert!(matches!(
        service.event(&EventId::from("EVT02")).await,
        Err(RoundError::EventNotFound(_))
    ));
}

#[tokio::test]
async fn test_record_score_normalizes_and_replaces() {
    let (service, store, _, round) = setup().await;

    let receipt = service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new("t1")
                .with_points("Clarity", 40.0)
                .with_points("Originality", 45.0),
        )
        .await
        .unwrap();
    assert_eq!(receipt.score.raw_total_score, 85.0);
    assert_eq!(receipt.score.score, 85.0);
    assert!(receipt.score.is_normalized);
    assert!(receipt.warnings.is_empty());

    let again = service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new("t1").with_points("Clarity", 20.0),
        )
        .await
        .unwrap();
    assert_eq!(again.score.id, receipt.score.id);
    assert_eq!(again.score.score, 20.0);

    let stored = store.scores_for_round(&round.id).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_orphan_criterion_is_kept_and_reported() {
    let (service, _, _, round) = setup().await;
    let receipt = service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new("t1")
                .with_points("Clarity", 30.0)
                .with_points("Stage Presence", 10.0),
        )
        .await
        .unwrap();

    assert_eq!(receipt.score.raw_total_score, 40.0);
    assert!(receipt.warnings.iter().any(|w| matches!(
        w,
        IntegrityWarning::OrphanCriterion { criterion, .. } if criterion == "Stage Presence"
    )));
    let criteria = receipt.score.criteria_scores.unwrap();
    assert_eq!(criteria.get("Stage Presence"), Some(&10.0));
}

#[tokio::test]
async fn test_criteria_update_validates_and_locks_on_freeze() {
    let (service, _, _, round) = setup().await;

    let err = service
        .update_criteria(&Role::Admin, &round.id, vec![Criterion::new("Clarity", 0.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, RoundError::InvalidCriteria(_)));

    let updated = service
        .update_criteria(
            &Role::Admin,
            &round.id,
            vec![
                Criterion::new("Clarity", 40.0),
                Criterion::new("Originality", 35.0),
                Criterion::new("Delivery", 25.0),
            ],
        )
        .await
        .unwrap();
    assert_eq!(updated.criteria().len(), 3);

    service.freeze_round(&Role::Admin, &round.id).await.unwrap();
    let err = service
        .update_criteria(&Role::Admin, &round.id, rubric())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoundError::InvalidTransition {
            operation: Operation::UpdateCriteria,
            ..
        }
    ));
}

#[tokio::test]
async fn test_shortlist_evaluates_round() {
    let (service, _, _, round) = setup().await;
    score(&service, &round, "t1", 40.0, 30.0).await;
    score(&service, &round, "t2", 45.0, 45.0).await;
    score(&service, &round, "t3", 20.0, 10.0).await;

    let err = service
        .shortlist(&Role::Admin, &round.id, ShortlistRule::TopK(2))
        .await
        .unwrap_err();
    assert!(matches!(err, RoundError::InvalidTransition { .. }));

    service.freeze_round(&Role::Admin, &round.id).await.unwrap();
    let outcome = service
        .shortlist(&Role::Admin, &round.id, ShortlistRule::Threshold(50.0))
        .await
        .unwrap();
    assert_eq!(outcome.shortlisted, vec![TeamId::from("t2"), TeamId::from("t1")]);
    assert_eq!(outcome.eliminated, vec![TeamId::from("t3")]);

    let stored = service.round_details(&round.id).await.unwrap();
    assert!(stored.is_evaluated());
    assert_eq!(stored.shortlisted_teams(), outcome.shortlisted.as_slice());
}

#[tokio::test]
async fn test_leaderboard_and_score_views() {
    let (service, _, _, round) = setup().await;
    score(&service, &round, "t2", 30.0, 30.0).await;
    score(&service, &round, "t1", 30.0, 30.0).await;
    score(&service, &round, "t3", 50.0, 40.0).await;

    let rows = service.leaderboard(&round.id).await.unwrap();
    let order: Vec<&str> = rows.iter().map(|r| r.team_id.as_str()).collect();
    assert_eq!(order, vec!["t3", "t1", "t2"]);
    assert_eq!(rows[0].rank, 1);

    let views = service.score_views(&round.id).await.unwrap();
    assert_eq!(views.len(), 3);
    for view in &views {
        assert_eq!(view.max_possible, 100.0);
        assert!(view.within_bounds);
        assert_eq!(view.label.label, LabelKind::Normalized);
        assert!(view.label.value);
    }

    let stats = service.round_stats(&round.id).await.unwrap();
    assert_eq!(stats.participated_count, 3);
    assert_eq!(stats.max_score, 90.0);
}

#[tokio::test]
async fn test_presence_label_wins_when_recorded() {
    let (service, _, _, round) = setup().await;
    service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new("t1")
                .with_points("Clarity", 10.0)
                .with_presence(false),
        )
        .await
        .unwrap();

    let views = service.score_views(&round.id).await.unwrap();
    assert_eq!(views[0].label.label, LabelKind::Present);
    assert!(!views[0].label.value);
}

#[tokio::test]
async fn test_delete_cascades_scores() {
    let (service, store, event_id, round) = setup().await;
    score(&service, &round, "t1", 10.0, 10.0).await;
    score(&service, &round, "t2", 20.0, 20.0).await;

    let removed = service
        .delete_round(&Role::Admin, &event_id, round.round_number())
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(service.rounds(&event_id).await.unwrap().is_empty());
    assert!(matches!(
        store.get_round_details(&round.id).await,
        Err(RoundError::RoundNotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let store = Arc::new(MemoryRoundStore::new());
    let config = EngineConfig::default().with_score_scale(0.0);
    assert!(matches!(
        RoundService::new(store, config),
        Err(RoundError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_non_finite_points_are_rejected_and_state_reloads() {
    let (service, store, _, round) = setup().await;
    score(&service, &round, "t1", 40.0, 30.0).await;

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = service
            .record_score(
                &Role::Admin,
                &round.id,
                ScoreSubmission::new("t2")
                    .with_points("Clarity", bad)
                    .with_points("Originality", 10.0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoundError::InvalidScore(_)));
        assert_eq!(err.kind(), "invalid_score");
    }

    let scores = store.scores_for_round(&round.id).await.unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].team_id.as_str(), "t1");

    let json = serde_json::to_string(&store.export().await).unwrap();
    let reloaded: Vec<EventSnapshot> = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, store.export().await);
}

#[tokio::test]
async fn test_negative_points_are_kept_and_flagged() {
    let (service, store, _, round) = setup().await;
    let receipt = service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new("t1")
                .with_points("Clarity", -5.0)
                .with_points("Originality", 2.5),
        )
        .await
        .unwrap();

    assert_eq!(receipt.score.raw_total_score, -2.5);
    assert!(receipt.score.score < 0.0);
    assert!(receipt
        .warnings
        .iter()
        .any(|w| matches!(w, IntegrityWarning::OutOfBounds { .. })));

    let views = service.score_views(&round.id).await.unwrap();
    assert!(!views[0].within_bounds);
    assert_eq!(store.scores_for_round(&round.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scored_snapshot_survives_json_reload() {
    let (service, store, event_id, round) = setup().await;
    score(&service, &round, "t1", 33.333_333_333_333_336, 0.1 + 0.2).await;
    score(&service, &round, "t2", -1.0, 49.999_999_9).await;
    service
        .record_score(
            &Role::Admin,
            &round.id,
            ScoreSubmission::new("t3")
                .with_points("Clarity", 1e-9)
                .with_points("Off Rubric", 7.25)
                .with_presence(false),
        )
        .await
        .unwrap();
    service.set_round_weight(&Role::Admin, &round.id, 75.0).await.unwrap();
    service.freeze_round(&Role::Admin, &round.id).await.unwrap();

    let exported = store.export().await;
    let json = serde_json::to_string_pretty(&exported).unwrap();
    let snapshots: Vec<EventSnapshot> = serde_json::from_str(&json).unwrap();
    let reloaded = MemoryRoundStore::from_snapshots(snapshots).await.unwrap();

    assert_eq!(reloaded.export().await, exported);
    let round_back = reloaded.get_round_details(&round.id).await.unwrap();
    assert_eq!(round_back.weight_percentage(), 75.0);
    assert!(round_back.is_frozen());
    let scores = reloaded.scores_for_round(&round.id).await.unwrap();
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[2].is_present, Some(false));
    assert_eq!(reloaded.get_event(&event_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_round_weight_bounds_and_lifecycle() {
    let (service, _, _, round) = setup().await;
    assert_eq!(round.weight_percentage(), 100.0);

    let err = service
        .set_round_weight(&Role::Admin, &round.id, 10.0)
        .await
        .unwrap_err();
    assert!(matches!(err, RoundError::InvalidWeight(_)));
    assert!(service
        .set_round_weight(&Role::Admin, &round.id, f64::NAN)
        .await
        .is_err());

    service.freeze_round(&Role::Admin, &round.id).await.unwrap();
    service.evaluate_round(&Role::Admin, &round.id).await.unwrap();
    let weighted = service
        .set_round_weight(&Role::Admin, &round.id, 200.0)
        .await
        .unwrap();
    assert_eq!(weighted.weight_percentage(), 200.0);
    assert!(weighted.is_evaluated());
}

#[tokio::test]
async fn test_event_leaderboard_weights_evaluated_rounds() {
    let (service, _, event_id, prelims) = setup().await;
    let finals = service
        .create_round(
            &Role::Admin,
            &event_id,
            RoundCreateFields::new("Finals", RoundType::Title, RoundMode::Offline)
                .with_criteria(rubric()),
        )
        .await
        .unwrap();
    let open = service
        .create_round(
            &Role::Admin,
            &event_id,
            RoundCreateFields::new("Encore", RoundType::Rolling, RoundMode::Online),
        )
        .await
        .unwrap();

    assert!(service.event_leaderboard(&event_id).await.unwrap().is_empty());

    score(&service, &prelims, "t1", 45.0, 45.0).await;
    score(&service, &prelims, "t2", 30.0, 30.0).await;
    score(&service, &finals, "t2", 50.0, 50.0).await;
    service
        .record_score(
            &Role::Admin,
            &open.id,
            ScoreSubmission::new("t3").with_points("Encore", 100.0),
        )
        .await
        .unwrap();

    for round in [&prelims, &finals] {
        service.freeze_round(&Role::Admin, &round.id).await.unwrap();
        service.evaluate_round(&Role::Admin, &round.id).await.unwrap();
    }
    service
        .set_round_weight(&Role::Admin, &finals.id, 200.0)
        .await
        .unwrap();

    // t1: 90 / 3 = 30, t2: (60 + 200) / 3, t3: only an open round
    let board = service.event_leaderboard(&event_id).await.unwrap();
    let order: Vec<&str> = board.iter().map(|r| r.team_id.as_str()).collect();
    assert_eq!(order, vec!["t2", "t1", "t3"]);
    assert_eq!(board[0].final_score, 100.0);
    assert_eq!(board[0].rounds_scored, 2);
    assert!((board[1].weighted_average - 30.0).abs() < 1e-9);
    assert!((board[1].final_score - 30.0 / (260.0 / 3.0) * 100.0).abs() < 1e-9);
    assert_eq!(board[2].final_score, 0.0);
    assert_eq!(board[2].rounds_scored, 0);
}

#[tokio::test]
async fn test_edit_can_clear_optional_fields() {
    let (service, _, event_id, round) = setup().await;
    assert_eq!(round.club.as_deref(), Some("Debate Society"));

    let updated = service
        .update_round(
            &Role::Admin,
            &event_id,
            round.round_number(),
            RoundEditableFields {
                form_link: Some("https://forms.example/pitch".to_string()),
                clear: vec![roundkeep_core::OptionalField::Club],
                ..RoundEditableFields::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.club, None);
    assert_eq!(updated.form_link.as_deref(), Some("https://forms.example/pitch"));
}
