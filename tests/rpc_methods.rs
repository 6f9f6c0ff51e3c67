use ditd::config::{AppConfig, SimulationConfig};
use ditd::context::AppContext;
use ditd::core::deck;
use ditd::core::jitter::FixedJitter;
use ditd::core::models::{BackupRecord, Card, CardStatus, VerificationMode};
use ditd::core::notifications::OffloadEvent;
use ditd::core::report::LogReport;
use ditd::core::transcode::{TranscodeRecord, TranscodeSettings, TranscodeStatus};
use ditd::core::OffloadEngine;
use ditd::rpc::{CommandResult, DaemonStatus, RpcClient, RpcServer, SizeEstimate, codes};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

async fn serve() -> (AppContext, RpcClient, CancellationToken) {
    let engine = OffloadEngine::new(deck::load(&[]), SimulationConfig::default())
        .with_jitter(FixedJitter(0.0));
    let ctx = AppContext::with_engine(AppConfig::default(), engine);
    let cancel = CancellationToken::new();

    let addr = RpcServer::new(ctx.clone(), "127.0.0.1:0".parse().unwrap())
        .spawn(cancel.clone())
        .await
        .expect("bind rpc server");

    (ctx, RpcClient::new(addr), cancel)
}

#[tokio::test]
async fn lists_demo_deck_and_status() {
    let (_ctx, client, cancel) = serve().await;

    let status: DaemonStatus = client.call_no_params("daemon.status").await.unwrap();
    assert_eq!(status.active_cards, 0);
    assert_eq!(status.verification_mode, VerificationMode::Full);
    assert!(!status.panel_locked);

    let cards: Vec<Card> = client.call_no_params("cards.list").await.unwrap();
    let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["card-a", "card-b", "card-c"]);

    let history: Vec<BackupRecord> = client
        .call("cards.history", Some(json!({ "id": "card-a", "limit": 1 })))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    cancel.cancel();
}

#[tokio::test]
async fn start_and_pause_return_events_and_card() {
    let (ctx, client, cancel) = serve().await;
    let mut events = ctx.events.subscribe();

    let started: CommandResult = client.call_card("cards.start", "card-b").await.unwrap();
    assert_eq!(started.card.as_ref().unwrap().status, CardStatus::Copying);
    assert!(matches!(
        started.events.as_slice(),
        [OffloadEvent::Started { resumed: false, .. }]
    ));
    assert!(matches!(events.recv().await.unwrap(), OffloadEvent::Started { .. }));

    ctx.engine.lock().await.step();

    let paused: CommandResult = client.call_card("cards.pause", "card-b").await.unwrap();
    let card = paused.card.unwrap();
    assert_eq!(card.status, CardStatus::Paused);
    assert_eq!(card.paused_progress, Some(card.progress));

    // Pausing again changes nothing and emits nothing.
    let again: CommandResult = client.call_card("cards.pause", "card-b").await.unwrap();
    assert!(again.events.is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn policy_errors_carry_codes() {
    let (_ctx, client, cancel) = serve().await;

    let err = client
        .call_card::<CommandResult>("cards.start", "card-z")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::CARD_NOT_FOUND));

    client.call_card::<CommandResult>("cards.start", "card-a").await.unwrap();
    let err = client
        .call::<CommandResult>(
            "cards.set_path",
            Some(json!({ "id": "card-a", "path": "/Volumes/Shuttle" })),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::CARD_BUSY));

    client.call_card::<CommandResult>("cards.toggle_lock", "card-c").await.unwrap();
    let err = client
        .call_card::<CommandResult>("cards.eject", "card-c")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::CARD_LOCKED));

    let locked: Value = client.call_no_params("panel.toggle_lock").await.unwrap();
    assert_eq!(locked["locked"], true);
    let err = client
        .call_no_params::<CommandResult>("cards.start_all")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::PANEL_LOCKED));

    cancel.cancel();
}

#[tokio::test]
async fn protocol_errors() {
    let (_ctx, client, cancel) = serve().await;

    let err = client.call_no_params::<Value>("cards.shuffle").await.unwrap_err();
    assert_eq!(err.code(), Some(codes::METHOD_NOT_FOUND));

    let err = client.call_no_params::<Card>("cards.get").await.unwrap_err();
    assert_eq!(err.code(), Some(codes::INVALID_PARAMS));

    cancel.cancel();
}

#[tokio::test]
async fn verification_mode_and_report() {
    let (ctx, client, cancel) = serve().await;

    let _: CommandResult = client
        .call("verification.set", Some(json!({ "mode": "quick" })))
        .await
        .unwrap();
    let mode: Value = client.call_no_params("verification.get").await.unwrap();
    assert_eq!(mode["mode"], "quick");
    assert_eq!(ctx.engine.lock().await.verification_mode(), VerificationMode::Quick);

    let report: LogReport = client.call_card("report.generate", "card-a").await.unwrap();
    assert!(report.missing_clips.contains(&"A001_C004".to_string()));

    cancel.cancel();
}

#[tokio::test]
async fn edits_apply_to_idle_card() {
    let (_ctx, client, cancel) = serve().await;

    let result: CommandResult = client
        .call("cards.set_slot_name", Some(json!({ "id": "card-b", "name": "Reader 2" })))
        .await
        .unwrap();
    assert_eq!(result.card.unwrap().slot_label, "Reader 2");

    let result: CommandResult = client
        .call("cards.set_path", Some(json!({ "id": "card-b", "path": "/Volumes/Shuttle/B" })))
        .await
        .unwrap();
    assert_eq!(result.card.unwrap().destination_path, "/Volumes/Shuttle/B");

    let card: Card = client.call_card("cards.get", "card-b").await.unwrap();
    assert_eq!(card.destination_path, "/Volumes/Shuttle/B");

    cancel.cancel();
}

#[tokio::test]
async fn transcode_desk_estimates_and_renders_deck_clips() {
    let (_ctx, client, cancel) = serve().await;
    let clip = json!({ "clip": "A001_C001_1024XJ.mxf" });

    let estimate: SizeEstimate = client.call("transcode.estimate", Some(clip.clone())).await.unwrap();
    assert_eq!(estimate.size_mb, 754);

    let settings: TranscodeSettings = client
        .call("transcode.settings.set", Some(json!({ "format": "H.264 High", "manual_timecode_start": "01020304" })))
        .await
        .unwrap();
    assert_eq!(settings.manual_timecode_start, "01:02:03:04");
    assert!(settings.burn_in_timecode, "untouched fields keep their values");

    let record: TranscodeRecord = client.call("transcode.render", Some(clip)).await.unwrap();
    assert_eq!(record.output_size, "251 MB");
    assert_eq!(record.format, "H.264 High");
    assert_eq!(record.status, TranscodeStatus::Completed);

    let history: Vec<TranscodeRecord> = client.call_no_params("transcode.history").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].id, record.id);

    let latest: Vec<TranscodeRecord> = client
        .call("transcode.history", Some(json!({ "limit": 1 })))
        .await
        .unwrap();
    assert_eq!(latest, vec![record]);

    cancel.cancel();
}

#[tokio::test]
async fn transcode_errors_carry_codes() {
    let (_ctx, client, cancel) = serve().await;

    let err = client
        .call::<Value>("transcode.render", Some(json!({ "clip": "Z999_C001.mxf" })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::CLIP_NOT_FOUND));

    let _: TranscodeSettings = client
        .call("transcode.settings.set", Some(json!({ "timecode_source": "manual", "manual_timecode_start": "99999999" })))
        .await
        .unwrap();
    let err = client
        .call::<Value>("transcode.render", Some(json!({ "clip": "A001_C001_1024XJ.mxf" })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::INVALID_TIMECODE));

    let err = client
        .call::<Value>("transcode.settings.set", Some(json!({ "format": "VP9" })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::INVALID_PARAMS));

    let history: Vec<TranscodeRecord> = client.call_no_params("transcode.history").await.unwrap();
    assert_eq!(history.len(), 2, "failed renders leave no record");

    cancel.cancel();
}
