use crackbox::champdup::{Action, ChampdUp};
use crackbox::protocol::{ClientFrame, MessageType, ServerFrame};
use crackbox::registry::SessionRegistry;
use crackbox::session::{dispatch, drive, Sender, SharedSession};
use crackbox::types::{ConnectionStatus, GameStatus};
use serde_json::json;
use tokio::sync::mpsc;

type Rx = mpsc::UnboundedReceiver<ServerFrame>;

/// Create a session, join players and bind fake connections for everyone.
async fn setup(
    config: serde_json::Value,
    names: &[&str],
) -> (SharedSession<ChampdUp>, Rx, Vec<Rx>) {
    let registry = SessionRegistry::new();
    let created = registry
        .create("champdup", config.as_object())
        .await
        .expect("session created");
    let session = registry.get(&created.id).await.unwrap();

    let mut guard = session.lock().await;
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    guard.engine.connect_host(host_tx);
    let mut player_rxs = Vec::new();
    for name in names {
        guard.engine.join(name).expect("join");
        let (tx, rx) = mpsc::unbounded_channel();
        guard.engine.connect_player(name, tx);
        player_rxs.push(rx);
    }
    drop(guard);
    (session, host_rx, player_rxs)
}

fn frame(kind: MessageType, value: serde_json::Value) -> ClientFrame {
    ClientFrame { kind, value }
}

fn drain(rx: &mut Rx) -> Vec<ServerFrame> {
    let mut frames = Vec::new();
    while let Ok(f) = rx.try_recv() {
        frames.push(f);
    }
    frames
}

fn kinds(frames: &[ServerFrame]) -> Vec<MessageType> {
    frames.iter().map(|f| f.kind).collect()
}

async fn submit_all(session: &SharedSession<ChampdUp>, names: &[&str], prefix: &str) {
    for name in names {
        dispatch(
            session,
            Sender::Player(name.to_string()),
            frame(
                MessageType::Image,
                json!({ "title": format!("{prefix} by {name}"), "data": "data:image/png;base64,AAAA" }),
            ),
        )
        .await;
    }
}

/// Run every matchup of the current vote event: everyone tries to vote
/// (artists bounce off), then the vote deadline and grace step are driven
/// the way the timer would.
async fn finish_vote_cycle(session: &SharedSession<ChampdUp>, names: &[&str]) {
    loop {
        let in_vote_event = session
            .lock()
            .await
            .game
            .current_event()
            .is_some_and(|e| e.name.is_vote());
        if !in_vote_event {
            break;
        }
        for name in names {
            dispatch(
                session,
                Sender::Player(name.to_string()),
                frame(MessageType::MatchupVote, json!("left")),
            )
            .await;
        }
        let matchup_idx = session.lock().await.game.matchup_index().expect("in a vote cycle");
        drive(session, None, Action::MatchupResult { idx: matchup_idx }).await;
        drive(session, None, Action::MatchupGrace { idx: matchup_idx }).await;
    }
}

#[tokio::test]
async fn test_full_game_flow() {
    let names = ["Ann", "Ben", "Cyn"];
    let (session, mut host_rx, mut player_rxs) = setup(
        json!({ "bonus_round_enabled": false, "draw_duration": 30, "vote_duration": 10 }),
        &names,
    )
    .await;

    // Host starts the game; the deferred advance lands in FIRST_DRAW.
    dispatch(&session, Sender::Host, frame(MessageType::Start, json!(null))).await;
    {
        let guard = session.lock().await;
        assert_eq!(guard.engine.status, GameStatus::Running);
        assert_eq!(guard.game.cursor(), 0);
    }

    // Round one: everyone submits, early advance walks draw -> counter -> vote.
    submit_all(&session, &names, "R1").await;
    assert_eq!(session.lock().await.game.cursor(), 1);
    submit_all(&session, &names, "C1").await;
    assert_eq!(session.lock().await.game.cursor(), 2);
    finish_vote_cycle(&session, &names).await;

    // Round two.
    assert_eq!(session.lock().await.game.cursor(), 3);
    submit_all(&session, &names, "R2").await;
    submit_all(&session, &names, "C2").await;
    finish_vote_cycle(&session, &names).await;

    // Bonus disabled: the sequence ends on the leaderboard.
    let announced: Vec<String> = drain(&mut host_rx)
        .into_iter()
        .filter(|f| f.kind == MessageType::Event)
        .map(|f| f.value["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        announced,
        vec![
            "FIRST_DRAW",
            "FIRST_COUNTER",
            "FIRST_VOTE",
            "SECOND_DRAW",
            "SECOND_COUNTER",
            "SECOND_VOTE",
            "LEADERBOARD",
        ]
    );

    // Scoring paid someone across six matchups.
    {
        let guard = session.lock().await;
        let total: i64 = guard.engine.roster().iter().map(|p| p.points).sum();
        assert!(total > 0, "matchup scoring paid out points");
    }

    // Every player saw the final leaderboard broadcast.
    for rx in &mut player_rxs {
        let frames = drain(rx);
        assert!(kinds(&frames).contains(&MessageType::Leaderboard));
    }

    // Host stop is terminal.
    dispatch(&session, Sender::Host, frame(MessageType::Stop, json!(null))).await;
    assert_eq!(session.lock().await.engine.status, GameStatus::Stopped);
}

#[tokio::test]
async fn test_capacity_enforced_through_registry_config() {
    let (session, _host_rx, _rxs) = setup(json!({ "max_players": 3 }), &["Ann", "Ben", "Cyn"]).await;
    let mut guard = session.lock().await;
    assert!(guard.engine.join("Dee").is_err());
}

#[tokio::test]
async fn test_malformed_and_unknown_frames_keep_session_alive() {
    let names = ["Ann", "Ben", "Cyn"];
    let (session, _host_rx, _rxs) = setup(json!({}), &names).await;

    // A vote before any matchup exists is an application rejection.
    dispatch(
        &session,
        Sender::Player("Ann".to_string()),
        frame(MessageType::MatchupVote, json!("left")),
    )
    .await;
    // A frame from someone who never joined is dropped.
    dispatch(
        &session,
        Sender::Player("Ghost".to_string()),
        frame(MessageType::Chat, json!("boo")),
    )
    .await;

    let guard = session.lock().await;
    assert_eq!(guard.engine.status, GameStatus::Waiting);
    assert_eq!(guard.engine.players.len(), 3);
}

#[tokio::test]
async fn test_private_message_routing() {
    let names = ["Ann", "Ben", "Benny"];
    let (session, mut host_rx, mut player_rxs) = setup(json!({}), &names).await;
    drain(&mut host_rx);
    for rx in &mut player_rxs {
        drain(rx);
    }

    dispatch(
        &session,
        Sender::Player("Ann".to_string()),
        frame(MessageType::Chat, json!("/pm Ben secret plan")),
    )
    .await;

    let ann = drain(&mut player_rxs[0]);
    let ben = drain(&mut player_rxs[1]);
    let benny = drain(&mut player_rxs[2]);
    let host = drain(&mut host_rx);
    assert!(kinds(&ann).contains(&MessageType::Pm), "sender gets a copy");
    assert!(kinds(&ben).contains(&MessageType::Pm), "target receives it");
    assert!(!kinds(&benny).contains(&MessageType::Pm));
    assert!(!kinds(&host).contains(&MessageType::Pm));

    let pm = ben.iter().find(|f| f.kind == MessageType::Pm).unwrap();
    assert_eq!(pm.value["text"], "secret plan");
    assert_eq!(pm.value["to"], "Ben");
}

#[tokio::test]
async fn test_pm_sender_never_matches_themselves() {
    let names = ["Ben", "Benny", "Cyn"];
    let (session, _host_rx, mut player_rxs) = setup(json!({}), &names).await;
    for rx in &mut player_rxs {
        drain(rx);
    }

    dispatch(
        &session,
        Sender::Player("Ben".to_string()),
        frame(MessageType::Chat, json!("/pm ben hello")),
    )
    .await;

    let benny = drain(&mut player_rxs[1]);
    assert!(
        kinds(&benny).contains(&MessageType::Pm),
        "best match skips the sender"
    );
}

#[tokio::test]
async fn test_reconnect_preserves_identity_and_score() {
    let names = ["Ann", "Ben", "Cyn"];
    let (session, _host_rx, _rxs) = setup(json!({}), &names).await;

    {
        let mut guard = session.lock().await;
        guard.engine.set_status(GameStatus::Running);
        guard.engine.player_mut("Ann").unwrap().points = 1234;
    }

    // Socket drop while RUNNING: the player stays, marked disconnected.
    let old_sink = {
        let guard = session.lock().await;
        guard.engine.connections.player_sink("ann").cloned().unwrap()
    };
    {
        let mut guard = session.lock().await;
        guard.engine.disconnect_player("Ann", &old_sink);
        let ann = guard.engine.player("Ann").unwrap();
        assert_eq!(ann.connection_status, ConnectionStatus::Disconnected);
        assert_eq!(ann.points, 1234);
    }

    // Rebinding delivers a tailored snapshot immediately.
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let mut guard = session.lock().await;
        guard.engine.connect_player("Ann", tx.clone());
        let viewer = crackbox::types::Author::player(guard.engine.player("Ann").unwrap().clone());
        let snapshot = guard.snapshot_for(&viewer);
        tx.send(snapshot).unwrap();
        let ann = guard.engine.player("Ann").unwrap();
        assert_eq!(ann.connection_status, ConnectionStatus::Connected);
        assert_eq!(ann.points, 1234);
    }
    let frames = drain(&mut rx);
    let state = frames
        .iter()
        .find(|f| f.kind == MessageType::State)
        .expect("snapshot sent on rebind");
    assert_eq!(state.value["status"], "RUNNING");
}

#[tokio::test]
async fn test_poll_round_trip() {
    let names = ["Ann", "Ben", "Cyn"];
    let (session, mut host_rx, _rxs) = setup(json!({}), &names).await;
    drain(&mut host_rx);

    dispatch(
        &session,
        Sender::Player("Ann".to_string()),
        frame(MessageType::Chat, json!("/poll pineapple on pizza?")),
    )
    .await;
    dispatch(
        &session,
        Sender::Player("Ben".to_string()),
        frame(MessageType::PollVote, json!("yes")),
    )
    .await;
    dispatch(
        &session,
        Sender::Player("Ben".to_string()),
        frame(MessageType::PollVote, json!("no")),
    )
    .await;

    let frames = drain(&mut host_rx);
    let last_tally = frames
        .iter()
        .rev()
        .find(|f| f.kind == MessageType::PollVote)
        .expect("tally broadcast");
    assert_eq!(last_tally.value["yes"], 0);
    assert_eq!(last_tally.value["no"], 1);
}
