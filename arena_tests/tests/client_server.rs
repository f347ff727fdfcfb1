//! Full socket-based integration tests for client ↔ server communication.

use arena_client::{sync::Outbound, GameClient, SessionError};
use arena_shared::{
    config::ArenaConfig,
    net::{
        decode_from_bytes, encode_to_bytes, events, Envelope, FrameListener, PlayerId,
        PlayerState, Roster, ScoreState, Team, Welcome,
    },
    physics::MotionBackend,
    render::{ScoreLabel, SpriteKind},
};
use arena_tests::{init_tracing, spawn_server, wait_until, WAIT};

fn movements(out: &[Outbound]) -> usize {
    out.iter()
        .filter(|o| matches!(o, Outbound::PlayerMovement(_)))
        .count()
}

/// Unit-style test: wire envelopes keep their event names and payloads.
#[test]
fn envelope_bytes_roundtrip() -> anyhow::Result<()> {
    let env = Envelope::new(events::SCORE_UPDATE, &ScoreState { blue: 3, red: 1 })?;
    assert_eq!(decode_from_bytes(&encode_to_bytes(&env)?)?, env);
    Ok(())
}

/// A joining client gets its craft, the star and the score text.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_spawns_local_craft_star_and_score() -> anyhow::Result<()> {
    init_tracing();
    let cfg = spawn_server(1).await?;

    let mut client = GameClient::connect(&cfg).await?;
    wait_until(&mut client, |core| {
        core.local().is_some() && core.star().is_some() && core.display().text(ScoreLabel::Blue).is_some()
    })
    .await?;

    let core = client.core();
    assert_eq!(core.display().count(SpriteKind::Ship), 1);
    assert_eq!(core.display().count(SpriteKind::Star), 1);
    assert!(core.registry().is_empty());
    assert_eq!(core.display().text(ScoreLabel::Blue), Some("Blue: 0"));
    assert_eq!(core.display().text(ScoreLabel::Red), Some("Red: 0"));
    Ok(())
}

/// Two clients see each other join, move and leave.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_player_lifecycle() -> anyhow::Result<()> {
    init_tracing();
    let cfg = spawn_server(2).await?;

    let mut a = GameClient::connect(&cfg).await?;
    wait_until(&mut a, |core| core.local().is_some()).await?;

    let mut b = GameClient::connect(&cfg).await?;
    let b_id = b.session_id().clone();
    wait_until(&mut b, |core| core.local().is_some()).await?;
    assert!(b.core().registry().contains(a.session_id()));

    {
        let id = b_id.clone();
        wait_until(&mut a, move |core| core.registry().contains(&id)).await?;
    }

    // Move b's craft and let its tick report the new pose.
    let body = b.core().local().map(|l| l.body).expect("local craft");
    b.core_mut().motion_mut().set_position(body, 123.0, 234.0);
    let sent = b.tick()?;
    assert!(sent
        .iter()
        .any(|o| matches!(o, Outbound::PlayerMovement(m) if m.x == 123.0 && m.y == 234.0)));

    {
        let id = b_id.clone();
        wait_until(&mut a, move |core| {
            core.registry()
                .get(&id)
                .is_some_and(|e| e.pose.x == 123.0 && e.pose.y == 234.0)
        })
        .await?;
    }
    let sprite = a.core().registry().get(&b_id).expect("proxy").sprite;
    let view = a.core().display().sprite(sprite).expect("proxy sprite");
    assert_eq!((view.x, view.y), (123.0, 234.0));

    drop(b);
    {
        let id = b_id.clone();
        wait_until(&mut a, move |core| !core.registry().contains(&id)).await?;
    }
    assert!(a.core().display().sprite(sprite).is_none());
    assert_eq!(a.core().display().count(SpriteKind::OtherPlayer), 0);
    Ok(())
}

/// Flying into the star scores for the collector's team and moves the star.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn collecting_the_star_scores_for_the_team() -> anyhow::Result<()> {
    init_tracing();
    let cfg = spawn_server(3).await?;

    let mut client = GameClient::connect(&cfg).await?;
    wait_until(&mut client, |core| core.local().is_some() && core.star().is_some()).await?;

    let team = client.core().local().expect("local craft").team;
    let star = *client.core().star().expect("star");
    let body = client.core().local().expect("local craft").body;
    client
        .core_mut()
        .motion_mut()
        .set_position(body, star.location.x, star.location.y);

    let sent = client.tick()?;
    assert!(sent.contains(&Outbound::StarCollected));

    let expected = match team {
        Team::Red => ScoreState { blue: 0, red: 10 },
        Team::Blue => ScoreState { blue: 10, red: 0 },
    };
    wait_until(&mut client, |core| core.score() == expected).await?;

    let core = client.core();
    assert_eq!(core.display().count(SpriteKind::Star), 1);
    assert!(!core.star().expect("new star").collected);
    assert!(core.motion().pose(star.body).is_none());
    let (blue, red) = (
        format!("Blue: {}", expected.blue),
        format!("Red: {}", expected.red),
    );
    assert_eq!(core.display().text(ScoreLabel::Blue), Some(blue.as_str()));
    assert_eq!(core.display().text(ScoreLabel::Red), Some(red.as_str()));
    Ok(())
}

/// Ticks with no input and no motion stay silent after the first report.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_client_reports_once() -> anyhow::Result<()> {
    init_tracing();
    let cfg = spawn_server(4).await?;

    let mut client = GameClient::connect(&cfg).await?;
    wait_until(&mut client, |core| core.local().is_some()).await?;

    assert_eq!(movements(&client.tick()?), 1);
    for _ in 0..10 {
        assert_eq!(movements(&client.tick()?), 0);
    }
    assert_eq!(client.ticks(), 11);
    Ok(())
}

/// When the server goes away the client releases every remote proxy.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_close_releases_remote_proxies() -> anyhow::Result<()> {
    init_tracing();
    let listener = FrameListener::bind("127.0.0.1:0".parse()?).await?;
    let cfg = ArenaConfig {
        server_addr: listener.local_addr()?.to_string(),
        ..Default::default()
    };

    let server = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await?;
        let _hello = conn.recv().await?;
        conn.send(&Envelope::new(events::WELCOME, &Welcome {
            session_id: PlayerId::new("me"),
        })?)
        .await?;
        let roster: Roster = [("me", Team::Blue, 100.0), ("other", Team::Red, 300.0)]
            .into_iter()
            .map(|(id, team, x)| {
                let state = PlayerState {
                    player_id: PlayerId::new(id),
                    team,
                    x,
                    y: x,
                    rotation: 0.0,
                };
                (state.player_id.clone(), state)
            })
            .collect();
        conn.send(&Envelope::new(events::CURRENT_PLAYERS, &roster)?)
            .await?;
        Ok::<_, anyhow::Error>(())
    });

    let mut client = GameClient::connect(&cfg).await?;
    let other = PlayerId::new("other");
    {
        let id = other.clone();
        wait_until(&mut client, move |core| core.registry().contains(&id)).await?;
    }
    server.await??;

    let closed = tokio::time::timeout(WAIT, async {
        loop {
            if let Err(e) = client.recv().await {
                break e;
            }
        }
    })
    .await?;
    assert!(matches!(closed, SessionError::Closed));

    let core = client.core();
    assert!(!core.registry().contains(&other));
    assert_eq!(core.display().count(SpriteKind::OtherPlayer), 0);
    assert_eq!(core.display().count(SpriteKind::Ship), 1);
    Ok(())
}
