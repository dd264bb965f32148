//! Two entries over real localhost TCP: connect, heartbeat handshake,
//! message exchange, teardown on protocol violations, reconnect.

use anyhow::Result;
use e2e_tests::{init_tracing, wait_for_phase, Observed, Ping, PingPong, Pong, Recorder};
use network::{Acceptor, EndpointCfg};
use proto_entry::{spawn_accepted, spawn_client, DisconnectReason, EntryCfg, EntryHandle, Phase};
use std::time::Duration;

const GUARD: Duration = Duration::from_secs(10);

fn entry_cfg(port: u16) -> EntryCfg {
    let mut cfg = EntryCfg::new(EndpointCfg::new("localhost", port));
    cfg.reconnect_timeout_msec = 100;
    cfg
}

async fn accept_one(
    acceptor: &Acceptor,
    cfg: EntryCfg,
) -> (EntryHandle<PingPong>, tokio::sync::mpsc::UnboundedReceiver<Observed>) {
    let (stream, peer) = acceptor.accept().await.expect("accept");
    let (recorder, observed) = Recorder::new();
    let handle = spawn_accepted(
        stream,
        peer.to_string(),
        cfg,
        codec::TrivialEngine,
        recorder,
    );
    (handle, observed)
}

#[tokio::test]
async fn entries_reach_steady_and_exchange_messages() -> Result<()> {
    init_tracing();
    let acceptor = Acceptor::bind(&EndpointCfg::new("localhost", 0)).await?;
    let port = acceptor.local_addr().port();

    let (client_recorder, mut client_observed) = Recorder::new();
    let client: EntryHandle<PingPong> =
        spawn_client(entry_cfg(port), codec::TrivialEngine, client_recorder);

    let (server, mut server_observed) =
        accept_one(&acceptor, entry_cfg(port)).await;

    let mut client_phases = client.phase_watch();
    let mut server_phases = server.phase_watch();
    tokio::time::timeout(GUARD, wait_for_phase(&mut client_phases, Phase::Steady))
        .await
        .expect("client steady");
    tokio::time::timeout(GUARD, wait_for_phase(&mut server_phases, Phase::Steady))
        .await
        .expect("server steady");

    // Client pings, server pongs.
    let ping = PingPong::from(Ping {
        seq: 1,
        note: "hello".into(),
    });
    client.send(ping.clone()).await.expect("send ping");

    loop {
        match tokio::time::timeout(GUARD, server_observed.recv())
            .await
            .expect("server event")
            .expect("server events open")
        {
            Observed::Message(message) => {
                assert_eq!(message, ping);
                break;
            }
            _ => continue,
        }
    }

    let pong = PingPong::from(Pong { seq: 1 });
    server.send(pong.clone()).await.expect("send pong");

    loop {
        match tokio::time::timeout(GUARD, client_observed.recv())
            .await
            .expect("client event")
            .expect("client events open")
        {
            Observed::Message(message) => {
                assert_eq!(message, pong);
                break;
            }
            _ => continue,
        }
    }

    client.shutdown().await;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn client_reconnects_after_server_drop() -> Result<()> {
    init_tracing();
    let acceptor = Acceptor::bind(&EndpointCfg::new("localhost", 0)).await?;
    let port = acceptor.local_addr().port();

    let (client_recorder, mut client_observed) = Recorder::new();
    let client: EntryHandle<PingPong> =
        spawn_client(entry_cfg(port), codec::TrivialEngine, client_recorder);

    // First session: reach steady, then drop the server side.
    let (server, _server_observed) = accept_one(&acceptor, entry_cfg(port)).await;
    let mut client_phases = client.phase_watch();
    tokio::time::timeout(GUARD, wait_for_phase(&mut client_phases, Phase::Steady))
        .await
        .expect("first steady");
    server.shutdown().await;

    // The client reconnects on its own; serve the new socket when it
    // arrives.
    let (_server2, _observed2) = accept_one(&acceptor, entry_cfg(port)).await;

    // The consumer's event stream sees every transition, including the
    // short-lived ReconnectPending window the watch might skip over.
    let mut phases_seen = Vec::new();
    while !phases_seen.ends_with(&[Phase::Steady]) || !phases_seen.contains(&Phase::ReconnectPending)
    {
        match tokio::time::timeout(GUARD, client_observed.recv())
            .await
            .expect("client event")
            .expect("client events open")
        {
            Observed::Phase(phase) => phases_seen.push(phase),
            _ => {}
        }
    }

    let pending_at = phases_seen
        .iter()
        .position(|phase| *phase == Phase::ReconnectPending)
        .expect("reconnect pending observed");
    assert!(phases_seen[pending_at..].contains(&Phase::Connecting));
    assert_eq!(*phases_seen.last().unwrap(), Phase::Steady);

    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unknown_tag_frame_tears_down_the_accepted_entry() -> Result<()> {
    use codec::{PkgContentType, PkgHeader};
    use tokio::io::AsyncWriteExt;

    init_tracing();
    let acceptor = Acceptor::bind(&EndpointCfg::new("localhost", 0)).await?;
    let port = acceptor.local_addr().port();

    // A raw client that speaks framing but not the protocol.
    let connect = tokio::net::TcpStream::connect(("127.0.0.1", port));
    let (raw, accepted) = tokio::join!(connect, accept_one(&acceptor, entry_cfg(port)));
    let mut raw = raw?;
    let (server, mut server_observed) = accepted;

    let mut wire = Vec::new();
    let header = PkgHeader::new(PkgContentType::Message, 4242, 3, 0);
    wire.extend_from_slice(zerocopy_bytes(&header));
    wire.extend_from_slice(&[1, 2, 3]);
    raw.write_all(&wire).await?;

    let mut server_phases = server.phase_watch();
    tokio::time::timeout(
        GUARD,
        wait_for_phase(&mut server_phases, Phase::Disconnected),
    )
    .await
    .expect("server disconnected");

    let mut saw_unknown_tag = false;
    while let Ok(event) = server_observed.try_recv() {
        match event {
            Observed::Message(_) => panic!("no message may be delivered"),
            Observed::Disconnect(reason) => {
                assert_eq!(reason, DisconnectReason::UnknownMessageTag);
                saw_unknown_tag = true;
            }
            Observed::Phase(_) => {}
        }
    }
    assert!(saw_unknown_tag);
    Ok(())
}

fn zerocopy_bytes(header: &codec::PkgHeader) -> &[u8] {
    use zerocopy::AsBytes;
    header.as_bytes()
}
