mod common;

use common::*;
use rcse_sip_ua::capability::{Capabilities, CapabilityClient, CapabilityConfig, CapabilityLayer};
use rcse_sip_ua::SessionConfig;
use sip_types::{Code, Method, Name};

fn rcs_config() -> CapabilityConfig {
    CapabilityConfig {
        capabilities: Capabilities {
            chat: true,
            file_transfer: true,
            image_share: true,
            video_share: true,
            ..Capabilities::default()
        },
        ..CapabilityConfig::default()
    }
}

fn client(peer: &Peer, config: CapabilityConfig) -> CapabilityClient {
    CapabilityClient::new(
        peer.endpoint.clone(),
        identity("alice", "10.0.0.1"),
        SessionConfig::default(),
        config,
    )
}

#[tokio::test(start_paused = true)]
async fn query_between_peers() {
    let (alice, bob) = peers_with_capabilities(
        (SessionConfig::default(), rcs_config()),
        (SessionConfig::default(), rcs_config()),
    );

    let mut announced = bob.endpoint.layer::<CapabilityLayer>().subscribe();

    let client = client(&alice, rcs_config());
    client.set_in_call(true);

    let capabilities = client.query(bob_uri()).await.unwrap();

    assert!(capabilities.chat);
    assert!(capabilities.file_transfer);
    // In-call services are not advertised to OPTIONS outside of a call
    assert!(!capabilities.video_share);
    assert!(!capabilities.image_share);

    let remote = announced.recv().await.unwrap();
    assert_eq!(remote.remote.user(), Some("alice"));
    assert!(remote.capabilities.chat);
    assert!(remote.capabilities.video_share);
    assert!(remote.capabilities.image_share);
}

#[tokio::test(start_paused = true)]
async fn peer_without_services() {
    let (alice, _bob) = peers(SessionConfig::default(), SessionConfig::default());

    let capabilities = client(&alice, rcs_config())
        .query(bob_uri())
        .await
        .unwrap();

    assert!(capabilities.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_user() {
    let (alice, mut script) = alice_and_script(SessionConfig::default());

    let query = tokio::spawn({
        let client = client(&alice, rcs_config());
        async move { client.query(bob_uri()).await }
    });

    let options = script.next_request(Method::OPTIONS).await;
    assert!(options.headers.contains(&Name::CONTACT));
    assert!(options.headers.contains(&Name::ACCEPT));

    script.respond(&options, Code::NOT_FOUND).await;

    assert!(query.await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn challenge_answered_once() {
    let (alice, mut script) = alice_and_script(SessionConfig::default());

    let query = tokio::spawn({
        let client = client(&alice, rcs_config());
        async move { client.query(bob_uri()).await }
    });

    let options = script.next_request(Method::OPTIONS).await;
    script.send(proxy_challenge(&options, "first")).await;

    let options = script.next_request(Method::OPTIONS).await;
    assert!(options.headers.contains(&Name::PROXY_AUTHORIZATION));
    script.send(proxy_challenge(&options, "second")).await;

    assert!(query.await.unwrap().is_none());
    assert!(script.pending_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unanswered_query() {
    let (alice, mut script) = alice_and_script(SessionConfig::default());

    let query = tokio::spawn({
        let client = client(&alice, rcs_config());
        async move { client.query(bob_uri()).await }
    });

    script.next_request(Method::OPTIONS).await;

    assert!(query.await.unwrap().is_none());
}
