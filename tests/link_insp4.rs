//! End-to-end tests against a fake InspIRCd 4 uplink.

mod common;
use common::{FakeUplink, Peer, Qserv};

const UPLINK_BURST: &[&str] = &[
    "CAPAB START 1206",
    "CAPAB END",
    "SERVER hub.example.org linkpass 034 :Hub",
    ":034 BURST 1700000000",
    ":034 UID 034AAAAAB 1700000000 alice h.example h.example alice alice 10.0.0.1 1700000000 +i :Alice",
    ":034 UID 034AAAAAC 1700000000 bob h.example h.example bob bob 10.0.0.2 1700000000 +i :Bob",
    ":034 ENDBURST",
];

/// Accept the daemon, consume its handshake and complete the burst exchange.
async fn linked(uplink: &FakeUplink) -> anyhow::Result<Peer> {
    let mut peer = uplink.accept().await?;
    peer.recv_until(|l| l.ends_with(" ENDBURST")).await?;
    peer.send_all(UPLINK_BURST).await?;
    peer.recv_until(|l| l.contains(" FJOIN #feds ")).await?;
    Ok(peer)
}

/// Send `text` to the service from `uid` and return the reply notice text.
async fn command(peer: &mut Peer, uid: &str, text: &str) -> anyhow::Result<String> {
    peer.send(&format!(":{uid} PRIVMSG 042AAAAAA :{text}")).await?;
    peer.notice_to(uid).await
}

#[tokio::test]
async fn handshake_lines_arrive_in_order() {
    let uplink = FakeUplink::bind().await.unwrap();
    let qserv = Qserv::start(uplink.port(), "insp4", "042").unwrap();
    let mut peer = uplink.accept().await.unwrap();

    let lines = peer.recv_n(6).await.unwrap();
    assert_eq!(lines[0], "CAPAB START 1206");
    assert_eq!(lines[1], "CAPAB END");
    assert_eq!(
        lines[2],
        "SERVER services.example.org linkpass 042 :IRC Services"
    );
    assert!(lines[3].starts_with(":042 BURST "));
    assert!(lines[4].starts_with(":042 UID 042AAAAAA "));
    assert!(lines[4].contains(" Q "));
    assert_eq!(lines[5], ":042 ENDBURST");

    peer.send_all(UPLINK_BURST).await.unwrap();
    let setup = peer.recv_n(3).await.unwrap();
    assert_eq!(
        setup[0],
        ":042 METADATA 042AAAAAA swhois :is a Network Service"
    );
    assert_eq!(setup[1], ":042 MODE 042AAAAAA +Bk");
    assert!(setup[2].starts_with(":042 FJOIN #feds "));
    assert!(setup[2].ends_with(" + :o,042AAAAAA"));

    qserv.stop().await.unwrap();
}

#[tokio::test]
async fn probes_are_answered() {
    let uplink = FakeUplink::bind().await.unwrap();
    let qserv = Qserv::start(uplink.port(), "insp4", "042").unwrap();
    let mut peer = linked(&uplink).await.unwrap();

    peer.send(":034 PING 042").await.unwrap();
    let lines = peer.recv_until(|l| l.starts_with("PONG")).await.unwrap();
    assert_eq!(lines.last().unwrap(), "PONG 034 042");

    peer.send("PING :hello").await.unwrap();
    let lines = peer.recv_until(|l| l.starts_with("PONG")).await.unwrap();
    assert_eq!(lines.last().unwrap(), "PONG :hello");

    qserv.stop().await.unwrap();
}

#[tokio::test]
async fn dropped_link_is_redialled() {
    let uplink = FakeUplink::bind().await.unwrap();
    let qserv = Qserv::start(uplink.port(), "insp4", "042").unwrap();

    let peer = linked(&uplink).await.unwrap();
    drop(peer);

    let mut again = uplink.accept().await.unwrap();
    assert_eq!(again.recv().await.unwrap(), "CAPAB START 1206");

    qserv.stop().await.unwrap();
}

#[tokio::test]
async fn account_and_access_scenario() {
    let uplink = FakeUplink::bind().await.unwrap();
    let qserv = Qserv::start(uplink.port(), "insp4", "042").unwrap();
    let mut peer = linked(&uplink).await.unwrap();
    let alice = "034AAAAAB";
    let bob = "034AAAAAC";

    assert_eq!(
        command(&mut peer, alice, "register alice s3cretpw").await.unwrap(),
        "Account registered. You can now: login alice <password>"
    );
    assert_eq!(
        command(&mut peer, alice, "login alice s3cretpw").await.unwrap(),
        "You are now logged in as alice."
    );
    assert_eq!(
        command(&mut peer, alice, "regchan #test").await.unwrap(),
        "Registered #test (owner: alice)."
    );

    command(&mut peer, bob, "register bob hunter2x").await.unwrap();
    peer.send(&format!(":{bob} PRIVMSG 042AAAAAA :login bob hunter2x"))
        .await
        .unwrap();
    let lines = peer
        .recv_until(|l| l.contains(" NOTICE 034AAAAAC "))
        .await
        .unwrap();
    assert!(lines.contains(&":042 METADATA 034AAAAAC accountname :bob".to_string()));
    assert!(lines.contains(&":042 CHGHOST 034AAAAAC bob.users.example.org".to_string()));
    assert!(lines.last().unwrap().ends_with(":You are now logged in as bob."));

    assert_eq!(
        command(&mut peer, bob, "login bob wrong").await.unwrap(),
        "Invalid account or password."
    );
    // Still logged in: the refusal is about ownership, not identity.
    assert_eq!(
        command(&mut peer, bob, "adduser #test bob 500").await.unwrap(),
        "Only the channel owner or level 400+ can change access on #test."
    );

    assert_eq!(
        command(&mut peer, alice, "adduser #test bob 500").await.unwrap(),
        "Set access on #test: bob = 500"
    );
    assert_eq!(
        command(&mut peer, alice, "access #test").await.unwrap(),
        "Access for #test: alice=500 | bob=500"
    );
    assert_eq!(qserv.ctx.stores.access.level("#test", "bob"), 500);

    qserv.stop().await.unwrap();
}

#[tokio::test]
async fn logins_survive_a_relink() {
    let uplink = FakeUplink::bind().await.unwrap();
    let qserv = Qserv::start(uplink.port(), "insp4", "042").unwrap();
    let mut peer = linked(&uplink).await.unwrap();
    let alice = "034AAAAAB";

    command(&mut peer, alice, "register alice s3cretpw").await.unwrap();
    assert_eq!(
        command(&mut peer, alice, "login alice s3cretpw").await.unwrap(),
        "You are now logged in as alice."
    );
    drop(peer);

    // The hub bursts alice again on the new link.
    let mut peer = linked(&uplink).await.unwrap();
    assert_eq!(
        qserv.ctx.state.session_account(alice).as_deref(),
        Some("alice")
    );
    assert_eq!(
        command(&mut peer, alice, "regchan #test").await.unwrap(),
        "Registered #test (owner: alice)."
    );

    qserv.stop().await.unwrap();
}
