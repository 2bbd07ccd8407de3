//! End-to-end tests against a fake P10 uplink.

mod common;
use common::{FakeUplink, Qserv};

#[tokio::test]
async fn burst_exchange_introduces_the_service() {
    let uplink = FakeUplink::bind().await.unwrap();
    let qserv = Qserv::start(uplink.port(), "p10", "QS").unwrap();
    let mut peer = uplink.accept().await.unwrap();

    let lines = peer.recv_n(3).await.unwrap();
    assert_eq!(lines[0], "PASS :linkpass");
    assert!(lines[1].starts_with("SERVER services.example.org 1 "));
    assert!(lines[1].ends_with(" J10 QS]]] +s6 :IRC Services"));
    assert_eq!(lines[2], "QS EB");

    peer.send_all(&[
        "PASS :linkpass",
        "SERVER hub.example.org 1 1700000000 1700000000 J10 AB]]] +h6 :Hub",
        "AB N alice 1 1700000000 alice h.example +i B]AAAB ABAAB :Alice",
        "AB EB",
    ])
    .await
    .unwrap();
    assert_eq!(peer.recv().await.unwrap(), "QS EA");

    peer.send("AB EA").await.unwrap();
    let intro = peer.recv().await.unwrap();
    assert!(intro.starts_with("QS N Q 1 "));
    assert!(intro.ends_with(" +odk AAAAAA QSAAA :Channel Service"));
    assert_eq!(
        peer.recv().await.unwrap(),
        "QS SW QSAAA :is a Network Service"
    );
    let join = peer.recv().await.unwrap();
    assert!(join.starts_with("QSAAA J #feds "));
    let op = peer.recv().await.unwrap();
    assert!(op.starts_with("QS M #feds +o QSAAA "));

    peer.send("AB G !1700000000.5 services.example.org 1700000000.5")
        .await
        .unwrap();
    assert_eq!(peer.recv().await.unwrap(), "QS Z QS :!1700000000.5");

    peer.send("ABAAB P QSAAA :ping").await.unwrap();
    assert_eq!(peer.recv().await.unwrap(), "QSAAA O ABAAB :pong");
    assert_eq!(qserv.ctx.state.nick_of("ABAAB").as_deref(), Some("alice"));

    qserv.stop().await.unwrap();
}
