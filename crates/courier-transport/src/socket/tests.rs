//! Socket tests over loopback TCP

use super::*;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Bind on an ephemeral port and return the connectable endpoint
fn bind_ephemeral(socket: &mut Socket) -> String {
    let pattern = "tcp://127.0.0.1:0";
    socket.bind(pattern).unwrap();
    let addr = socket.local_addr(pattern).unwrap();
    format!("tcp://127.0.0.1:{}", addr.port())
}

fn text(envelope: &Envelope, index: usize) -> String {
    envelope.frame(index).unwrap().to_text().unwrap().to_string()
}

fn connected_dealer(ctx: &Context, identity: &'static str, endpoint: &str) -> Socket {
    let mut dealer = Socket::new(ctx, SocketKind::Dealer).unwrap();
    dealer.set_identity(Identity::from(identity)).unwrap();
    dealer.connect(endpoint).unwrap();
    dealer
}

#[tokio::test]
async fn test_router_prepends_identity_and_routes_reply() {
    let ctx = Context::new();
    let mut router = Socket::new(&ctx, SocketKind::Router).unwrap();
    let endpoint = bind_ephemeral(&mut router);

    let mut dealer = connected_dealer(&ctx, "CLIENT [7]", &endpoint);
    dealer.send(Envelope::new().with("hello")).await.unwrap();

    let request = timeout(WAIT, router.recv()).await.unwrap().unwrap();
    assert_eq!(request.len(), 2);
    assert_eq!(text(&request, 0), "CLIENT [7]");
    assert_eq!(text(&request, 1), "hello");

    router
        .send(Envelope::new().with("CLIENT [7]").with("world"))
        .await
        .unwrap();

    let reply = timeout(WAIT, dealer.recv()).await.unwrap().unwrap();
    assert_eq!(reply, Envelope::new().with("world"));
}

#[tokio::test]
async fn test_multi_frame_envelope_roundtrip() {
    let ctx = Context::new();
    let mut bound = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    let endpoint = bind_ephemeral(&mut bound);

    let mut connected = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    connected.connect(&endpoint).unwrap();

    let original = Envelope::new()
        .with("a")
        .with(Frame::new(vec![0u8, 1, 2, 255]))
        .with(Frame::empty())
        .with("c");
    connected.send(original.clone()).await.unwrap();

    let received = timeout(WAIT, bound.recv()).await.unwrap().unwrap();
    assert_eq!(received, original);
}

#[tokio::test]
async fn test_router_drops_unknown_identity() {
    let ctx = Context::new();
    let mut router = Socket::new(&ctx, SocketKind::Router).unwrap();
    let endpoint = bind_ephemeral(&mut router);

    let mut dealer = connected_dealer(&ctx, "known", &endpoint);
    dealer.send(Envelope::new().with("ping")).await.unwrap();
    timeout(WAIT, router.recv()).await.unwrap().unwrap();

    router.send(Envelope::new().with("unknown").with("lost")).await.unwrap();
    router.send(Envelope::new().with("known").with("kept")).await.unwrap();

    let reply = timeout(WAIT, dealer.recv()).await.unwrap().unwrap();
    assert_eq!(text(&reply, 0), "kept");
    assert!(matches!(
        dealer.poll_in(Duration::from_millis(50)).await,
        Err(TransportError::TryAgain)
    ));
}

#[tokio::test]
async fn test_dealer_round_robin_across_peers() {
    let ctx = Context::new();
    let mut backend = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    let endpoint = bind_ephemeral(&mut backend);

    let mut first = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    first.connect(&endpoint).unwrap();
    let mut second = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    second.connect(&endpoint).unwrap();

    // Both pipes are attached once each peer has been heard from
    first.send(Envelope::new().with("ready")).await.unwrap();
    second.send(Envelope::new().with("ready")).await.unwrap();
    for _ in 0..2 {
        timeout(WAIT, backend.recv()).await.unwrap().unwrap();
    }

    for i in 0..4 {
        backend.send(Envelope::new().with(format!("job {}", i))).await.unwrap();
    }

    let mut got_first = Vec::new();
    let mut got_second = Vec::new();
    for _ in 0..2 {
        got_first.push(text(&timeout(WAIT, first.recv()).await.unwrap().unwrap(), 0));
        got_second.push(text(&timeout(WAIT, second.recv()).await.unwrap().unwrap(), 0));
    }

    let mut all: Vec<String> = got_first.iter().chain(got_second.iter()).cloned().collect();
    all.sort();
    assert_eq!(all, vec!["job 0", "job 1", "job 2", "job 3"]);
    assert_ne!(got_first[0], got_first[1]);
}

#[tokio::test]
async fn test_dealer_send_waits_for_a_peer() {
    let ctx = Context::new();
    let mut backend = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    let endpoint = bind_ephemeral(&mut backend);

    let sender = tokio::spawn(async move {
        backend.send(Envelope::new().with("queued")).await.unwrap();
        backend
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!sender.is_finished());

    let mut worker = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    worker.connect(&endpoint).unwrap();

    let _backend = timeout(WAIT, sender).await.unwrap().unwrap();
    let received = timeout(WAIT, worker.recv()).await.unwrap().unwrap();
    assert_eq!(text(&received, 0), "queued");
}

#[tokio::test]
async fn test_terminate_unblocks_recv_and_send() {
    let ctx = Context::new();
    let mut dealer = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    let _endpoint = bind_ephemeral(&mut dealer);

    let waiter = tokio::spawn(async move {
        let recv = dealer.recv().await;
        let send = dealer.send(Envelope::new().with("x")).await;
        (recv, send)
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    ctx.terminate();

    let (recv, send) = timeout(WAIT, waiter).await.unwrap().unwrap();
    assert!(matches!(recv, Err(TransportError::Terminating)));
    assert!(matches!(send, Err(TransportError::Terminating)));
}

#[tokio::test]
async fn test_poll_in_times_out_with_try_again() {
    let ctx = Context::new();
    let mut dealer = Socket::new(&ctx, SocketKind::Dealer).unwrap();

    let result = dealer.poll_in(Duration::from_millis(10)).await;
    assert!(matches!(result, Err(TransportError::TryAgain)));
    assert!(matches!(dealer.try_recv(), Err(TransportError::TryAgain)));
}

#[tokio::test]
async fn test_unbind_and_disconnect() {
    let ctx = Context::new();
    let mut router = Socket::new(&ctx, SocketKind::Router).unwrap();
    let endpoint = bind_ephemeral(&mut router);

    let mut dealer = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    dealer.connect(&endpoint).unwrap();

    // Wrong direction and unknown endpoints are reported
    assert!(matches!(router.disconnect("tcp://127.0.0.1:0"), Err(TransportError::EndpointNotFound(_))));
    assert!(matches!(dealer.unbind(&endpoint), Err(TransportError::EndpointNotFound(_))));

    let control = dealer.control();
    control.disconnect(&endpoint).unwrap();
    assert!(matches!(control.disconnect(&endpoint), Err(TransportError::EndpointNotFound(_))));

    router.unbind("tcp://127.0.0.1:0").unwrap();
    assert!(router.local_addr("tcp://127.0.0.1:0").is_none());

    // Nothing listens any more, so a late sender never gets through
    let mut late = connected_dealer(&ctx, "late", &endpoint);
    late.send(Envelope::new().with("lost")).await.unwrap();
    assert!(matches!(
        router.poll_in(Duration::from_millis(100)).await,
        Err(TransportError::TryAgain)
    ));
}

#[tokio::test]
async fn test_control_outliving_socket_reports_closed() {
    let ctx = Context::new();
    let mut dealer = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    dealer.connect("tcp://127.0.0.1:5599").unwrap();
    let control = dealer.control();
    drop(dealer);

    assert!(matches!(control.disconnect("tcp://127.0.0.1:5599"), Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_bind_twice_is_rejected() {
    let ctx = Context::new();
    let mut router = Socket::new(&ctx, SocketKind::Router).unwrap();
    router.bind("tcp://127.0.0.1:0").unwrap();
    let result = router.bind("tcp://127.0.0.1:0");
    assert!(matches!(result, Err(TransportError::AddressInUse(_))));
}

#[tokio::test]
async fn test_invalid_endpoint_is_rejected() {
    let ctx = Context::new();
    let mut dealer = Socket::new(&ctx, SocketKind::Dealer).unwrap();
    assert!(matches!(dealer.connect("udp://127.0.0.1:5570"), Err(TransportError::InvalidEndpoint(_))));
    assert!(matches!(dealer.bind("tcp://127.0.0.1"), Err(TransportError::InvalidEndpoint(_))));
}

#[tokio::test]
async fn test_duplicate_identity_is_not_routed() {
    let ctx = Context::new();
    let mut router = Socket::new(&ctx, SocketKind::Router).unwrap();
    let endpoint = bind_ephemeral(&mut router);

    let mut first = connected_dealer(&ctx, "CLIENT [5]", &endpoint);
    first.send(Envelope::new().with("from first")).await.unwrap();
    let request = timeout(WAIT, router.recv()).await.unwrap().unwrap();
    assert_eq!(text(&request, 1), "from first");

    // The newcomer's pipe is never attached under the taken identity
    let mut second = connected_dealer(&ctx, "CLIENT [5]", &endpoint);
    second.send(Envelope::new().with("from second")).await.unwrap();
    assert!(matches!(
        router.poll_in(Duration::from_millis(200)).await,
        Err(TransportError::TryAgain)
    ));

    router.send(Envelope::new().with("CLIENT [5]").with("reply")).await.unwrap();
    let reply = timeout(WAIT, first.recv()).await.unwrap().unwrap();
    assert_eq!(text(&reply, 0), "reply");
    assert!(matches!(
        second.poll_in(Duration::from_millis(100)).await,
        Err(TransportError::TryAgain)
    ));
}
