//! End-to-end relay tests over loopback TCP

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use chat_relay::{ChatClient, ChatServer, ClientConfig, Frame, ServerConfig};

struct TestServer {
    server: Arc<ChatServer>,
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<chat_relay::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let server = Arc::new(ChatServer::new(ServerConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel();

        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve(listener, async {
                        let _ = stopped.await;
                    })
                    .await
            })
        };

        Self {
            server,
            addr,
            stop: Some(stop),
            task,
        }
    }

    async fn wait_for_members(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.server.registry().len().await != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("member count not reached");
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

struct TestClient {
    client: ChatClient,
    inbox: mpsc::UnboundedReceiver<Frame>,
    receiver: JoinHandle<chat_relay::Result<()>>,
}

impl TestClient {
    async fn login(addr: SocketAddr, username: &str) -> Self {
        let mut client = ChatClient::connect(ClientConfig::new(addr.to_string(), username))
            .await
            .unwrap();
        let (tx, inbox) = mpsc::unbounded_channel();
        let receiver = client
            .on_frame(move |frame| {
                let _ = tx.send(frame);
            })
            .unwrap();

        Self {
            client,
            inbox,
            receiver,
        }
    }

    async fn next(&mut self) -> Frame {
        tokio::time::timeout(Duration::from_secs(5), self.inbox.recv())
            .await
            .expect("no frame in time")
            .expect("connection closed")
    }

    fn assert_quiet(&mut self) {
        assert!(
            self.inbox.try_recv().is_err(),
            "unexpected frame in inbox"
        );
    }
}

#[tokio::test]
async fn test_two_users_chat() {
    let server = TestServer::start().await;

    let mut alice = TestClient::login(server.addr, "alice").await;
    server.wait_for_members(1).await;

    let mut bob = TestClient::login(server.addr, "bob").await;
    server.wait_for_members(2).await;

    assert_eq!(
        alice.next().await,
        Frame::alert("bob has entered the chat!")
    );

    alice.client.send_text("hi").await.unwrap();
    assert_eq!(bob.next().await, Frame::text("alice", "hi"));

    alice.client.disconnect().await.unwrap();
    assert_eq!(bob.next().await, Frame::alert("alice has left the chat!"));

    // Alice's stream ends without her own message echoed back
    tokio::time::timeout(Duration::from_secs(5), alice.receiver)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(alice.inbox.recv().await, None);

    server.wait_for_members(1).await;
    // Exactly one leave alert, and no alert about bob himself
    bob.assert_quiet();

    server.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), bob.receiver)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_file_forwarded_to_everyone_else() {
    let server = TestServer::start().await;

    let mut alice = TestClient::login(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::login(server.addr, "bob").await;
    assert_eq!(alice.next().await, Frame::joined("bob"));

    let mut carol = TestClient::login(server.addr, "carol").await;
    server.wait_for_members(3).await;

    assert_eq!(alice.next().await, Frame::joined("carol"));
    assert_eq!(bob.next().await, Frame::joined("carol"));

    let contents = Bytes::from(vec![7u8; 100_000]);
    bob.client
        .send_file("photo.jpg", contents.clone())
        .await
        .unwrap();

    let expected = Frame::file("bob", "photo.jpg", contents);
    assert_eq!(alice.next().await, expected);
    assert_eq!(carol.next().await, expected);

    // An empty file message is relayed as is
    carol.client.send_file("", Bytes::new()).await.unwrap();
    assert_eq!(alice.next().await, Frame::file("carol", "", Bytes::new()));
    assert_eq!(bob.next().await, Frame::file("carol", "", Bytes::new()));

    // Nothing went back to either sender
    tokio::time::sleep(Duration::from_millis(50)).await;
    bob.assert_quiet();
    carol.assert_quiet();

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_idle_clients() {
    let server = TestServer::start().await;
    let stats_handle = Arc::clone(&server.server);

    let alice = TestClient::login(server.addr, "alice").await;
    server.wait_for_members(1).await;

    server.shutdown().await;

    // Alice never sent anything past login; the server still hung up
    tokio::time::timeout(Duration::from_secs(5), alice.receiver)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let stats = stats_handle.stats().await;
    assert_eq!(stats.total_connections, 1);
    assert_eq!(stats.registry.total_registered, 1);
}
