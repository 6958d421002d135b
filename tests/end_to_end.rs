mod common;

use async_std::future::timeout;
use async_std::net::TcpListener;
use async_std::task;
use easyrpc::{
    ConnectionProvider, ExceptionKind, HttpClientTransport, HttpServer, JsonProtocol, RpcError,
    Session,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::adder::{AddTwoArgs, Adder, AdderService};
use common::{init_logging, start_adder, unused_port};

#[test]
fn on_builds_an_unbound_server() -> anyhow::Result<()> {
    let port = unused_port();
    let server: HttpServer = easyrpc::on(AdderService, Adder, "127.0.0.1", port);
    assert_eq!(server.host(), "127.0.0.1");
    assert_eq!(server.port(), port);
    // Nothing holds the port yet.
    drop(std::net::TcpListener::bind(("127.0.0.1", port))?);
    Ok(())
}

#[test]
fn to_derives_the_address() {
    let client = easyrpc::to(Adder, "localhost", 10000);
    assert_eq!(client.address(), "http://localhost:10000");
    assert_eq!(client.host(), "localhost");
    assert_eq!(client.port(), 10000);
}

#[async_std::test]
async fn open_without_server_fails() {
    let client = easyrpc::to(Adder, "127.0.0.1", unused_port());
    assert!(matches!(client.open().await, Err(RpcError::Io(_))));
}

#[async_std::test]
async fn one_call() -> anyhow::Result<()> {
    init_logging();
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "localhost", port);

    let mut session = client.open().await?;
    assert_eq!(session.add_two(10, 20).await?, 30);
    session.close()?;
    Ok(())
}

#[async_std::test]
async fn two_calls_in_separate_sessions() -> anyhow::Result<()> {
    init_logging();
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let mut session = client.open().await?;
    assert_eq!(session.add_two(10, 20).await?, 30);
    session.close()?;

    let mut session = client.open().await?;
    assert_eq!(session.add_three(10, 20, 30).await?, 60);
    session.close()?;
    Ok(())
}

#[async_std::test]
async fn two_calls_in_the_same_session() -> anyhow::Result<()> {
    init_logging();
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let sums = client
        .with(|adder| {
            Box::pin(async move {
                let two = adder.add_two(10, 20).await?;
                let three = adder.add_three(10, 20, 30).await?;
                easyrpc::Result::Ok((two, three))
            })
        })
        .await?;
    assert_eq!(sums, (30, 60));
    Ok(())
}

#[async_std::test]
async fn failing_scope_still_closes() -> anyhow::Result<()> {
    init_logging();
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let seen: Arc<Mutex<Option<HttpClientTransport>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let res: easyrpc::Result<i64> = client
        .with(move |adder| {
            Box::pin(async move {
                *captured.lock().unwrap() = Some(adder.transport().clone());
                assert_eq!(adder.add_two(10, 20).await?, 30);
                Err(RpcError::Remote {
                    kind: ExceptionKind::InternalError,
                    message: "injected".into(),
                })
            })
        })
        .await;

    match res {
        Err(RpcError::Remote { message, .. }) => assert_eq!(message, "injected"),
        other => panic!("the injected error was replaced: {:?}", other),
    }
    let transport = seen.lock().unwrap().take().unwrap();
    assert!(!transport.is_open());
    Ok(())
}

#[async_std::test]
async fn dropped_session_closes() -> anyhow::Result<()> {
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let mut session = client.open().await?;
    let transport = session.transport().clone();
    assert_eq!(session.add_two(1, 2).await?, 3);
    assert!(transport.is_open());
    drop(session);
    assert!(!transport.is_open());
    Ok(())
}

#[async_std::test]
async fn panicking_scope_closes() -> anyhow::Result<()> {
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let seen: Mutex<Option<HttpClientTransport>> = Mutex::new(None);
    let res = AssertUnwindSafe(async {
        let session = client.open().await.unwrap();
        *seen.lock().unwrap() = Some(session.transport().clone());
        panic!("boom");
    })
    .catch_unwind()
    .await;
    assert!(res.is_err());

    let transport = seen.lock().unwrap().take().unwrap();
    assert!(!transport.is_open());
    Ok(())
}

#[async_std::test]
async fn rpc_errors_leave_the_session_open() -> anyhow::Result<()> {
    let port = start_adder().await?;
    let transport = HttpClientTransport::new(&format!("http://127.0.0.1:{}", port))?;
    transport.open().await?;
    let mut protocol = JsonProtocol::new(transport.clone());

    let res: easyrpc::Result<i64> = protocol.call("subtract", AddTwoArgs { a: 1, b: 2 }).await;
    match res {
        Err(RpcError::Remote { kind, message }) => {
            assert_eq!(kind, ExceptionKind::UnknownMethod);
            assert!(message.contains("subtract"));
        }
        other => panic!("unexpected result {:?}", other),
    }

    assert!(transport.is_open());
    let sum: i64 = protocol.call("addTwo", AddTwoArgs { a: 1, b: 2 }).await?;
    assert_eq!(sum, 3);

    transport.close()?;
    let res: easyrpc::Result<i64> = protocol.call("addTwo", AddTwoArgs { a: 1, b: 2 }).await;
    assert!(matches!(res, Err(RpcError::NotOpen)));
    Ok(())
}

#[async_std::test]
async fn provider_is_shared_across_tasks() -> anyhow::Result<()> {
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let tasks: Vec<_> = (0..4i64)
        .map(|i| {
            let client = client.clone();
            task::spawn(async move {
                client
                    .with(move |adder| Box::pin(async move { adder.add_two(i, i).await }))
                    .await
            })
        })
        .collect();
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await?, 2 * i as i64);
    }
    Ok(())
}

#[async_std::test]
async fn explicit_path_is_accepted() -> anyhow::Result<()> {
    let port = start_adder().await?;
    let client = easyrpc::to(Adder, "127.0.0.1", port).path("/adder");
    let mut session = client.open().await?;
    assert_eq!(session.transport().path(), "/adder");
    assert_eq!(session.add_two(2, 2).await?, 4);
    session.close()?;
    Ok(())
}

#[async_std::test]
async fn timed_out_call_closes_the_session() -> anyhow::Result<()> {
    // Accepts connections into the backlog and never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let client = easyrpc::to(Adder, "127.0.0.1", port);

    let mut session = client.open().await?;
    let res = timeout(Duration::from_millis(100), session.add_two(1, 2)).await;
    assert!(res.is_err());

    assert!(!session.transport().is_open());
    assert!(matches!(session.add_two(1, 2).await, Err(RpcError::NotOpen)));
    session.close()?;
    Ok(())
}
