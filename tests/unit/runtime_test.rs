//! Tests for tokio spawner utilities

use prometheus_poller::core::{AppResult, Poller};
use prometheus_poller::runtime::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
    handle.await.expect("task joined");
}

#[test]
fn test_poller_on_foreign_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime");
    let spawner = TokioSpawner::new(runtime.handle().clone());

    let poller = Poller::with_spawner(spawner, |n: &mut u32| -> AppResult<()> {
        *n = 5;
        Ok(())
    });
    let (tx, rx) = std::sync::mpsc::channel();
    poller.then(move |n| {
        let _ = tx.send(n);
    });

    assert_eq!(rx.recv().expect("first result"), 5);
    poller.stop();
    runtime.block_on(poller.join());
}
