//! dcexec End-to-End Tests
//!
//! Real workers on loopback ports, driven through the TCP collaborator.
//! Client calls block, so each test runs them on the blocking pool while the
//! workers are served by the test runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dcexec::{
    BalancePolicy, Client, DcexecError, HostRegistry, Server, TcpCollaborator, TransportConfig, WorkerConfig,
    WorkerServer,
};
use dcexec::worker::Worker;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestWorker {
    addr: String,
    worker: Arc<Worker>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<dcexec::Result<()>>,
    _storage: TempDir,
}

impl TestWorker {
    async fn start() -> Self {
        let storage = TempDir::new().unwrap();
        let config = WorkerConfig::new()
            .with_storage_dir(storage.path())
            .with_execution_timeout(Duration::from_secs(10));
        let server = WorkerServer::bind("127.0.0.1:0", config).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let worker = server.worker().clone();
        let (shutdown, stop) = oneshot::channel();
        let task = tokio::spawn(server.run_until(async {
            let _ = stop.await;
        }));
        Self {
            addr,
            worker,
            shutdown,
            task,
            _storage: storage,
        }
    }

    async fn stop(self) -> Arc<Worker> {
        let _ = self.shutdown.send(());
        self.task.await.unwrap().unwrap();
        self.worker
    }
}

fn registry() -> HostRegistry {
    let config = TransportConfig::default().with_io_timeout(Duration::from_secs(15));
    HostRegistry::new(Arc::new(TcpCollaborator::new(config).unwrap()))
}

/// Writes an executable shell script into `dir`.
fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path
}

/// A `cat` that does not depend on how the host's own `cat` is installed.
fn cat(dir: &TempDir) -> PathBuf {
    script(dir, "cat", "exec cat")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cat_round_trip_and_cleanup_on_drop() {
    let remote = TestWorker::start().await;
    let addr = remote.addr.clone();
    let worker = remote.worker.clone();
    let local = TempDir::new().unwrap();
    let cat = cat(&local);

    tokio::task::spawn_blocking(move || {
        let registry = registry();
        let server = Server::new(&registry, &addr);

        let out = server.run_exec(&cat, b"hello over tcp").unwrap();
        assert_eq!(out, b"hello over tcp");
        let out = server.run_exec(&cat, b"").unwrap();
        assert!(out.is_empty());

        // Uploaded once, still stored while a handle exists
        assert_eq!(worker.stored().len(), 1);
        assert_eq!(server.cached_executables(), vec![cat.clone()]);
        assert_eq!(server.num_jobs(), 0);

        drop(server);
        assert!(worker.stored().is_empty());
    })
    .await
    .unwrap();

    remote.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_typed_call_through_cat() {
    let remote = TestWorker::start().await;
    let addr = remote.addr.clone();
    let local = TempDir::new().unwrap();
    let cat = cat(&local);

    tokio::task::spawn_blocking(move || {
        let registry = registry();
        let server = Server::new(&registry, &addr);

        let args = ("multi word\nstring".to_string(), vec![-5i64, 0, 5], 2.5f64);
        let echoed: (String, Vec<i64>, f64) = server.run_exec_as_function(&cat, &args).unwrap();
        assert_eq!(echoed, args);

        let mismatch: dcexec::Result<Vec<u8>> = server.run_exec_as_function(&cat, "text");
        assert!(matches!(mismatch, Err(DcexecError::Marshal(_))));
    })
    .await
    .unwrap();

    remote.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_arguments_and_failures() {
    let remote = TestWorker::start().await;
    let addr = remote.addr.clone();
    let local = TempDir::new().unwrap();
    let echo = script(&local, "echo-args", "echo \"$@\"");
    let fail = script(&local, "fail", "echo 'bad input' >&2\nexit 2");

    tokio::task::spawn_blocking(move || {
        let registry = registry();
        let server = Server::new(&registry, &addr);

        let args = vec!["one".to_string(), "two three".to_string()];
        let out = server.run_exec_with_args(&echo, &args, b"").unwrap();
        assert_eq!(out, b"one two three\n");

        match server.run_exec(&fail, b"") {
            Err(DcexecError::Execution(msg)) => assert!(msg.contains("bad input"), "{}", msg),
            other => panic!("expected execution error, got {:?}", other),
        }
        assert_eq!(server.num_jobs(), 0);

        let missing = server.run_exec(Path::new("/no/such/program"), b"");
        assert!(matches!(missing, Err(DcexecError::File { .. })));
    })
    .await
    .unwrap();

    remote.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_remove_exec_deletes_remote_copy() {
    let remote = TestWorker::start().await;
    let addr = remote.addr.clone();
    let worker = remote.worker.clone();
    let local = TempDir::new().unwrap();
    let cat = cat(&local);

    tokio::task::spawn_blocking(move || {
        let collaborator = Arc::new(
            TcpCollaborator::new(TransportConfig::default().with_io_timeout(Duration::from_secs(15))).unwrap(),
        );
        let registry = HostRegistry::new(collaborator.clone());
        let server = Server::new(&registry, &addr);

        server.send_exec(&cat).unwrap();
        let handle = worker.stored()[0].to_string_lossy().into_owned();
        assert!(collaborator.exists(&addr, &handle).unwrap());

        assert!(server.remove_exec(&cat).unwrap());
        assert!(!collaborator.exists(&addr, &handle).unwrap());
        assert!(worker.stored().is_empty());
        assert!(!server.remove_exec(&cat).unwrap());
    })
    .await
    .unwrap();

    remote.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_spreads_runs_over_workers() {
    let first = TestWorker::start().await;
    let second = TestWorker::start().await;
    let addrs = vec![first.addr.clone(), second.addr.clone()];
    let workers = (first.worker.clone(), second.worker.clone());
    let local = TempDir::new().unwrap();
    let cat = cat(&local);

    tokio::task::spawn_blocking(move || {
        let registry = registry();
        let client = Client::from_addresses(&registry, &addrs, BalancePolicy::RoundRobin).unwrap();

        let pending: Vec<_> = (0..6)
            .map(|i| client.distribute_and_run(&cat, format!("run {}", i).into_bytes()))
            .collect();
        for (i, run) in pending.into_iter().enumerate() {
            assert_eq!(run.wait().unwrap(), format!("run {}", i).into_bytes());
        }

        // Round-robin touched both workers, each got exactly one upload
        assert_eq!(workers.0.stored().len(), 1);
        assert_eq!(workers.1.stored().len(), 1);

        let numbers: Vec<i64> = client.run_as_function(&cat, &vec![1i64, 2, 3]).unwrap();
        assert_eq!(numbers.iter().sum::<i64>(), 6);

        drop(client);
        assert!(workers.0.stored().is_empty());
        assert!(workers.1.stored().is_empty());
    })
    .await
    .unwrap();

    first.stop().await;
    second.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_shutdown_removes_stored_binaries() {
    let remote = TestWorker::start().await;
    let addr = remote.addr.clone();
    let local = TempDir::new().unwrap();
    let cat = cat(&local);

    let (registry, server) = tokio::task::spawn_blocking(move || {
        let registry = registry();
        let server = Server::new(&registry, &addr);
        server.send_exec(&cat).unwrap();
        (registry, server)
    })
    .await
    .unwrap();

    let worker = remote.stop().await;
    assert!(worker.stored().is_empty());

    // The client side still holds the handle; its removal now fails quietly
    tokio::task::spawn_blocking(move || {
        drop(server);
        drop(registry);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_key_value_store_over_tcp() {
    let remote = TestWorker::start().await;
    let addr = remote.addr.clone();

    let stored_path = tokio::task::spawn_blocking(move || {
        let collab = TcpCollaborator::new(TransportConfig::default()).unwrap();
        assert!(!collab.put(&addr, "input", "3 1 2").unwrap());
        assert_eq!(collab.append(&addr, "input", " 9").unwrap(), "3 1 2 9");
        assert_eq!(collab.get(&addr, "input").unwrap(), "3 1 2 9");
        assert!(matches!(collab.get(&addr, "absent"), Err(DcexecError::Store(_))));

        let path = collab.store_in_tmp(&addr, "input").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3 1 2 9");
        assert_eq!(collab.delete_in_tmp(&addr, "input").unwrap(), path);
        assert!(!Path::new(&path).exists());

        collab.store_in_tmp(&addr, "input").unwrap()
    })
    .await
    .unwrap();

    // Shutdown deletes files written from the store too
    let worker = remote.stop().await;
    assert!(worker.data().files().await.is_empty());
    assert!(!Path::new(&stored_path).exists());
}
