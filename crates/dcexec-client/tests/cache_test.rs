mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{binary, wait_until, StubCollaborator};
use dcexec_client::{PendingRun, Server};
use dcexec_common::{DcexecError, FileErrorKind};

#[test]
fn test_sequential_sends_upload_once() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");

    let server = Server::new(&registry, "host-a");
    server.send_exec(&prog).unwrap();
    let first = registry.state_for("host-a").cached(&prog).unwrap();
    server.send_exec(&prog).unwrap();
    server.run_exec(&prog, b"x").unwrap();
    let second = registry.state_for("host-a").cached(&prog).unwrap();

    assert_eq!(stub.upload_count(), 1);
    assert_eq!(first.handle(), second.handle());
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_sends_upload_once() {
    let stub = StubCollaborator::with_upload_delay(Duration::from_millis(50));
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let server = server.clone();
            let prog = prog.clone();
            std::thread::spawn(move || server.send_exec(&prog))
        })
        .collect();
    for thread in threads {
        thread.join().unwrap().unwrap();
    }

    assert_eq!(stub.upload_count(), 1);
    assert_eq!(server.cached_executables(), vec![prog]);
}

#[test]
fn test_servers_for_same_address_share_cache() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");

    let a = Server::new(&registry, "host-a");
    let b = Server::new(&registry, "host-a");
    let other = Server::new(&registry, "host-b");
    a.send_exec(&prog).unwrap();

    assert!(b.contains_exec(&prog));
    assert!(!other.contains_exec(&prog));
    assert_eq!(a, b);
    assert_ne!(a, other);
    assert_eq!(registry.handle_count("host-a"), 2);
}

#[test]
fn test_failed_upload_leaves_cache_unchanged() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    stub.set_fail_upload(true);
    assert!(matches!(server.send_exec(&prog), Err(DcexecError::Upload(_))));
    assert!(!server.contains_exec(&prog));

    stub.set_fail_upload(false);
    server.send_exec(&prog).unwrap();
    assert!(server.contains_exec(&prog));
}

#[test]
fn test_missing_local_file_is_file_error() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let server = Server::new(&registry, "host-a");

    let err = server.run_exec("/no/such/binary", b"").unwrap_err();
    assert!(matches!(err, DcexecError::File { kind: FileErrorKind::Open, .. }));
    assert_eq!(stub.upload_count(), 0);
    assert_eq!(server.num_jobs(), 0);
}

#[test]
fn test_num_jobs_restored_after_failures() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    stub.set_fail_execute(true);
    assert!(matches!(server.run_exec(&prog, b"in"), Err(DcexecError::Execution(_))));
    assert_eq!(server.num_jobs(), 0);

    let pending = server.run_exec_async(&prog, b"in".to_vec());
    assert!(matches!(pending.wait(), Err(DcexecError::Execution(_))));
    assert_eq!(server.num_jobs(), 0);

    // The echo of a string does not decode as a number
    stub.set_fail_execute(false);
    let result: dcexec_common::Result<u32> = server.run_exec_as_function(&prog, "not a number");
    assert!(matches!(result, Err(DcexecError::Marshal(_))));
    assert_eq!(server.num_jobs(), 0);
}

#[test]
fn test_async_run_counts_until_finished() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    stub.close_gate();
    let pending = server.run_exec_async(&prog, b"payload".to_vec());
    assert_eq!(server.num_jobs(), 1);

    wait_until(|| stub.execute_count() == 1);
    assert_eq!(server.num_jobs(), 1);

    stub.open_gate();
    assert_eq!(pending.wait().unwrap(), b"payload");
    assert_eq!(server.num_jobs(), 0);
}

#[test]
fn test_typed_call_round_trips_through_stdin() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    let args = ("hello world".to_string(), vec![1i32, -2, 3], (true, 'x'));
    let echoed: (String, Vec<i32>, (bool, char)) = server.run_exec_as_function(&prog, &args).unwrap();
    assert_eq!(echoed, args);

    let pending: PendingRun<Vec<f64>> = server.run_exec_as_async_function(&prog, &vec![0.5, 1e-3]);
    assert_eq!(pending.wait().unwrap(), vec![0.5, 1e-3]);
}

#[test]
fn test_remove_exec() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    // Never uploaded: nothing to do, nobody contacted
    assert!(!server.remove_exec(&prog).unwrap());
    assert_eq!(stub.remove_count(), 0);

    server.send_exec(&prog).unwrap();
    assert!(server.remove_exec(&prog).unwrap());
    assert_eq!(stub.remove_count(), 1);
    assert!(!server.contains_exec(&prog));

    // A second removal is a miss again
    assert!(!server.remove_exec(&prog).unwrap());
    assert_eq!(stub.remove_count(), 1);
}

#[test]
fn test_remove_while_running_defers_remote_removal() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    stub.close_gate();
    let pending = server.run_exec_async(&prog, b"x".to_vec());
    wait_until(|| stub.execute_count() == 1);

    assert!(server.remove_exec(&prog).unwrap());
    assert_eq!(stub.remove_count(), 0);

    stub.open_gate();
    pending.wait().unwrap();
    assert_eq!(stub.remove_count(), 1);
}

#[test]
fn test_deferred_removal_failure_does_not_reach_caller() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    stub.close_gate();
    stub.set_fail_remove(true);
    let pending = server.run_exec_async(&prog, b"x".to_vec());
    wait_until(|| stub.execute_count() == 1);

    // Reported as removed although the remote removal has not happened yet
    assert!(server.remove_exec(&prog).unwrap());
    assert!(!server.contains_exec(&prog));

    stub.open_gate();
    assert_eq!(pending.wait().unwrap(), b"x");
    wait_until(|| stub.remove_count() == 1);
    wait_until(|| server.num_jobs() == 0);
}

#[test]
fn test_explicit_removal_failure_is_reported() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    server.send_exec(&prog).unwrap();
    stub.set_fail_remove(true);
    assert!(matches!(server.remove_exec(&prog), Err(DcexecError::Removal(_))));
    assert!(!server.contains_exec(&prog));
}

#[test]
fn test_overwrite_replaces_and_removes_old_copy() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");
    let server = Server::new(&registry, "host-a");

    server.send_exec(&prog).unwrap();
    let old = registry.state_for("host-a").cached(&prog).unwrap().handle().to_string();
    server.send_exec_overwrite(&prog).unwrap();
    let new = registry.state_for("host-a").cached(&prog).unwrap().handle().to_string();

    assert_eq!(stub.upload_count(), 2);
    assert_ne!(old, new);
    assert_eq!(stub.removes(), vec![("host-a".to_string(), old)]);
}

#[test]
fn test_dropping_last_server_removes_everything() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let one = binary(&dir, "one");
    let two = binary(&dir, "two");

    let first = Server::new(&registry, "host-a");
    let copy = first.clone();
    let second = Server::new(&registry, "host-a");
    first.send_exec(&one).unwrap();
    second.send_exec(&two).unwrap();
    assert_eq!(registry.handle_count("host-a"), 3);

    drop(first);
    drop(copy);
    assert_eq!(stub.remove_count(), 0);
    assert!(second.contains_exec(&one));

    drop(second);
    assert_eq!(stub.remove_count(), 2);
    assert_eq!(registry.handle_count("host-a"), 0);
    assert!(registry.hosts().is_empty());

    let fresh = Server::new(&registry, "host-a");
    assert!(fresh.cached_executables().is_empty());
    assert_eq!(registry.hosts(), vec!["host-a".to_string()]);
}

#[test]
fn test_every_collaborator_result_released_once() {
    let stub = StubCollaborator::new();
    let registry = stub.registry();
    let dir = tempfile::tempdir().unwrap();
    let prog = binary(&dir, "prog");

    {
        let server = Server::new(&registry, "host-a");
        server.run_exec(&prog, b"a").unwrap();
        server.run_exec(&prog, b"b").unwrap();
        let _: String = server.run_exec_as_function(&prog, "c").unwrap();
    }

    let calls = stub.upload_count() + stub.execute_count() + stub.remove_count();
    assert_eq!(calls, 1 + 3 + 1);
    assert_eq!(stub.released_count(), calls);
}
