//! End-to-end integration tests for obexftpd.
//!
//! These tests drive a session through its worker the way a transport would:
//! - Reserved names never touch the tree
//! - PUT and GET round trips
//! - Folder navigation
//! - Abort and space enforcement
//! - Change notifications
//! - Two sessions sharing one root

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ftpd::events::{BroadcastNotifier, FtpEvent};
use ftpd::files::ExtensionTable;
use ftpd::obex::{HeaderSet, MemoryOperation, ResponseCode, FOLDER_LISTING_TYPE, FTP_TARGET};
use ftpd::session::{Request, SessionHandle, SessionWorker};
use ftpd::storage::{LocalVolume, StorageVolume};
use ftpd::FtpSession;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Volume that reports a fixed amount of free space.
struct LimitedVolume(u64);

impl StorageVolume for LimitedVolume {
    fn is_mounted(&self) -> bool {
        true
    }

    fn has_space_for(&self, bytes: u64) -> bool {
        bytes <= self.0
    }
}

struct Harness {
    root: TempDir,
    worker: SessionWorker,
    handle: SessionHandle,
    events: broadcast::Receiver<FtpEvent>,
}

/// Spawn a session serving `root` and connect it.
async fn start_session(
    root: &Path,
    volume: Arc<dyn StorageVolume>,
) -> (SessionWorker, SessionHandle, broadcast::Receiver<FtpEvent>) {
    let notifier = Arc::new(BroadcastNotifier::new());
    let mut events = notifier.subscribe();
    let session = FtpSession::new(root, volume, Arc::new(ExtensionTable::builtin()), notifier);
    let (worker, handle) = SessionWorker::spawn(session).unwrap();

    let reply = handle
        .submit(Request::Connect(
            HeaderSet::new().with_target(FTP_TARGET.to_vec()),
        ))
        .await
        .unwrap();
    assert_eq!(reply.code, ResponseCode::Ok);
    assert_eq!(events.recv().await.unwrap(), FtpEvent::SessionEstablished);
    (worker, handle, events)
}

fn drain(events: &mut broadcast::Receiver<FtpEvent>) -> Vec<FtpEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

impl Harness {
    async fn connected_with(volume: Option<Arc<dyn StorageVolume>>) -> Self {
        let root = TempDir::new().unwrap();
        let volume = volume
            .unwrap_or_else(|| -> Arc<dyn StorageVolume> { Arc::new(LocalVolume::new(root.path(), 0)) });
        let (worker, handle, events) = start_session(root.path(), volume).await;

        Self {
            root,
            worker,
            handle,
            events,
        }
    }

    async fn connected() -> Self {
        Self::connected_with(None).await
    }

    async fn set_path(&self, name: Option<&str>, backup: bool, create: bool) -> ResponseCode {
        let headers = match name {
            Some(n) => HeaderSet::new().with_name(n),
            None => HeaderSet::new(),
        };
        self.handle
            .submit(Request::SetPath {
                headers,
                backup,
                create,
            })
            .await
            .unwrap()
            .code
    }

    async fn put(&self, name: &str, body: &[u8]) -> ResponseCode {
        let op = MemoryOperation::new(
            HeaderSet::new()
                .with_name(name)
                .with_length(body.len() as u32),
        )
        .with_body(body);
        self.handle
            .submit(Request::Put(Box::new(op)))
            .await
            .unwrap()
            .code
    }

    async fn listing(&self) -> (ResponseCode, String) {
        let op = MemoryOperation::new(HeaderSet::new().with_type(FOLDER_LISTING_TYPE));
        let recorder = op.recorder();
        let code = self
            .handle
            .submit(Request::Get(Box::new(op)))
            .await
            .unwrap()
            .code;
        (code, String::from_utf8(recorder.output()).unwrap())
    }

    async fn shutdown(self) -> Vec<FtpEvent> {
        let Harness {
            root: _root,
            worker,
            handle,
            mut events,
        } = self;
        drop(handle);
        worker.join().await.unwrap();
        drain(&mut events)
    }
}

fn tree_snapshot(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Reserved Name Tests
// =============================================================================

#[tokio::test]
async fn test_dot_names_rejected_without_mutation() {
    let h = Harness::connected().await;
    fs::write(h.root.path().join("keep.txt"), "x").unwrap();
    let before = tree_snapshot(h.root.path());

    for name in [".", ".."] {
        assert_eq!(
            h.set_path(Some(name), false, true).await,
            ResponseCode::NotAcceptable
        );

        let reply = h
            .handle
            .submit(Request::Delete(HeaderSet::new().with_name(name)))
            .await
            .unwrap();
        assert_eq!(reply.code, ResponseCode::Unauthorized);

        assert_eq!(h.put(name, b"data").await, ResponseCode::NotAcceptable);

        let op = MemoryOperation::new(HeaderSet::new().with_name(name));
        let reply = h.handle.submit(Request::Get(Box::new(op))).await.unwrap();
        assert_eq!(reply.code, ResponseCode::NotAcceptable);

        let reply = h
            .handle
            .submit(Request::Rename(
                HeaderSet::new().with_name("keep.txt").with_dest_name(name),
            ))
            .await
            .unwrap();
        assert_eq!(reply.code, ResponseCode::NotAcceptable);
    }

    assert_eq!(tree_snapshot(h.root.path()), before);
    assert_eq!(h.shutdown().await, vec![FtpEvent::ServerSessionClosed]);
}

// =============================================================================
// Transfer Tests
// =============================================================================

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let h = Harness::connected().await;
    let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

    assert_eq!(h.put("data.bin", &body).await, ResponseCode::Ok);

    let op = MemoryOperation::new(HeaderSet::new().with_name("data.bin")).with_max_packet_size(512);
    let recorder = op.recorder();
    let reply = h.handle.submit(Request::Get(Box::new(op))).await.unwrap();

    assert_eq!(reply.code, ResponseCode::Ok);
    assert_eq!(recorder.output(), body);
    assert!(recorder.write_sizes().iter().all(|&n| n <= 512));
    let announced = recorder.sent_headers();
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].length().unwrap(), Some(body.len() as u64));
    h.shutdown().await;
}

#[tokio::test]
async fn test_space_enforced_before_writing() {
    let volume: Arc<dyn StorageVolume> = Arc::new(LimitedVolume(64));
    let h = Harness::connected_with(Some(volume)).await;

    assert_eq!(h.put("big.bin", &[0u8; 65]).await, ResponseCode::EntityTooLarge);
    assert!(!h.root.path().join("big.bin").exists());

    assert_eq!(h.put("fits.bin", &[0u8; 64]).await, ResponseCode::Ok);
    assert!(h.root.path().join("fits.bin").exists());
    h.shutdown().await;
}

#[tokio::test]
async fn test_abort_stops_upload_and_does_not_leak() {
    let h = Harness::connected().await;

    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (resume_tx, resume_rx) = std::sync::mpsc::channel::<()>();
    let mut started_tx = Some(started_tx);
    let op = MemoryOperation::new(HeaderSet::new().with_name("movie.mp4").with_length(4096))
        .with_max_packet_size(256)
        .with_body(&[9u8; 4096])
        .on_read(move |index| {
            if index == 4 {
                if let Some(tx) = started_tx.take() {
                    let _ = tx.send(());
                }
                let _ = resume_rx.recv();
            }
        });
    let submitter = h.handle.clone();
    let pending = tokio::spawn(async move { submitter.submit(Request::Put(Box::new(op))).await });

    started_rx.await.unwrap();
    assert!(h.handle.abort());
    resume_tx.send(()).unwrap();

    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.code, ResponseCode::Ok);
    assert!(!h.root.path().join("movie.mp4").exists());

    // A later transfer runs to completion
    assert_eq!(h.put("after.txt", b"complete").await, ResponseCode::Ok);
    assert_eq!(
        fs::read(h.root.path().join("after.txt")).unwrap(),
        b"complete"
    );

    let after = h.root.path().join("after.txt");
    let events = h.shutdown().await;
    assert_eq!(
        events,
        vec![
            FtpEvent::FileReceived { path: after },
            FtpEvent::ServerSessionClosed,
        ]
    );
}

// =============================================================================
// Navigation Tests
// =============================================================================

#[tokio::test]
async fn test_backup_at_root_is_idempotent() {
    let h = Harness::connected().await;
    fs::write(h.root.path().join("top.txt"), "x").unwrap();

    for _ in 0..3 {
        assert_eq!(h.set_path(None, true, false).await, ResponseCode::Ok);
    }

    let (code, doc) = h.listing().await;
    assert_eq!(code, ResponseCode::Ok);
    assert!(doc.contains("<file name=\"top.txt\""));
    h.shutdown().await;
}

#[tokio::test]
async fn test_photos_scenario() {
    let h = Harness::connected().await;

    assert_eq!(h.set_path(Some("photos"), false, true).await, ResponseCode::Ok);
    assert!(h.root.path().join("photos").is_dir());

    assert_eq!(h.put("a.jpg", &[0xFF; 100]).await, ResponseCode::Ok);
    let stored = h.root.path().join("photos/a.jpg");
    assert_eq!(fs::metadata(&stored).unwrap().len(), 100);

    let (code, doc) = h.listing().await;
    assert_eq!(code, ResponseCode::Ok);
    assert!(doc.starts_with("<?xml version=\"1.0\"?>\r\n"));
    assert_eq!(doc.matches("<file ").count(), 1);
    assert_eq!(doc.matches("<folder ").count(), 0);
    assert!(doc.contains("<file name=\"a.jpg\" size=\"100\""));

    assert_eq!(
        h.shutdown().await,
        vec![
            FtpEvent::FileReceived { path: stored },
            FtpEvent::ServerSessionClosed,
        ]
    );
}

// =============================================================================
// Notification Tests
// =============================================================================

#[tokio::test]
async fn test_rename_folder_notifications() {
    let h = Harness::connected().await;
    let old = h.root.path().join("trip");
    fs::create_dir(&old).unwrap();
    for name in ["a.jpg", "b.png", "c.mp4"] {
        fs::write(old.join(name), "x").unwrap();
    }

    let reply = h
        .handle
        .submit(Request::Rename(
            HeaderSet::new().with_name("trip").with_dest_name("holiday"),
        ))
        .await
        .unwrap();
    assert_eq!(reply.code, ResponseCode::Ok);

    let new = h.root.path().join("holiday");
    let events = h.shutdown().await;
    assert_eq!(events.len(), 3);
    match (&events[0], &events[1]) {
        (FtpEvent::FilesDeleted { files: gone }, FtpEvent::FilesReceived { files: added }) => {
            let gone: Vec<_> = gone.iter().map(|f| f.path.clone()).collect();
            let added: Vec<_> = added.iter().map(|f| f.path.clone()).collect();
            assert_eq!(
                gone,
                vec![old.join("a.jpg"), old.join("b.png"), old.join("c.mp4")]
            );
            assert_eq!(
                added,
                vec![new.join("a.jpg"), new.join("b.png"), new.join("c.mp4")]
            );
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert_eq!(events[2], FtpEvent::ServerSessionClosed);
}

#[tokio::test]
async fn test_disconnect_then_requests_are_refused() {
    let h = Harness::connected().await;

    let reply = h
        .handle
        .submit(Request::Disconnect(HeaderSet::new()))
        .await
        .unwrap();
    assert_eq!(reply.code, ResponseCode::Ok);
    assert_eq!(h.put("late.txt", b"x").await, ResponseCode::BadRequest);
    assert!(!h.root.path().join("late.txt").exists());

    assert_eq!(
        h.shutdown().await,
        vec![FtpEvent::SessionDisconnected, FtpEvent::ServerSessionClosed]
    );
}

// =============================================================================
// Shared Root Tests
// =============================================================================

#[tokio::test]
async fn test_rename_of_folder_during_upload() {
    // Sessions serialize only their own requests. A second client may move
    // the folder an upload is writing into; the open file moves with it and
    // the upload still completes, but its notification names the old path.
    let h = Harness::connected().await;
    assert_eq!(h.set_path(Some("inbox"), false, true).await, ResponseCode::Ok);
    let volume: Arc<dyn StorageVolume> = Arc::new(LocalVolume::new(h.root.path(), 0));
    let (other_worker, other, mut other_events) = start_session(h.root.path(), volume).await;

    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (resume_tx, resume_rx) = std::sync::mpsc::channel::<()>();
    let mut started_tx = Some(started_tx);
    let body = [7u8; 1024];
    let op = MemoryOperation::new(HeaderSet::new().with_name("clip.mp4").with_length(1024))
        .with_max_packet_size(128)
        .with_body(&body)
        .on_read(move |index| {
            if index == 2 {
                if let Some(tx) = started_tx.take() {
                    let _ = tx.send(());
                }
                let _ = resume_rx.recv();
            }
        });
    let submitter = h.handle.clone();
    let pending = tokio::spawn(async move { submitter.submit(Request::Put(Box::new(op))).await });

    started_rx.await.unwrap();
    let reply = other
        .submit(Request::Rename(
            HeaderSet::new().with_name("inbox").with_dest_name("archive"),
        ))
        .await
        .unwrap();
    assert_eq!(reply.code, ResponseCode::Ok);
    resume_tx.send(()).unwrap();

    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.code, ResponseCode::Ok);

    let old = h.root.path().join("inbox/clip.mp4");
    let moved = h.root.path().join("archive/clip.mp4");
    assert!(!old.exists());
    assert_eq!(fs::read(&moved).unwrap(), body);

    // The renaming session saw the partial file move
    let renamed = drain(&mut other_events);
    assert!(matches!(
        renamed.as_slice(),
        [FtpEvent::FilesDeleted { files: gone }, FtpEvent::FilesReceived { files: added }]
            if gone.iter().any(|f| f.path == old) && added.iter().any(|f| f.path == moved)
    ));
    drop(other);
    other_worker.join().await.unwrap();

    // The uploading session reports where the file was when it started
    assert_eq!(
        h.shutdown().await,
        vec![
            FtpEvent::FileReceived { path: old },
            FtpEvent::ServerSessionClosed,
        ]
    );
}
