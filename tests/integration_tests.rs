use data_collection_uploader::{run, UploadError, UploaderConfig};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Integration tests driving the real HTTP sender against a loopback stub
/// that answers each connection with one scripted reply.

struct Stub {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl Stub {
    fn serve(replies: Vec<(u16, &'static str)>) -> Stub {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/upload?token=test", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().unwrap();
                let raw = read_request(&mut stream);
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&raw).into_owned());
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        Stub {
            url,
            requests,
            handle,
        }
    }

    fn finish(self) -> Vec<String> {
        self.handle.join().unwrap();
        Arc::try_unwrap(self.requests).unwrap().into_inner().unwrap()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            match length {
                Some(len) if buf.len() >= end + 4 + len => break,
                Some(_) => {}
                None if head.contains("transfer-encoding: chunked") => {
                    if buf.ends_with(b"0\r\n\r\n") {
                        break;
                    }
                }
                None => break,
            }
        }
    }
    buf
}

fn config_for(url: &str, dir: &Path) -> UploaderConfig {
    let mut config = UploaderConfig::new(url);
    config.directory = dir.to_path_buf();
    config.timeout = Duration::from_secs(10);
    config.connect_timeout = Duration::from_secs(5);
    config
}

fn write_archives(dir: &Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), format!("payload of {}", name)).unwrap();
    }
}

#[test]
fn uploads_every_archive_as_file_field() {
    let dir = tempfile::tempdir().unwrap();
    write_archives(dir.path(), &["a.tgz", "b.tgz"]);
    fs::write(dir.path().join("skip.log"), "not an archive").unwrap();

    let stub = Stub::serve(vec![
        (200, r#"{"ok":true,"path":"/files/test/first.tgz"}"#),
        (200, r#"{"ok":true,"path":"/files/test/second.tgz"}"#),
    ]);
    let config = config_for(&stub.url, dir.path());

    let mut out = Vec::new();
    let report = run(&config, &mut out).unwrap();
    let requests = stub.finish();

    assert!(report.is_complete());
    assert_eq!(report.attempts, 2);
    assert_eq!(report.uploaded.len(), 2);
    assert_eq!(requests.len(), 2);
    for name in ["a.tgz", "b.tgz"] {
        assert!(
            requests.iter().any(|r| r.contains(&format!("filename=\"{}\"", name))
                && r.contains(&format!("payload of {}", name))),
            "no request carried {}",
            name
        );
    }
    assert!(requests.iter().all(|r| r.starts_with("POST /upload?token=test ")
        && r.contains("name=\"file\"")
        && r.to_ascii_lowercase().contains("multipart/form-data")));

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.ends_with("Data Collection: Completed\n"));
    assert!(!printed.contains("skip.log"));
}

#[test]
fn server_error_aborts_after_first_file() {
    let dir = tempfile::tempdir().unwrap();
    write_archives(dir.path(), &["1.tgz", "2.tgz", "3.tgz"]);

    let stub = Stub::serve(vec![(500, r#"{"ok":false,"error":"disk full"}"#)]);
    let config = config_for(&stub.url, dir.path());

    let mut out = Vec::new();
    let report = run(&config, &mut out).unwrap();
    let requests = stub.finish();

    assert_eq!(requests.len(), 1);
    assert_eq!(report.attempts, 1);
    assert!(matches!(
        report.aborted,
        Some(UploadError::HttpStatus { status: 500, .. })
    ));
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains(": HTTP (500)"));
    assert!(!printed.contains("Completed"));
}

#[test]
fn bad_acknowledgement_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_archives(dir.path(), &["1.tgz", "2.tgz"]);

    let stub = Stub::serve(vec![
        (200, "<html>maintenance</html>"),
        (200, r#"{"ok":true,"path":"/files/test/ok.tgz"}"#),
    ]);
    let config = config_for(&stub.url, dir.path());

    let mut out = Vec::new();
    let report = run(&config, &mut out).unwrap();
    let requests = stub.finish();

    assert_eq!(requests.len(), 2);
    assert!(report.is_complete());
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(String::from_utf8(out).unwrap().contains("<html>maintenance</html>"));
}

#[test]
fn refused_connection_aborts_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_archives(dir.path(), &["1.tgz", "2.tgz"]);

    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = config_for(&format!("http://127.0.0.1:{}/upload", port), dir.path());

    let mut out = Vec::new();
    let report = run(&config, &mut out).unwrap();

    assert_eq!(report.attempts, 1);
    assert!(matches!(report.aborted, Some(UploadError::Transport { .. })));
    assert!(!String::from_utf8(out).unwrap().contains("Completed"));
}

#[test]
fn empty_directory_completes_without_network() {
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens here; any request would fail the run.
    let config = config_for("http://127.0.0.1:9/upload", dir.path());

    let mut out = Vec::new();
    let report = run(&config, &mut out).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.attempts, 0);
    assert_eq!(String::from_utf8(out).unwrap(), "Data Collection: Completed\n");
}

#[test]
fn hostname_target_goes_through_the_resolver() {
    let dir = tempfile::tempdir().unwrap();
    write_archives(dir.path(), &["named.tgz"]);

    let stub = Stub::serve(vec![(200, r#"{"ok":true,"path":"/files/test/named.tgz"}"#)]);
    // A name rather than an IP literal, so the lookup runs through the
    // shuffling resolver; the stub only listens on IPv4 loopback.
    let url = stub.url.replacen("127.0.0.1", "localhost", 1);
    let config = config_for(&url, dir.path());

    let mut out = Vec::new();
    let report = run(&config, &mut out).unwrap();
    let requests = stub.finish();

    assert!(report.is_complete());
    assert_eq!(report.attempts, 1);
    assert_eq!(requests.len(), 1);
    assert_eq!(report.uploaded[0].server_path, "/files/test/named.tgz");
    assert!(String::from_utf8(out).unwrap().ends_with("Data Collection: Completed\n"));
}
