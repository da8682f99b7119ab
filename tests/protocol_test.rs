//! Protocol exchange tests against a scripted in-process FTP server
//!
//! Each test spawns a fake server on a loopback listener that asserts the
//! exact command sequence the client emits and replies from a script,
//! including passive-mode data connections. Tests validate observable
//! behavior through the public API only.

use ftp_rs::{
    commands, ControlStream, Encoding, FtpClient, FtpError, FtpSession, ListingStrategy,
    SessionConfig, SortBy, SortOrder,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;

struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, payload: &str) {
        self.writer.write_all(payload.as_bytes()).await.unwrap();
    }

    async fn expect(&mut self, expected: &str) {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end_matches(['\r', '\n']);
        assert_eq!(line, expected, "unexpected command on the control channel");
    }
}

fn test_config(port: u16) -> SessionConfig {
    let mut config = SessionConfig::anonymous("127.0.0.1");
    config.port = port;
    config.timeout_secs = 5;
    config
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn epsv_reply(port: u16) -> String {
    format!("229 Entering Extended Passive Mode (|||{}|)\r\n", port)
}

/// Drive the full login sequence for an anonymous client
async fn handle_login(peer: &mut Peer, feat: &[&str], pwd_path: &str) {
    peer.send("220 Service ready\r\n").await;
    peer.expect("USER anonymous").await;
    peer.send("331 pass req\r\n").await;
    peer.expect("PASS ").await;
    peer.send("230 ok\r\n").await;
    peer.expect("FEAT").await;
    if feat.is_empty() {
        peer.send("500 not understood\r\n").await;
    } else {
        let mut reply = String::from("211-Features:\r\n");
        for f in feat {
            reply.push_str(&format!(" {}\r\n", f));
        }
        reply.push_str("211 end\r\n");
        peer.send(&reply).await;
    }
    if feat.contains(&"CLNT") {
        peer.expect("CLNT ftp-rs").await;
        peer.send("200 ok\r\n").await;
    }
    if feat.contains(&"UTF8") {
        peer.expect("OPTS UTF8 ON").await;
        peer.send("200 ok\r\n").await;
    }
    peer.expect("TYPE I").await;
    peer.send("200 ok\r\n").await;
    peer.expect("CWD /").await;
    peer.send("250 ok\r\n").await;
    peer.expect("PWD").await;
    peer.send(&format!("257 \"{}\" is current directory\r\n", pwd_path))
        .await;
}

#[tokio::test]
async fn test_anonymous_login_negotiates_utf8_and_mlsd() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &["UTF8", "MLSD"], "/").await;
        peer.expect("QUIT").await;
        peer.send("221 bye\r\n").await;
    });

    let mut session = FtpSession::new(test_config(port));
    session.login().await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(session.listing_strategy(), ListingStrategy::Mlsd);
    assert_eq!(session.control().encoding(), Encoding::Utf8);
    assert_eq!(session.working_directory(), "/");

    session.logout().await;
    assert!(!session.is_authenticated());
    server.await.unwrap();
}

#[tokio::test]
async fn test_login_while_connected_logs_out_first() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;
        peer.expect("QUIT").await;
        peer.send("221 bye\r\n").await;

        // The client reconnects from scratch
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;
    });

    let mut session = FtpSession::new(test_config(port));
    session.login().await.unwrap();
    session.login().await.unwrap();
    assert!(session.is_authenticated());
    server.await.unwrap();
}

#[tokio::test]
async fn test_working_directory_tracks_pwd_reply() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/var/ftp").await;
    });

    let mut session = FtpSession::new(test_config(port));
    session.login().await.unwrap();
    // The cache comes from the quoted 257 path, not from what was requested
    assert_eq!(session.working_directory(), "/var/ftp");
    assert_eq!(session.listing_strategy(), ListingStrategy::List);
    server.await.unwrap();
}

#[tokio::test]
async fn test_login_failure_closes_session() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.send("220 Service ready\r\n").await;
        peer.expect("USER anonymous").await;
        peer.send("331 pass req\r\n").await;
        peer.expect("PASS ").await;
        peer.send("530 login incorrect\r\n").await;
        // The client bails out and drops the connection
        let mut line = String::new();
        let n = peer.reader.read_line(&mut line).await.unwrap_or(0);
        assert_eq!(n, 0, "expected the client to disconnect");
    });

    let mut session = FtpSession::new(test_config(port));
    let err = session.login().await.unwrap_err();
    assert!(matches!(err, FtpError::Protocol { code: 530, .. }));
    assert!(!session.is_authenticated());
    server.await.unwrap();
}

#[tokio::test]
async fn test_unexpected_greeting_fails_connect() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.send("500 go away\r\n").await;
    });

    let mut session = FtpSession::new(test_config(port));
    let err = session.login().await.unwrap_err();
    assert!(matches!(err, FtpError::Protocol { code: 500, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_epsv_refusal_falls_back_to_pasv() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;

        let (data_listener, data_port) = bind().await;
        peer.expect("EPSV").await;
        peer.send("500 not understood\r\n").await;
        peer.expect("PASV").await;
        peer.send(&format!(
            "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
            data_port / 256,
            data_port % 256
        ))
        .await;
        peer.expect("NLST").await;
        peer.send("150 opening\r\n").await;
        let (mut data, _) = data_listener.accept().await.unwrap();
        data.write_all(b"alpha.txt\r\nbeta.txt\r\n").await.unwrap();
        drop(data);
        peer.send("226 done\r\n").await;
    });

    let mut session = FtpSession::new(test_config(port));
    session.login().await.unwrap();
    let names = session.name_list().await.unwrap();
    assert_eq!(names, ["alpha.txt", "beta.txt"]);
    server.await.unwrap();
}

#[tokio::test]
async fn test_both_passive_modes_refused_is_no_data_port() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;
        peer.expect("EPSV").await;
        peer.send("500 no\r\n").await;
        peer.expect("PASV").await;
        peer.send("500 also no\r\n").await;
    });

    let mut session = FtpSession::new(test_config(port));
    session.login().await.unwrap();
    let err = session.name_list().await.unwrap_err();
    assert!(matches!(err, FtpError::NoDataPort(_)));
    // Failing both passive modes closes the session
    assert!(!session.is_authenticated());
    server.await.unwrap();
}

#[tokio::test]
async fn test_mlsd_listing_filter_and_sort() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &["MLSD"], "/").await;

        let (data_listener, data_port) = bind().await;
        peer.expect("EPSV").await;
        peer.send(&epsv_reply(data_port)).await;
        peer.expect("MLSD").await;
        peer.send("150 listing\r\n").await;
        let (mut data, _) = data_listener.accept().await.unwrap();
        data.write_all(
            b"type=dir;modify=20240101000000; pub\r\n\
              type=file;size=42;modify=20240102000000; beta.txt\r\n\
              type=file;size=7;modify=20240103000000; alpha.txt\r\n",
        )
        .await
        .unwrap();
        drop(data);
        peer.send("226 done\r\n").await;
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    assert_eq!(client.listing_strategy(), ListingStrategy::Mlsd);

    let files = client
        .list_files(Some((SortBy::Name, SortOrder::Ascending)))
        .await
        .unwrap();
    let names: Vec<_> = files.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["alpha.txt", "beta.txt"]);
    assert_eq!(files[0].size, 7);
    server.await.unwrap();
}

#[tokio::test]
async fn test_recursive_mkdir_walks_segments() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;

        peer.expect("CWD /").await;
        peer.send("250 ok\r\n").await;
        for segment in ["a", "b", "c"] {
            peer.expect(&format!("CWD {}", segment)).await;
            peer.send("550 missing\r\n").await;
            peer.expect(&format!("MKD {}", segment)).await;
            peer.send(&format!("257 \"{}\" created\r\n", segment)).await;
            peer.expect(&format!("CWD {}", segment)).await;
            peer.send("250 ok\r\n").await;
        }
        // Restore the original working directory
        peer.expect("CWD /").await;
        peer.send("250 ok\r\n").await;
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    client.make_directory_recursive("/a/b/c").await.unwrap();
    assert_eq!(client.working_directory(), "/");
    server.await.unwrap();
}

#[tokio::test]
async fn test_delete_non_empty_directory_recurses() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &["MLSD"], "/").await;
        let (data_listener, data_port) = bind().await;

        peer.expect("RMD foo").await;
        peer.send("550 not empty\r\n").await;
        peer.expect("CWD foo").await;
        peer.send("250 ok\r\n").await;

        peer.expect("EPSV").await;
        peer.send(&epsv_reply(data_port)).await;
        peer.expect("MLSD").await;
        peer.send("150 listing\r\n").await;
        let (mut data, _) = data_listener.accept().await.unwrap();
        data.write_all(
            b"type=cdir; .\r\ntype=pdir; ..\r\ntype=file;size=1; x\r\ntype=dir; y\r\n",
        )
        .await
        .unwrap();
        drop(data);
        peer.send("226 done\r\n").await;

        peer.expect("DELE x").await;
        peer.send("250 ok\r\n").await;

        // Subdirectory y: RMD is refused, recurse into an empty listing
        peer.expect("RMD y").await;
        peer.send("550 not empty\r\n").await;
        peer.expect("CWD y").await;
        peer.send("250 ok\r\n").await;
        peer.expect("EPSV").await;
        peer.send(&epsv_reply(data_port)).await;
        peer.expect("MLSD").await;
        peer.send("150 listing\r\n").await;
        let (data, _) = data_listener.accept().await.unwrap();
        drop(data);
        peer.send("226 done\r\n").await;
        peer.expect("CWD ..").await;
        peer.send("250 ok\r\n").await;
        peer.expect("RMD y").await;
        peer.send("250 ok\r\n").await;

        peer.expect("CWD ..").await;
        peer.send("250 ok\r\n").await;
        peer.expect("RMD foo").await;
        peer.send("250 ok\r\n").await;
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    client.delete_directory("foo").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_rename_requires_350_then_250() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;
        peer.expect("RNFR old.txt").await;
        peer.send("350 ready for RNTO\r\n").await;
        peer.expect("RNTO new.txt").await;
        peer.send("250 renamed\r\n").await;

        // A refused RNFR surfaces as a protocol error
        peer.expect("RNFR gone.txt").await;
        peer.send("550 no such file\r\n").await;
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    client.rename("old.txt", "new.txt").await.unwrap();

    let err = client.rename("gone.txt", "other.txt").await.unwrap_err();
    assert!(matches!(err, FtpError::Protocol { code: 550, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_size_parses_213() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;
        peer.expect("SIZE big.bin").await;
        peer.send("213 1048576\r\n").await;
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    assert_eq!(client.size("big.bin").await.unwrap(), 1_048_576);
    server.await.unwrap();
}

#[tokio::test]
async fn test_download_reads_payload_and_terminal_reply() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;

        let (data_listener, data_port) = bind().await;
        peer.expect("EPSV").await;
        peer.send(&epsv_reply(data_port)).await;
        peer.expect("RETR hello.txt").await;
        peer.send("150 sending\r\n").await;
        let (mut data, _) = data_listener.accept().await.unwrap();
        data.write_all(b"hello world").await.unwrap();
        drop(data);
        peer.send("226 done\r\n").await;

        // The terminal reply was consumed: the next command pairs cleanly
        peer.expect("NOOP").await;
        peer.send("200 ok\r\n").await;
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    let payload = client.download("hello.txt").await.unwrap();
    assert_eq!(payload, b"hello world");
    client.noop().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_upload_streams_payload() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        handle_login(&mut peer, &[], "/").await;

        let (data_listener, data_port) = bind().await;
        peer.expect("EPSV").await;
        peer.send(&epsv_reply(data_port)).await;
        peer.expect("STOR /report.csv").await;
        peer.send("150 ready\r\n").await;
        let (mut data, _) = data_listener.accept().await.unwrap();
        let mut received = Vec::new();
        data.read_to_end(&mut received).await.unwrap();
        drop(data);
        peer.send("226 stored\r\n").await;
        received
    });

    let mut client = FtpClient::new(test_config(port));
    client.login().await.unwrap();
    client.upload("report.csv", b"a,b,c\n1,2,3\n").await.unwrap();
    let received = server.await.unwrap();
    assert_eq!(received, b"a,b,c\n1,2,3\n");
}

#[tokio::test]
async fn test_commands_never_overlap_on_the_wire() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.send("220 ready\r\n").await;
        for i in 0..5 {
            let mut line = String::new();
            peer.reader.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "NOOP");
            // Nothing else may arrive until this command is answered
            let overlap = timeout(Duration::from_millis(50), peer.reader.fill_buf()).await;
            assert!(overlap.is_err(), "a second command overlapped on the wire");
            peer.send(&format!("200 ok {}\r\n", i)).await;
        }
    });

    let control = Arc::new(ControlStream::new(Arc::new(test_config(port))));
    control.connect().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let control = control.clone();
        tasks.push(tokio::spawn(async move {
            control.send_and_read(&commands::noop()).await
        }));
    }
    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply.code, 200);
    }
    server.await.unwrap();
    control.disconnect().await;
}

#[tokio::test]
async fn test_cancelled_round_trip_disconnects() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.send("220 ready\r\n").await;
        // Read the command but never answer it
        let mut line = String::new();
        peer.reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim_end(), "NOOP");
        // Hold the connection open until the client gives up
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let control = Arc::new(ControlStream::new(Arc::new(test_config(port))));
    control.connect().await.unwrap();

    // The caller abandons the round trip while the reply is outstanding;
    // the command is on the wire but its reply was never read
    let result = timeout(
        Duration::from_millis(100),
        control.send_and_read(&commands::noop()),
    )
    .await;
    assert!(result.is_err(), "the server never answered");

    // Partial protocol state must not leave the socket reusable
    assert!(!control.is_open());
    let err = control.send_and_read(&commands::noop()).await.unwrap_err();
    assert!(matches!(err, FtpError::ConnectionClosed));
    server.await.unwrap();
}

#[tokio::test]
async fn test_stale_reply_drained_before_next_command() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.send("220 ready\r\n").await;
        // An unsolicited reply lands before the client's next command
        peer.send("226 leftover transfer reply\r\n").await;
        let mut line = String::new();
        peer.reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim_end(), "NOOP");
        peer.send("200 ok\r\n").await;
    });

    let control = Arc::new(ControlStream::new(Arc::new(test_config(port))));
    control.connect().await.unwrap();
    // Give the unsolicited bytes time to arrive
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reply = control.send_and_read(&commands::noop()).await.unwrap();
    assert_eq!(reply.code, 200);
    server.await.unwrap();
    control.disconnect().await;
}
