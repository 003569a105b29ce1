//! Session engine tests against a scripted in-process server.

#![allow(clippy::unwrap_used)]

use mailwren_smtp::{Address, Command, Error, Security, SmtpClient};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// Server side of one scripted connection.
struct ServerConn<S = TcpStream> {
    stream: S,
    buf: Vec<u8>,
}

impl<S> ServerConn<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    async fn read_line(&mut self) -> String {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line: Vec<u8> = self.buf.drain(..pos + 2).collect();
                return String::from_utf8(line[..line.len() - 2].to_vec()).unwrap();
            }
            let mut chunk = [0u8; 1024];
            let read = self.stream.read(&mut chunk).await.unwrap();
            assert!(read > 0, "client closed mid-line");
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    async fn write(&mut self, data: &str) {
        self.stream.write_all(data.as_bytes()).await.unwrap();
    }

    /// Reads one EHLO and replies: the greeting line first, then each
    /// capability as a continuation line, closed by a final `250` line.
    async fn accept_ehlo(&mut self, capabilities: &[&str]) {
        let ehlo = self.read_line().await;
        assert!(ehlo.starts_with("EHLO "), "expected EHLO, got {ehlo:?}");
        self.write("250-mail.test.invalid\r\n").await;
        for capability in capabilities {
            self.write(&format!("250-{capability}\r\n")).await;
        }
        self.write("250 HELP\r\n").await;
    }

    /// Plays the banner and a plain EHLO exchange with the given
    /// capability lines.
    async fn accept_handshake(&mut self, capabilities: &[&str]) {
        self.write("220 mail.test.invalid ESMTP\r\n").await;
        self.accept_ehlo(capabilities).await;
    }
}

impl ServerConn<TcpStream> {
    /// Asserts the client has nothing further in flight: no bytes
    /// parsed but unconsumed, and none waiting in the socket.
    async fn assert_quiet(&mut self) {
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(self.buf.is_empty(), "client pipelined a second command");
        match self.stream.try_read(&mut [0u8; 64]) {
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            other => panic!("client pipelined a second command: {other:?}"),
        }
    }

    /// Runs the server side of the TLS handshake, consuming the plain
    /// connection. Must only be called once the STARTTLS exchange is
    /// complete and nothing else has been written.
    async fn accept_starttls(
        self,
        acceptor: &TlsAcceptor,
    ) -> ServerConn<tokio_rustls::server::TlsStream<TcpStream>> {
        assert!(self.buf.is_empty(), "client wrote before the TLS handshake");
        let stream = acceptor.accept(self.stream).await.unwrap();
        ServerConn {
            stream,
            buf: Vec::new(),
        }
    }
}

/// Binds a listener and runs `script` on the first connection.
async fn scripted_server<F, Fut>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(ServerConn) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    static TRACING: std::sync::Once = std::sync::Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(ServerConn {
            stream,
            buf: Vec::new(),
        })
        .await;
    });
    (addr, handle)
}

async fn connect_insecure(addr: SocketAddr) -> mailwren_smtp::Result<SmtpClient> {
    SmtpClient::connect("127.0.0.1", addr.port(), Security::Insecure).await
}

#[tokio::test]
async fn handshake_parses_capabilities() {
    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&["STARTTLS", "SIZE 52428800", "8BITMIME"])
            .await;
        let quit = conn.read_line().await;
        assert_eq!(quit, "QUIT");
        conn.write("221 bye\r\n").await;
    })
    .await;

    let client = connect_insecure(addr).await.unwrap();
    assert!(client.handshake().supports_starttls());
    assert_eq!(client.handshake().max_message_size(), Some(52_428_800));
    client.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_banner_fails_connect() {
    let (addr, _server) = scripted_server(|mut conn| async move {
        conn.write("554 not today\r\n").await;
    })
    .await;

    let err = connect_insecure(addr).await.unwrap_err();
    assert!(matches!(err, Error::InvalidHandshake(_)), "{err:?}");
}

#[tokio::test]
async fn rejected_ehlo_fails_connect() {
    let (addr, _server) = scripted_server(|mut conn| async move {
        conn.write("220 mail.test.invalid ESMTP\r\n").await;
        let _ehlo = conn.read_line().await;
        conn.write("502 no extended hello here\r\n").await;
    })
    .await;

    let err = connect_insecure(addr).await.unwrap_err();
    assert!(matches!(err, Error::InvalidHandshake(_)), "{err:?}");
}

#[tokio::test]
async fn opportunistic_mode_stays_plaintext_without_starttls() {
    // The server does not advertise STARTTLS, so opportunistic mode
    // must complete with exactly one EHLO and never send STARTTLS.
    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&["SIZE 1000"]).await;
        let next = conn.read_line().await;
        assert_eq!(next, "NOOP", "expected NOOP after single EHLO");
        conn.write("250 OK\r\n").await;
        let quit = conn.read_line().await;
        assert_eq!(quit, "QUIT");
        conn.write("221 bye\r\n").await;
    })
    .await;

    let client = SmtpClient::connect(
        "127.0.0.1",
        addr.port(),
        Security::StartTls(mailwren_smtp::TlsParameters::DefaultRoots),
    )
    .await
    .unwrap();
    assert!(!client.handshake().supports_starttls());
    client.noop().await.unwrap();
    client.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn starttls_upgrades_and_refreshes_the_snapshot() {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = certified.cert.der().clone();
    let key_der =
        rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der.into())
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    // The script enforces the sequencing on the wire: one EHLO, one
    // STARTTLS, the TLS handshake, then exactly one more EHLO before
    // any ordinary command.
    let (addr, server) = scripted_server(move |mut conn| async move {
        conn.accept_handshake(&["STARTTLS", "SIZE 1000"]).await;
        assert_eq!(conn.read_line().await, "STARTTLS");
        conn.write("220 ready to start TLS\r\n").await;

        let mut conn = conn.accept_starttls(&acceptor).await;
        conn.accept_ehlo(&["SIZE 5000"]).await;
        assert_eq!(conn.read_line().await, "NOOP");
        conn.write("250 OK\r\n").await;
        assert_eq!(conn.read_line().await, "QUIT");
        conn.write("221 bye\r\n").await;
    })
    .await;

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let client = SmtpClient::connect(
        "localhost",
        addr.port(),
        Security::StartTls(mailwren_smtp::TlsParameters::Custom(Arc::new(config))),
    )
    .await
    .unwrap();

    // The snapshot visible after connect is the post-upgrade one.
    assert!(!client.handshake().supports_starttls());
    assert_eq!(client.handshake().max_message_size(), Some(5000));
    client.noop().await.unwrap();
    client.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn replies_correlate_to_submission_order() {
    const SENDERS: usize = 8;

    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&[]).await;
        for _ in 0..SENDERS {
            let line = conn.read_line().await;
            let address = line
                .strip_prefix("MAIL FROM:<")
                .and_then(|rest| rest.strip_suffix('>'))
                .unwrap_or_else(|| panic!("unexpected command {line:?}"));
            conn.write(&format!("250 accepted {address}\r\n")).await;
        }
    })
    .await;

    let client = Arc::new(connect_insecure(addr).await.unwrap());
    let mut tasks = Vec::new();
    for i in 0..SENDERS {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let address = format!("sender{i}@example.com");
            let response = client
                .send(Command::MailFrom {
                    from: Address::new(address.clone()).unwrap(),
                    size: None,
                })
                .await
                .unwrap();
            // Each caller gets the reply to its own command.
            assert_eq!(response.lines, vec![format!("accepted {address}")]);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    server.await.unwrap();
}

#[tokio::test]
async fn no_second_command_before_the_reply() {
    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&[]).await;
        for _ in 0..3 {
            let line = conn.read_line().await;
            assert_eq!(line, "NOOP");
            conn.assert_quiet().await;
            conn.write("250 OK\r\n").await;
        }
    })
    .await;

    let client = Arc::new(connect_insecure(addr).await.unwrap());
    let mut tasks = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move { client.noop().await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    server.await.unwrap();
}

#[tokio::test]
async fn disconnect_fails_every_pending_request() {
    let (addr, _server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&[]).await;
        // Accept nothing more; drop the connection.
    })
    .await;

    let client = Arc::new(connect_insecure(addr).await.unwrap());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move { client.noop().await }));
    }
    for task in tasks {
        let result = task.await.unwrap();
        assert!(result.is_err(), "waiter survived the disconnect");
    }

    // A closed session accepts no further commands.
    let err = client.noop().await.unwrap_err();
    assert!(matches!(err, Error::Disconnected), "{err:?}");
}

#[tokio::test]
async fn close_is_idempotent() {
    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&[]).await;
    })
    .await;

    let client = connect_insecure(addr).await.unwrap();
    client.close().await;
    client.close().await;
    assert!(client.is_closed());
    server.await.unwrap();
}

#[tokio::test]
async fn send_mail_runs_the_full_transaction() {
    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&["SIZE 1000000"]).await;

        let mail_from = conn.read_line().await;
        assert!(mail_from.starts_with("MAIL FROM:<sender@example.com>"));
        assert!(mail_from.contains("SIZE="), "SIZE announced when advertised");
        conn.write("250 sender ok\r\n").await;

        assert_eq!(conn.read_line().await, "RCPT TO:<one@example.com>");
        conn.write("250 rcpt ok\r\n").await;
        assert_eq!(conn.read_line().await, "RCPT TO:<two@example.com>");
        conn.write("250 rcpt ok\r\n").await;

        assert_eq!(conn.read_line().await, "DATA");
        conn.write("354 go ahead\r\n").await;

        let mut saw_stuffed_line = false;
        loop {
            let line = conn.read_line().await;
            if line == "." {
                break;
            }
            if line == "..leading dot" {
                saw_stuffed_line = true;
            }
        }
        assert!(saw_stuffed_line, "payload line was not dot-stuffed");
        conn.write("250 queued\r\n").await;

        assert_eq!(conn.read_line().await, "QUIT");
        conn.write("221 bye\r\n").await;
    })
    .await;

    let client = connect_insecure(addr).await.unwrap();
    let from = Address::new("sender@example.com").unwrap();
    let recipients = [
        Address::new("one@example.com").unwrap(),
        Address::new("two@example.com").unwrap(),
    ];
    let mail = mailwren_mime::Mail::builder()
        .from("sender@example.com")
        .to("one@example.com")
        .subject("Test")
        .text(".leading dot")
        .build()
        .unwrap();

    let response = client
        .send_mail(&from, &recipients, &mail.render())
        .await
        .unwrap();
    assert!(response.is_accepted());
    client.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_transaction_step_surfaces_the_reply() {
    let (addr, server) = scripted_server(|mut conn| async move {
        conn.accept_handshake(&[]).await;
        let _mail_from = conn.read_line().await;
        conn.write("550 mailbox unavailable\r\n").await;
        assert_eq!(conn.read_line().await, "QUIT");
        conn.write("221 bye\r\n").await;
    })
    .await;

    let client = connect_insecure(addr).await.unwrap();
    let from = Address::new("sender@example.com").unwrap();
    let to = [Address::new("rcpt@example.com").unwrap()];

    let err = client.send_mail(&from, &to, b"body").await.unwrap_err();
    assert!(err.is_permanent(), "{err:?}");
    client.quit().await.unwrap();
    server.await.unwrap();
}
