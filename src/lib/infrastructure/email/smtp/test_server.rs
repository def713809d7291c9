//! A scripted single-connection SMTP server for driving [`Sender`](super::Sender)
//! in tests.

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use native_tls::{Identity, TlsAcceptor};

const CERTIFICATE: &[u8] = include_bytes!("fixtures/localhost.crt");
const PRIVATE_KEY: &[u8] = include_bytes!("fixtures/localhost.key");

/// What happens after the client sends STARTTLS
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StartTls {
    /// Answer 454
    Refuse,
    /// Answer 220 and complete the handshake with the fixture certificate
    Accept,
    /// Answer 220, then send plaintext and hang up
    Garbage,
    /// Answer 220, then never answer the handshake
    Stall,
}

/// How the server answers
#[derive(Clone, Debug, Default)]
pub(crate) struct Script {
    /// Advertise STARTTLS and handle it this way
    pub(crate) starttls: Option<StartTls>,
    pub(crate) reject_auth: bool,
    pub(crate) reject_sender: bool,
    /// Recipients answered with 550
    pub(crate) reject_recipients: Vec<&'static str>,
    pub(crate) reject_data: bool,
    /// Close the connection after the end-of-data line without replying
    pub(crate) hang_up_after_data: bool,
    /// Accept the connection but never send a greeting
    pub(crate) silent: bool,
}

/// What the client sent
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    /// Command lines without their CRLF, in order
    pub(crate) commands: Vec<String>,
    /// The message data with dot-stuffing undone
    pub(crate) data: Option<String>,
    /// The session continued over TLS
    pub(crate) secured: bool,
    /// The client closed the connection while a handshake was pending
    pub(crate) hung_up: bool,
}

pub(crate) struct TestServer {
    address: SocketAddr,
    handle: JoinHandle<Transcript>,
}

impl TestServer {
    pub(crate) fn start(script: Script) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;

        let handle = thread::spawn(move || {
            let mut transcript = Transcript::default();

            if let Ok((stream, _)) = listener.accept() {
                // the client may hang up at any point, the transcript so far is what counts
                let _ = serve(stream, &script, &mut transcript);
            }

            transcript
        });

        Ok(Self { address, handle })
    }

    pub(crate) fn address(&self) -> String {
        self.address.to_string()
    }

    /// Wait for the client to disconnect and return what it sent.
    pub(crate) fn finish(self) -> Transcript {
        self.handle.join().expect("test server panicked")
    }
}

enum Outcome<S> {
    Closed,
    StartTls(S),
}

fn serve(stream: TcpStream, script: &Script, transcript: &mut Transcript) -> io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;

    if script.silent {
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line)?;
        return Ok(());
    }

    let mut stream = match converse(stream, script, transcript, false)? {
        Outcome::Closed => return Ok(()),
        Outcome::StartTls(stream) => stream,
    };

    match script.starttls {
        Some(StartTls::Accept) => {
            let stream = acceptor()?.accept(stream).map_err(other)?;
            transcript.secured = true;
            converse(stream, script, transcript, true)?;
        }
        Some(StartTls::Garbage) => {
            stream.write_all(b"this is not a TLS record\r\n")?;
        }
        Some(StartTls::Stall) => {
            let mut buffer = [0u8; 1024];
            while stream.read(&mut buffer)? > 0 {}
            transcript.hung_up = true;
        }
        Some(StartTls::Refuse) | None => {}
    }

    Ok(())
}

fn converse<S: Read + Write>(
    stream: S,
    script: &Script,
    transcript: &mut Transcript,
    secure: bool,
) -> io::Result<Outcome<S>> {
    let mut reader = BufReader::new(stream);

    if !secure {
        reader.get_mut().write_all(b"220 localhost ESMTP test\r\n")?;
    }

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(Outcome::Closed);
        }

        let command = line.trim_end().to_string();
        let verb = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        transcript.commands.push(command.clone());

        let reply = match verb.as_str() {
            "EHLO" if script.starttls.is_some() && !secure => {
                "250-localhost\r\n250-STARTTLS\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n"
            }
            "EHLO" => "250-localhost\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n",
            "STARTTLS" if script.starttls == Some(StartTls::Refuse) => {
                "454 4.7.0 TLS not available\r\n"
            }
            "STARTTLS" => {
                reader
                    .get_mut()
                    .write_all(b"220 2.0.0 Ready to start TLS\r\n")?;
                return Ok(Outcome::StartTls(reader.into_inner()));
            }
            "AUTH" if script.reject_auth => "535 5.7.8 Authentication credentials invalid\r\n",
            "AUTH" => "235 2.7.0 Authentication successful\r\n",
            "MAIL" if script.reject_sender => "550 5.7.1 Sender rejected\r\n",
            "MAIL" => "250 2.1.0 OK\r\n",
            "RCPT"
                if script
                    .reject_recipients
                    .iter()
                    .any(|recipient| command.contains(&format!("<{recipient}>"))) =>
            {
                "550 5.1.1 No such user\r\n"
            }
            "RCPT" => "250 2.1.5 OK\r\n",
            "DATA" => {
                reader
                    .get_mut()
                    .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")?;
                transcript.data = Some(read_data(&mut reader)?);

                if script.hang_up_after_data {
                    return Ok(Outcome::Closed);
                }

                if script.reject_data {
                    "554 5.6.0 Message rejected\r\n"
                } else {
                    "250 2.0.0 Queued\r\n"
                }
            }
            "QUIT" => {
                reader.get_mut().write_all(b"221 2.0.0 Bye\r\n")?;
                return Ok(Outcome::Closed);
            }
            _ => "502 5.5.2 Command not recognized\r\n",
        };

        reader.get_mut().write_all(reply.as_bytes())?;
    }
}

fn read_data(reader: &mut impl BufRead) -> io::Result<String> {
    let mut data = String::new();

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == ".\r\n" {
            return Ok(data);
        }

        data.push_str(line.strip_prefix('.').unwrap_or(&line));
    }
}

fn acceptor() -> io::Result<TlsAcceptor> {
    let identity = Identity::from_pkcs8(CERTIFICATE, PRIVATE_KEY).map_err(other)?;

    TlsAcceptor::new(identity).map_err(other)
}

fn other(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}
