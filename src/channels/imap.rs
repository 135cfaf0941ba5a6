//! Drafts staging over IMAP (raw protocol over rustls).
//!
//! One session is opened per run: `LOGIN` once, `APPEND` each message to
//! the first drafts folder the server accepts, `LOGOUT` on close or drop.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use super::{Delivery, OutgoingEmail, Transport};
use crate::config::MailConfig;
use crate::error::DispatchError;

type ImapError = Box<dyn std::error::Error + Send + Sync>;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// A logged-in IMAP session over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: S,
    tag_counter: u32,
    logged_out: bool,
}

impl<S: Read + Write> ImapSession<S> {
    /// Read the server greeting and log in.
    pub fn login(stream: S, username: &str, password: &str) -> Result<Self, ImapError> {
        let mut session = Self {
            stream,
            tag_counter: 1,
            logged_out: false,
        };
        let _greeting = session.read_line()?;

        let login = format!("LOGIN {} {}", quote(username), quote(password));
        let resp = session.command(&login)?;
        if !resp.last().is_some_and(|l| is_tagged_ok(l)) {
            session.logged_out = true;
            return Err("IMAP login failed".into());
        }
        Ok(session)
    }

    fn next_tag(&mut self) -> String {
        let tag = format!("A{}", self.tag_counter);
        self.tag_counter += 1;
        tag
    }

    fn read_line(&mut self) -> Result<String, ImapError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err("IMAP connection closed".into()),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send a command, collect response lines through the tagged one.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, ImapError> {
        let tag = self.next_tag();
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;
        self.read_until_tagged(&tag)
    }

    fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<String>, ImapError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&format!("{tag} "));
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// `APPEND` one message flagged `\Draft`. `Ok(false)` means the server
    /// refused the folder.
    pub fn append(&mut self, folder: &str, message: &[u8]) -> Result<bool, ImapError> {
        let tag = self.next_tag();
        let cmd = format!(
            "{tag} APPEND {} (\\Draft) {{{}}}\r\n",
            quote(folder),
            message.len()
        );
        self.stream.write_all(cmd.as_bytes())?;
        self.stream.flush()?;

        // Wait for the continuation before sending the literal.
        loop {
            let line = self.read_line()?;
            if line.starts_with('+') {
                break;
            }
            if line.starts_with(&format!("{tag} ")) {
                return Ok(false);
            }
        }

        self.stream.write_all(message)?;
        self.stream.write_all(b"\r\n")?;
        self.stream.flush()?;

        let resp = self.read_until_tagged(&tag)?;
        Ok(resp.last().is_some_and(|l| is_tagged_ok(l)))
    }

    /// Try each folder in order; return the first that accepts the message.
    pub fn append_first(
        &mut self,
        folders: &[String],
        message: &[u8],
    ) -> Result<String, DispatchError> {
        for folder in folders {
            match self.append(folder, message) {
                Ok(true) => return Ok(folder.clone()),
                Ok(false) => tracing::debug!(folder, "IMAP folder refused APPEND"),
                Err(e) => {
                    return Err(DispatchError::SendFailed {
                        recipient: folder.clone(),
                        reason: format!("IMAP append failed: {e}"),
                    });
                }
            }
        }
        Err(DispatchError::DestinationNotFound {
            tried: folders.to_vec(),
        })
    }

    pub fn logout(&mut self) -> Result<(), ImapError> {
        if self.logged_out {
            return Ok(());
        }
        self.logged_out = true;
        self.command("LOGOUT")?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(mut self) -> S
    where
        S: Default,
    {
        self.logged_out = true;
        std::mem::take(&mut self.stream)
    }
}

impl<S: Read + Write> Drop for ImapSession<S> {
    fn drop(&mut self) {
        let _ = self.logout();
    }
}

/// Tagged completion line with status `OK`.
fn is_tagged_ok(line: &str) -> bool {
    line.split_whitespace().nth(1) == Some("OK")
}

/// IMAP quoted string.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Open a TLS connection to the IMAP server.
fn connect_tls(host: &str, port: u16) -> Result<TlsStream, ImapError> {
    let tcp = TcpStream::connect((host, port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(host.to_string())?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

// ── Transport ───────────────────────────────────────────────────────

/// Stages messages in the account's drafts folder.
pub struct ImapDrafts {
    session: Arc<Mutex<Option<ImapSession<TlsStream>>>>,
    folders: Vec<String>,
}

impl ImapDrafts {
    pub async fn connect(config: &MailConfig) -> Result<Self, DispatchError> {
        let host = config.imap_host.clone();
        let port = config.imap_port;
        let username = config.sender_email.clone();
        let password = config.password.clone();

        tracing::info!("Connecting to IMAP {host}:{port}...");
        let session = tokio::task::spawn_blocking(move || -> Result<_, ImapError> {
            let stream = connect_tls(&host, port)?;
            ImapSession::login(stream, &username, password.expose_secret())
        })
        .await
        .map_err(|e| imap_connect_error(format!("IMAP connect task panicked: {e}")))?
        .map_err(|e| imap_connect_error(e.to_string()))?;
        tracing::info!("IMAP connected");

        Ok(Self {
            session: Arc::new(Mutex::new(Some(session))),
            folders: config.draft_folders.clone(),
        })
    }
}

fn imap_connect_error(reason: String) -> DispatchError {
    DispatchError::Connect {
        transport: "imap".into(),
        reason,
    }
}

#[async_trait]
impl Transport for ImapDrafts {
    fn name(&self) -> &str {
        "imap"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<Delivery, DispatchError> {
        let bytes = email.to_bytes()?;
        let session = Arc::clone(&self.session);
        let folders = self.folders.clone();

        let folder = tokio::task::spawn_blocking(move || {
            let mut guard = session.lock().map_err(|_| DispatchError::Closed {
                transport: "imap".into(),
            })?;
            let session = guard.as_mut().ok_or_else(|| DispatchError::Closed {
                transport: "imap".into(),
            })?;
            session.append_first(&folders, &bytes)
        })
        .await
        .map_err(|e| DispatchError::SendFailed {
            recipient: email.to.clone(),
            reason: format!("append task panicked: {e}"),
        })??;

        Ok(Delivery::new(folder))
    }

    async fn close(&self) -> Result<(), DispatchError> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let taken = session.lock().ok().and_then(|mut guard| guard.take());
            if let Some(mut session) = taken {
                if let Err(e) = session.logout() {
                    tracing::warn!("IMAP logout failed: {e}");
                }
                tracing::info!("IMAP session closed");
            }
        })
        .await
        .map_err(|e| DispatchError::Connect {
            transport: "imap".into(),
            reason: format!("logout task panicked: {e}"),
        })
    }
}
