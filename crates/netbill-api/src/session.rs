// Scoped router session
//
// A `Session` owns one authenticated TCP connection. It is opened per
// logical operation and closed afterwards: `close()` performs a graceful
// shutdown, and dropping the value on an early return closes the socket.

use std::io;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::client::{ActiveConnection, NewSecret, RouterEndpoint, SecretChange};
use crate::codec::SentenceCodec;
use crate::error::Error;
use crate::sentence::{Reply, Sentence};
use crate::transport::TransportConfig;

/// One authenticated connection to a router.
#[derive(Debug)]
pub struct Session {
    framed: Framed<TcpStream, SentenceCodec>,
    transport: TransportConfig,
    peer: String,
}

impl Session {
    /// Connect to `endpoint` and log in.
    pub async fn open(endpoint: &RouterEndpoint, transport: &TransportConfig) -> Result<Self, Error> {
        let addr = endpoint.addr();
        debug!(%addr, "connecting to router");

        // A connect that outlives the bound is a connection failure; the
        // timeout variant is reserved for reply reads.
        let stream = transport
            .bounded(async {
                TcpStream::connect(&addr)
                    .await
                    .map_err(|source| Error::ConnectionFailed {
                        addr: addr.clone(),
                        source,
                    })
            })
            .await
            .map_err(|e| match e {
                Error::Timeout { timeout_secs } => Error::ConnectionFailed {
                    addr: addr.clone(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect timed out after {timeout_secs}s"),
                    ),
                },
                other => other,
            })?;
        stream.set_nodelay(true)?;

        let mut session = Self {
            framed: Framed::new(stream, SentenceCodec::new()),
            transport: transport.clone(),
            peer: addr,
        };
        session.login(&endpoint.username, &endpoint.secret).await?;
        Ok(session)
    }

    /// `/login =name= =password=`
    ///
    /// Any reply without `!done` is an authentication failure, including a
    /// stream that ends or breaks before the reply completes. A read that
    /// exceeds the bound stays [`Error::Timeout`].
    async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), Error> {
        let sentence = Sentence::new("/login")
            .attr("name", username)
            .attr("password", password.expose_secret());
        self.send(sentence).await?;

        let reply = self.read_reply().await.map_err(|e| match e {
            Error::Protocol(_) | Error::Io(_) => Error::AuthenticationFailed {
                message: format!("login reply did not include !done: {e}"),
            },
            other => other,
        })?;
        if let Some(trap) = reply.trap() {
            return Err(Error::AuthenticationFailed {
                message: trap
                    .attribute("message")
                    .unwrap_or("login rejected")
                    .to_owned(),
            });
        }
        if !reply.is_done() {
            return Err(Error::AuthenticationFailed {
                message: "login reply did not include !done".into(),
            });
        }

        debug!(peer = %self.peer, %username, "router login succeeded");
        Ok(())
    }

    /// Write one sentence.
    pub async fn send(&mut self, sentence: Sentence) -> Result<(), Error> {
        trace!(peer = %self.peer, ?sentence, "-> sentence");
        self.framed.send(sentence).await
    }

    /// Read sentences until the reply is complete (`!done` or `!fatal`).
    pub async fn read_reply(&mut self) -> Result<Reply, Error> {
        let Self {
            framed,
            transport,
            peer,
        } = self;
        let mut sentences = Vec::new();
        loop {
            let next = transport
                .bounded(async { framed.next().await.transpose() })
                .await?;
            let Some(sentence) = next else {
                return Err(Error::Protocol(
                    "connection closed before the reply completed".into(),
                ));
            };
            trace!(%peer, ?sentence, "<- sentence");

            if sentence.is_empty() {
                continue;
            }
            let terminal = sentence.kind().is_some_and(|k| k.is_terminal());
            sentences.push(sentence);
            if terminal {
                return Ok(Reply::new(sentences));
            }
        }
    }

    /// Send a command and read its reply, turning `!trap`/`!fatal` into errors.
    pub async fn call(&mut self, sentence: Sentence) -> Result<Reply, Error> {
        debug!(peer = %self.peer, command = sentence.command().unwrap_or_default(), "router call");
        self.send(sentence).await?;
        self.read_reply().await?.into_result()
    }

    // ── PPP secrets ─────────────────────────────────────────────────

    /// `/ppp/secret/print ?name=<username>`
    ///
    /// Returns the internal `.id` of the secret, or `None` if the router
    /// holds no secret with that name.
    pub async fn find_secret_id(&mut self, username: &str) -> Result<Option<String>, Error> {
        let reply = self
            .call(Sentence::new("/ppp/secret/print").query("name", username))
            .await?;
        Ok(reply.find_attribute(".id").map(str::to_owned))
    }

    /// `/ppp/secret/add =service=pppoe`
    pub async fn add_secret(&mut self, secret: &NewSecret) -> Result<(), Error> {
        let sentence = Sentence::new("/ppp/secret/add")
            .attr("name", &secret.username)
            .attr("password", secret.password.expose_secret())
            .attr("service", "pppoe")
            .attr("profile", secret.profile.as_deref().unwrap_or("default"))
            .attr_opt("remote-address", secret.remote_address.as_deref())
            .attr_opt("comment", secret.comment.as_deref());
        self.call(sentence).await?;
        Ok(())
    }

    /// `/ppp/secret/remove =.id=<id>`
    pub async fn remove_secret(&mut self, username: &str) -> Result<SecretChange, Error> {
        let Some(id) = self.find_secret_id(username).await? else {
            return Ok(SecretChange::NotFound);
        };
        self.call(Sentence::new("/ppp/secret/remove").attr(".id", &id))
            .await?;
        Ok(SecretChange::Applied)
    }

    /// `/ppp/secret/enable` or `/ppp/secret/disable` `=.id=<id>`
    pub async fn set_secret_enabled(
        &mut self,
        username: &str,
        enabled: bool,
    ) -> Result<SecretChange, Error> {
        let Some(id) = self.find_secret_id(username).await? else {
            return Ok(SecretChange::NotFound);
        };
        let command = if enabled {
            "/ppp/secret/enable"
        } else {
            "/ppp/secret/disable"
        };
        self.call(Sentence::new(command).attr(".id", &id)).await?;
        Ok(SecretChange::Applied)
    }

    // ── Monitoring ──────────────────────────────────────────────────

    /// `/ppp/active/print`
    pub async fn active_connections(&mut self) -> Result<Vec<ActiveConnection>, Error> {
        let reply = self.call(Sentence::new("/ppp/active/print")).await?;
        Ok(reply
            .records()
            .filter_map(|record| {
                let attributes = record.attributes();
                let name = attributes.get("name")?.clone();
                Some(ActiveConnection { name, attributes })
            })
            .collect())
    }

    /// `/system/identity/print`
    pub async fn identity(&mut self) -> Result<Reply, Error> {
        self.call(Sentence::new("/system/identity/print")).await
    }

    /// Shut down the write half and release the socket.
    pub async fn close(self) {
        let peer = self.peer;
        let mut stream = self.framed.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!(%peer, error = %e, "router socket shutdown failed");
        }
    }
}
