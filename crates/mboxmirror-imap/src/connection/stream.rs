//! TLS dialing for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::Config;
use crate::{Error, Result};

/// An implicit-TLS connection to an IMAP server.
pub type ImapStream = TlsStream<TcpStream>;

/// Creates a TLS connector with the webpki root certificates.
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Connects to the configured server with TLS from the start.
///
/// The connect timeout covers both the TCP dial and the handshake.
pub async fn connect_tls(config: &Config) -> Result<ImapStream> {
    let dial = async {
        let tcp = TcpStream::connect(config.address()).await?;
        debug!(address = %config.address(), "tcp connected, starting tls");

        let server_name = ServerName::try_from(config.host.clone())?;
        Ok::<_, Error>(create_tls_connector().connect(server_name, tcp).await?)
    };

    tokio::time::timeout(config.connect_timeout, dial)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}
