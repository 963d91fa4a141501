//! Server account read from a credentials file.
//!
//! The file holds three lines:
//!
//! ```text
//! imap.example.com:993
//! alice@example.com
//! secret
//! ```
//!
//! The port may be left out, in which case implicit TLS on 993 is assumed.

use std::fmt;
use std::path::Path;

use mboxmirror_imap::Config;
use mboxmirror_imap::connection::IMAPS_PORT;

use crate::error::{Error, Result};

/// Where and as whom to log in.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Account {
    /// Reads a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    /// Parses the content of a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a line is missing or the address is
    /// invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
        let mut next = |what: &str| {
            lines
                .next()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .ok_or_else(|| Error::Config(format!("credentials file has no {what} line")))
        };

        let address = next("server")?;
        let username = next("user name")?;
        let password = next("password")?;
        let (host, port) = split_address(&address)?;

        Ok(Self {
            host,
            port,
            username,
            password,
        })
    }

    /// Connection settings for this account.
    #[must_use]
    pub fn imap_config(&self) -> Config {
        Config::builder(&self.host).port(self.port).build()
    }
}

fn split_address(address: &str) -> Result<(String, u16)> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Ok((address.to_string(), IMAPS_PORT));
    };
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::Config(format!("invalid port in server address {address:?}")))?;
    if host.is_empty() {
        return Err(Error::Config(format!("missing host in server address {address:?}")));
    }
    Ok((host.to_string(), port))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let account = Account::parse("imap.example.com:1993\r\nalice\r\ns3cret\r\n").unwrap();
        assert_eq!(account.host, "imap.example.com");
        assert_eq!(account.port, 1993);
        assert_eq!(account.username, "alice");
        assert_eq!(account.password, "s3cret");
        assert_eq!(account.imap_config().address(), "imap.example.com:1993");
    }

    #[test]
    fn test_default_port() {
        let account = Account::parse("imap.example.com\nalice\nsecret").unwrap();
        assert_eq!(account.port, 993);
    }

    #[test]
    fn test_missing_lines() {
        let err = Account::parse("imap.example.com:993\nalice\n").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("password")));
    }

    #[test]
    fn test_bad_port() {
        assert!(Account::parse("host:imaps\nalice\nsecret\n").is_err());
        assert!(Account::parse(":993\nalice\nsecret\n").is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let account = Account::parse("h\nu\nhunter2\n").unwrap();
        assert!(!format!("{account:?}").contains("hunter2"));
    }
}
