//! Thin remote interface to the architecture-semantics backend.
//!
//! The contract is small: given a 32-bit encoding, return the encoding
//! name and the semantics text, or report that the instruction is
//! unknown. Transport failures and timeouts are treated as unknown;
//! retry policy belongs to the backend operator, not to the lifter.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::config::Config;
use crate::Result;

/// A successful semantics lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticsReply {
    pub encoding: String,
    pub semantics: String,
}

pub trait SemanticsClient {
    /// `Ok(None)` means the backend does not know this encoding.
    fn fetch(&mut self, encoding: u32) -> Result<Option<SemanticsReply>>;
}

/// HTTP-backed client. One short-lived connection per request; any
/// failure along the way is logged and reported as "not found".
pub struct HttpSemanticsClient {
    addr: String,
    port: u16,
    vectors: bool,
    timeout: Duration,
}

impl HttpSemanticsClient {
    #[must_use]
    pub fn new(addr: &str, port: u16, vectors: bool) -> Self {
        Self {
            addr: addr.to_string(),
            port,
            vectors,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.server_addr, config.server_port, config.vectors)
    }

    fn request(&self, encoding: u32) -> std::io::Result<String> {
        let mut stream = TcpStream::connect((self.addr.as_str(), self.port))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let flags = if self.vectors {
            "&flags=%2Bdis:vectors"
        } else {
            ""
        };
        let request = format!(
            "GET /opcode?value=0x{encoding:08x}{flags} HTTP/1.1\r\n\
             Host: {}\r\nConnection: close\r\n\r\n",
            self.addr
        );
        stream.write_all(request.as_bytes())?;

        let mut response = String::new();
        stream.read_to_string(&mut response)?;
        Ok(response)
    }

    fn parse_response(response: &str) -> Option<SemanticsReply> {
        let (head, body) = response.split_once("\r\n\r\n")?;
        let status = head.lines().next()?;
        if !status.contains("200") {
            tracing::debug!(status, "semantics backend refused the encoding");
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
        let encoding = value.get("encoding")?.as_str()?.to_string();
        let semantics = value.get("semantics")?.as_str()?.to_string();
        Some(SemanticsReply {
            encoding,
            semantics,
        })
    }
}

impl SemanticsClient for HttpSemanticsClient {
    fn fetch(&mut self, encoding: u32) -> Result<Option<SemanticsReply>> {
        match self.request(encoding) {
            Ok(response) => Ok(Self::parse_response(&response)),
            Err(e) => {
                tracing::warn!(encoding = %format!("0x{encoding:08x}"), error = %e,
                    "semantics backend unreachable, treating as missing");
                Ok(None)
            }
        }
    }
}

/// In-memory client used by tests and offline runs. Idempotent by
/// construction.
#[derive(Debug, Default)]
pub struct StaticSemanticsClient {
    entries: HashMap<u32, SemanticsReply>,
}

impl StaticSemanticsClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, encoding: u32, name: &str, semantics: &str) {
        self.entries.insert(
            encoding,
            SemanticsReply {
                encoding: name.to_string(),
                semantics: semantics.to_string(),
            },
        );
    }
}

impl SemanticsClient for StaticSemanticsClient {
    fn fetch(&mut self, encoding: u32) -> Result<Option<SemanticsReply>> {
        Ok(self.entries.get(&encoding).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_body() {
        let response = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n\
            {\"encoding\":\"ADD_32_addsub_imm\",\"semantics\":\"Stmt_Throw()\"}";
        let reply = HttpSemanticsClient::parse_response(response).unwrap();
        assert_eq!(reply.encoding, "ADD_32_addsub_imm");
        assert_eq!(reply.semantics, "Stmt_Throw()");
    }

    #[test]
    fn non_200_is_missing() {
        let response = "HTTP/1.1 404 Not Found\r\n\r\n{}";
        assert!(HttpSemanticsClient::parse_response(response).is_none());
    }

    #[test]
    fn static_client_round_trip() {
        let mut client = StaticSemanticsClient::new();
        client.insert(0x9100_0000, "ADD_64_addsub_imm", "Stmt_Throw()");
        let hit = client.fetch(0x9100_0000).unwrap().unwrap();
        assert_eq!(hit.encoding, "ADD_64_addsub_imm");
        assert!(client.fetch(0xdead_beef).unwrap().is_none());
    }
}
