/*
 * codec.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of uhttpmock, a mock HTTP/HTTPS server for testing network clients.
 *
 * uhttpmock is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uhttpmock is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uhttpmock.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Parser/emitter for the ASCII interleaved request/response trace format.
//!
//! A record is two half-messages, each a run of lines tagged `"> "` (request)
//! or `"< "` (response) and closed by a bare `"  "` terminator line.

use std::fmt;
use std::io::{self, BufRead, Write};

use url::Url;

use crate::message::{HttpVersion, Message};

const KNOWN_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "CONNECT"];

/// A malformed trace record: missing tag, missing `": "` in a header, a
/// malformed start line, or EOF in the middle of a record.
#[derive(Debug)]
pub struct TraceParseError {
    pub reason: String,
    pub offset: usize,
}

impl TraceParseError {
    fn new(reason: impl Into<String>, offset: usize) -> Self {
        Self {
            reason: reason.into(),
            offset,
        }
    }
}

impl fmt::Display for TraceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace parse error at line {}: {}", self.offset, self.reason)
    }
}

impl std::error::Error for TraceParseError {}

/// Parser/emitter for the trace format. Stateless: every method takes the
/// reader/writer and state it needs as arguments.
pub struct TraceCodec;

impl TraceCodec {
    /// Read exactly one request/response record from `reader`, skipping (and
    /// continuing past) any record whose response status is 0. Returns `None`
    /// cleanly at end-of-stream between records.
    pub fn next_expected<R: BufRead>(
        reader: &mut R,
        base_uri: &Url,
    ) -> Result<Option<Message>, TraceParseError> {
        let mut line_no = 0usize;
        loop {
            let mut req_lines = Vec::new();
            let req_found = Self::read_half(reader, &mut req_lines, &mut line_no)?;
            if !req_found {
                if req_lines.is_empty() {
                    return Ok(None);
                }
                return Err(TraceParseError::new(
                    "unexpected end of file in request half",
                    line_no,
                ));
            }

            let mut resp_lines = Vec::new();
            let resp_found = Self::read_half(reader, &mut resp_lines, &mut line_no)?;
            if !resp_found {
                return Err(TraceParseError::new(
                    "unexpected end of file in response half",
                    line_no,
                ));
            }

            let message = Self::parse_record(&req_lines, &resp_lines, base_uri, line_no)?;
            if message.status() != 0 {
                return Ok(Some(message));
            }
            // status 0 ("none"): skip this record and keep reading.
        }
    }

    /// Parse one already-collected record (request half lines followed by
    /// response half lines, each ending with its own `"  "` terminator). Shared
    /// by `next_expected` (reading a trace file) and the compare line-stream
    /// state machine (reconstituting a message from live chunk lines).
    pub fn parse_record(
        req_lines: &[String],
        resp_lines: &[String],
        base_uri: &Url,
        offset: usize,
    ) -> Result<Message, TraceParseError> {
        let (method, uri_str, version) = Self::parse_request_start_line(&req_lines[0], offset)?;
        let uri = Url::options()
            .base_url(Some(base_uri))
            .parse(&uri_str)
            .map_err(|e| TraceParseError::new(format!("invalid URI '{}': {}", uri_str, e), offset))?;

        let mut message = Message::new_from_uri(method, uri);
        message.set_http_version(version);

        let (req_headers, req_body) = Self::parse_headers_and_body(req_lines, '>', offset)?;
        for (name, value) in req_headers {
            message.request_headers_mut().append(name, value);
        }
        if let Some(body) = req_body {
            message.request_body_mut().append(body.as_bytes());
        }
        message.request_body_mut().complete();

        let (status, reason, version) = Self::parse_response_start_line(&resp_lines[0], offset)?;
        message.set_status(status, Some(reason));
        message.set_http_version(version);

        let (resp_headers, resp_body) = Self::parse_headers_and_body(resp_lines, '<', offset)?;
        for (name, value) in resp_headers {
            message.response_headers_mut().append(name, value);
        }
        if let Some(body) = resp_body {
            message.response_body_mut().append(body.as_bytes());
        }
        message.response_body_mut().complete();

        Ok(message)
    }

    fn parse_request_start_line(
        line: &str,
        offset: usize,
    ) -> Result<(String, String, HttpVersion), TraceParseError> {
        let content = Self::strip_tag(line, '>', offset)?;
        let mut parts = content.splitn(3, ' ');
        let method = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TraceParseError::new("malformed request start line", offset))?;
        if !KNOWN_METHODS.contains(&method) {
            return Err(TraceParseError::new(format!("unknown method '{}'", method), offset));
        }
        let uri = parts
            .next()
            .ok_or_else(|| TraceParseError::new("missing URI in request start line", offset))?;
        let version_str = parts
            .next()
            .ok_or_else(|| TraceParseError::new("missing version in request start line", offset))?;
        let version = Self::parse_version(version_str, true);
        Ok((method.to_string(), uri.to_string(), version))
    }

    fn parse_response_start_line(
        line: &str,
        offset: usize,
    ) -> Result<(u16, String, HttpVersion), TraceParseError> {
        let content = Self::strip_tag(line, '<', offset)?;
        let mut parts = content.splitn(3, ' ');
        let version_str = parts
            .next()
            .ok_or_else(|| TraceParseError::new("missing version in response start line", offset))?;
        let version = Self::parse_version(version_str, false);
        let status_str = parts
            .next()
            .ok_or_else(|| TraceParseError::new("missing status in response start line", offset))?;
        let status: u16 = status_str
            .parse()
            .map_err(|_| TraceParseError::new(format!("invalid status '{}'", status_str), offset))?;
        let reason = parts.next().unwrap_or("").to_string();
        Ok((status, reason, version))
    }

    fn parse_version(s: &str, is_request: bool) -> HttpVersion {
        match s {
            "HTTP/1.1" => HttpVersion::Http11,
            "HTTP/1.0" => HttpVersion::Http10,
            "HTTP/2" => HttpVersion::Http2,
            _ => {
                // HttpVersion is a closed three-way enum, so an unrecognized
                // literal can't be retained verbatim; fall back to 1.1 on
                // both sides, matching the request-side default.
                let _ = is_request;
                HttpVersion::Http11
            }
        }
    }

    fn strip_tag(line: &str, tag: char, offset: usize) -> Result<String, TraceParseError> {
        let mut chars = line.chars();
        if chars.next() != Some(tag) || chars.next() != Some(' ') {
            return Err(TraceParseError::new(
                format!("missing tag '{} ' on line '{}'", tag, line),
                offset,
            ));
        }
        Ok(line[2..].to_string())
    }

    /// Parse the header section and (optional) body of one half-message. `lines`
    /// is the full half (start line included at index 0, terminator included at
    /// the end); parsing begins at index 1.
    fn parse_headers_and_body(
        lines: &[String],
        tag: char,
        offset: usize,
    ) -> Result<(Vec<(String, String)>, Option<String>), TraceParseError> {
        let bare = format!("{} ", tag);
        let terminator = "  ";
        let mut headers = Vec::new();
        let mut idx = 1;

        loop {
            if idx >= lines.len() {
                return Err(TraceParseError::new("half-message missing terminator", offset));
            }
            let line = &lines[idx];
            if line == terminator {
                // No headers, no body.
                return Ok((headers, None));
            }
            if *line == bare {
                idx += 1;
                break;
            }
            let content = Self::strip_tag(line, tag, offset)?;
            let colon = content
                .find(": ")
                .ok_or_else(|| TraceParseError::new(format!("header missing ': ' in '{}'", line), offset))?;
            let name = content[..colon].to_string();
            let value = content[colon + 2..].to_string();
            headers.push((name, value));
            idx += 1;
        }

        let mut body_lines = Vec::new();
        loop {
            if idx >= lines.len() {
                return Err(TraceParseError::new("half-message missing terminator", offset));
            }
            let line = &lines[idx];
            if line == terminator {
                break;
            }
            let content = Self::strip_tag(line, tag, offset)?;
            body_lines.push(content);
            idx += 1;
        }

        if body_lines.is_empty() {
            Ok((headers, None))
        } else {
            Ok((headers, Some(body_lines.join("\n"))))
        }
    }

    /// Read one half-message: lines up to and including the `"  "` terminator.
    /// Returns `Ok(true)` if the terminator was found, `Ok(false)` on EOF first
    /// (in which case `lines` holds whatever was read before EOF, possibly
    /// empty).
    fn read_half<R: BufRead>(
        reader: &mut R,
        lines: &mut Vec<String>,
        line_no: &mut usize,
    ) -> Result<bool, TraceParseError> {
        loop {
            let mut raw = String::new();
            let n = reader
                .read_line(&mut raw)
                .map_err(|e| TraceParseError::new(format!("I/O error: {}", e), *line_no))?;
            if n == 0 {
                return Ok(false);
            }
            *line_no += 1;
            if raw.ends_with('\n') {
                raw.pop();
                if raw.ends_with('\r') {
                    raw.pop();
                }
            }
            let reached_terminator = raw == "  ";
            lines.push(raw);
            if reached_terminator {
                return Ok(true);
            }
        }
    }

    /// Append a single already-formatted chunk line (one of `"> ..."`,
    /// `"< ..."`, `"  "`) to the trace output stream, verbatim, followed by a
    /// newline.
    pub fn write_chunk_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")
    }

    /// Convenience for tests: write a full record (request lines then response
    /// lines, each including its own terminator) without going through the
    /// live chunk-ingestion path.
    pub fn write_record<W: Write>(
        writer: &mut W,
        request_lines: &[&str],
        response_lines: &[&str],
    ) -> io::Result<()> {
        for line in request_lines {
            Self::write_chunk_line(writer, line)?;
        }
        for line in response_lines {
            Self::write_chunk_line(writer, line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn base() -> Url {
        Url::parse("https://localhost").unwrap()
    }

    #[test]
    fn parses_scenario_s1() {
        let trace = concat!(
            "> GET /x HTTP/1.1\n",
            "> Host: example.org\n",
            "> \n",
            "  \n",
            "< HTTP/1.1 200 OK\n",
            "< Content-Length: 2\n",
            "< \n",
            "< ok\n",
            "  \n",
        );
        let mut cursor = Cursor::new(trace.as_bytes().to_vec());
        let msg = TraceCodec::next_expected(&mut cursor, &base())
            .unwrap()
            .expect("one record");
        assert_eq!(msg.method(), "GET");
        assert_eq!(msg.status(), 200);
        assert_eq!(msg.reason_phrase(), Some("OK"));
        assert_eq!(msg.response_body().as_slice(), b"ok");
        assert_eq!(msg.response_body().len(), 2);
    }

    #[test]
    fn returns_none_at_clean_eof() {
        let mut cursor = Cursor::new(Vec::new());
        let msg = TraceCodec::next_expected(&mut cursor, &base()).unwrap();
        assert!(msg.is_none());
    }

    #[test]
    fn errors_on_eof_mid_record() {
        let trace = "> GET /x HTTP/1.1\n> \n  \n< HTTP/1.1 200 OK\n";
        let mut cursor = Cursor::new(trace.as_bytes().to_vec());
        let err = TraceCodec::next_expected(&mut cursor, &base()).unwrap_err();
        assert!(err.reason.contains("response half"));
    }

    #[test]
    fn errors_on_unknown_method() {
        let trace = "> TRACE /x HTTP/1.1\n> \n  \n< HTTP/1.1 200 OK\n< \n  \n";
        let mut cursor = Cursor::new(trace.as_bytes().to_vec());
        let err = TraceCodec::next_expected(&mut cursor, &base()).unwrap_err();
        assert!(err.reason.contains("unknown method"));
    }

    #[test]
    fn skips_records_with_status_zero() {
        let mut buf = Vec::new();
        TraceCodec::write_record(
            &mut buf,
            &["> GET /a HTTP/1.1", "> ", "  "],
            &["< HTTP/1.1 0 None", "< ", "  "],
        )
        .unwrap();
        TraceCodec::write_record(
            &mut buf,
            &["> GET /b HTTP/1.1", "> ", "  "],
            &["< HTTP/1.1 200 OK", "< ", "  "],
        )
        .unwrap();
        let mut cursor = Cursor::new(buf);
        let msg = TraceCodec::next_expected(&mut cursor, &base())
            .unwrap()
            .expect("second record");
        assert_eq!(msg.path_and_query(), "/b");
    }
}
