/*
 * handler.rs
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

//! The default replay handler: compares an incoming request against the
//! trace's next expected message and synthesizes a response. Kept free of any
//! listener type so it can be exercised directly in tests.

use url::Url;

use crate::compare::CompareEngine;
use crate::message::{HeaderList, HttpVersion, Message};

pub const TRACE_FILE_HEADER: &str = "X-Mock-Trace-File";
pub const TRACE_FILE_OFFSET_HEADER: &str = "X-Mock-Trace-File-Offset";

/// A fully formed reply, independent of any particular listener crate.
#[derive(Debug, Clone)]
pub struct HandledResponse {
    pub http_version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

impl HandledResponse {
    fn plain(status: u16, reason: &str, body: String) -> Self {
        Self {
            http_version: HttpVersion::Http11,
            status,
            reason: reason.to_string(),
            headers: HeaderList::new(),
            body: body.into_bytes(),
        }
    }
}

/// Rewrite `Location`'s port to the mock server's; scheme, userinfo, host,
/// path, query, fragment pass through unchanged. Invalid `Location` values are
/// copied verbatim.
fn rewrite_location(value: &str, server_port: u16) -> String {
    match Url::parse(value) {
        Ok(mut url) => {
            if url.set_port(Some(server_port)).is_ok() {
                url.to_string()
            } else {
                value.to_string()
            }
        }
        Err(_) => value.to_string(),
    }
}

/// Zero-pad `body` out to `content_length` bytes if it declares a longer size
/// than what was recorded.
fn pad_to_content_length(body: &mut Vec<u8>, content_length: Option<usize>) {
    if let Some(n) = content_length {
        if n > body.len() {
            body.resize(n, 0u8);
        }
    }
}

/// Process one incoming request against `next_expected` (`None` when the
/// trace is exhausted), incrementing `message_counter` on every comparison
/// attempt. A mismatch leaves `next_expected` in place — `real_handle_message()`
/// only clears `priv->next_message` once `compare_incoming_message()`
/// succeeds, so the same expected message is retried against the next
/// request; only a match consumes it. `trace_uri` and `server_port` feed the
/// debug headers and the `Location` rewrite respectively.
pub fn handle_message(
    compare: &mut CompareEngine,
    next_expected: &mut Option<Message>,
    actual: &Message,
    message_counter: &mut u64,
    trace_uri: &str,
    server_port: u16,
) -> HandledResponse {
    let Some(expected) = next_expected.as_ref() else {
        return HandledResponse::plain(
            400,
            "Bad Request",
            format!("Expected no request, but got {} '{}'.", actual.method(), actual.path_and_query()),
        );
    };

    *message_counter += 1;
    let matched = compare.equal(expected, actual);

    let mut response = if !matched {
        HandledResponse::plain(
            400,
            "Bad Request",
            format!(
                "Expected {} URI '{}', but got {} '{}'.",
                expected.method(),
                expected.path_and_query(),
                actual.method(),
                actual.path_and_query(),
            ),
        )
    } else {
        let mut headers = HeaderList::new();
        let mut content_length: Option<usize> = None;
        for (name, value) in expected.response_headers().iter() {
            let rewritten = if name.eq_ignore_ascii_case("Location") {
                rewrite_location(value, server_port)
            } else {
                value.to_string()
            };
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = rewritten.trim().parse::<usize>().ok();
            }
            headers.append(name.to_string(), rewritten);
        }

        let mut body = expected.response_body().as_slice().to_vec();
        pad_to_content_length(&mut body, content_length);

        HandledResponse {
            http_version: expected.http_version(),
            status: expected.status(),
            reason: expected.reason_phrase().unwrap_or("").to_string(),
            headers,
            body,
        }
    };

    if matched {
        *next_expected = None;
    }

    response.headers.append(TRACE_FILE_HEADER, trace_uri.to_string());
    response
        .headers
        .append(TRACE_FILE_OFFSET_HEADER, message_counter.to_string());
    response
}

/// Error-path reply for a trace record that failed to parse: `500` carrying
/// the parse error message (the debug headers are still appended by the
/// caller once a `message_counter` value is available).
pub fn handle_parse_error(err: &dyn std::fmt::Display) -> HandledResponse {
    HandledResponse::plain(500, "Internal Server Error", format!("Error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(method: &str, uri: &str) -> Message {
        Message::new_from_uri(method, Url::parse(uri).unwrap())
    }

    fn expected_with_response(uri: &str, status: u16, reason: &str, headers: &[(&str, &str)], body: &[u8]) -> Message {
        let mut msg = req("GET", uri);
        msg.set_status(status, Some(reason.to_string()));
        msg.set_http_version(HttpVersion::Http11);
        for (name, value) in headers {
            msg.response_headers_mut().append(*name, *value);
        }
        msg.response_body_mut().append(body);
        msg.response_body_mut().complete();
        msg
    }

    #[test]
    fn s1_replay_happy_path() {
        let mut compare = CompareEngine::new();
        let expected = expected_with_response(
            "http://example.org/x",
            200,
            "OK",
            &[("Content-Length", "2")],
            b"ok",
        );
        let actual = req("GET", "http://example.org/x");
        let mut counter = 0u64;
        let mut next_expected = Some(expected);
        let response = handle_message(&mut compare, &mut next_expected, &actual, &mut counter, "trace.log", 9999);
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.body, b"ok");
        assert_eq!(counter, 1);
        assert_eq!(response.headers.get(TRACE_FILE_OFFSET_HEADER), Some("1"));
        assert_eq!(response.headers.get(TRACE_FILE_HEADER), Some("trace.log"));
        assert!(next_expected.is_none(), "a match must clear next_expected");
    }

    #[test]
    fn s2_method_mismatch() {
        let mut compare = CompareEngine::new();
        let expected = expected_with_response("http://example.org/x", 200, "OK", &[], b"");
        let actual = req("POST", "http://example.org/x");
        let mut counter = 0u64;
        let mut next_expected = Some(expected);
        let response = handle_message(&mut compare, &mut next_expected, &actual, &mut counter, "t", 1);
        assert_eq!(response.status, 400);
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            "Expected GET URI '/x', but got POST '/x'."
        );
        assert!(next_expected.is_some(), "a mismatch must retain next_expected for a retry");
    }

    #[test]
    fn s3_unexpected_at_eof() {
        let mut compare = CompareEngine::new();
        let actual = req("GET", "http://example.org/y");
        let mut counter = 0u64;
        let mut next_expected = None;
        let response = handle_message(&mut compare, &mut next_expected, &actual, &mut counter, "t", 1);
        assert_eq!(response.status, 400);
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            "Expected no request, but got GET '/y'."
        );
        assert_eq!(counter, 0, "counter only increments on an actual comparison attempt");
    }

    #[test]
    fn s4_location_rewrite() {
        let mut compare = CompareEngine::new();
        let expected = expected_with_response(
            "http://example.org/p",
            302,
            "Found",
            &[("Location", "http://example.org:80/p?q#f")],
            b"",
        );
        let actual = req("GET", "http://example.org/p");
        let mut counter = 0u64;
        let mut next_expected = Some(expected);
        let response = handle_message(&mut compare, &mut next_expected, &actual, &mut counter, "t", 54321);
        assert_eq!(response.headers.get("Location"), Some("http://example.org:54321/p?q#f"));
    }

    #[test]
    fn s5_content_length_padding() {
        let mut compare = CompareEngine::new();
        let expected = expected_with_response(
            "http://example.org/p",
            200,
            "OK",
            &[("Content-Length", "8")],
            b"abc",
        );
        let actual = req("GET", "http://example.org/p");
        let mut counter = 0u64;
        let mut next_expected = Some(expected);
        let response = handle_message(&mut compare, &mut next_expected, &actual, &mut counter, "t", 1);
        assert_eq!(response.body, b"abc\0\0\0\0\0");
    }
}
