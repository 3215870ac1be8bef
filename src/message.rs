/*
 * message.rs
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

//! Owned representation of a single HTTP exchange: method, URI, version, status,
//! reason, and the four request/response header+body buffers.

use url::Url;

/// Negotiated or recorded HTTP version. Default on construction is 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
    Http2,
}

impl Default for HttpVersion {
    fn default() -> Self {
        HttpVersion::Http10
    }
}

/// Ordered, case-insensitive header multimap. Insertion order is preserved for
/// emission; lookups are case-insensitive per RFC 7230.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            entry.1 = value.into();
        } else {
            self.append(name.to_string(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Opaque byte buffer with a "complete" flag, mirroring SoupMessageBody.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    data: Vec<u8>,
    complete: bool,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn append_owned(&mut self, bytes: Vec<u8>) {
        self.data.extend(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn complete(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Canonical exchange unit: method, URI, version, status, reason, and the
/// request/response header+body pairs. A freshly constructed `Message` has
/// empty bodies, empty header lists, version 1.0, and status 0 ("unset").
#[derive(Debug, Clone)]
pub struct Message {
    method: String,
    http_version: HttpVersion,
    status: u16,
    reason_phrase: Option<String>,
    uri: Option<Url>,
    request_headers: HeaderList,
    response_headers: HeaderList,
    request_body: Body,
    response_body: Body,
}

impl Message {
    /// Construct from a method and URI (used by the trace parser and the server
    /// when synthesizing messages that don't come from a live listener).
    pub fn new_from_uri(method: impl Into<String>, uri: Url) -> Self {
        Self {
            method: method.into(),
            http_version: HttpVersion::default(),
            status: 0,
            reason_phrase: None,
            uri: Some(uri),
            request_headers: HeaderList::new(),
            response_headers: HeaderList::new(),
            request_body: Body::new(),
            response_body: Body::new(),
        }
    }

    /// Construct an empty message with no URI yet assigned. Used when extracting
    /// from an incoming listener request before the URI has been parsed.
    pub fn empty() -> Self {
        Self {
            method: String::new(),
            http_version: HttpVersion::default(),
            status: 0,
            reason_phrase: None,
            uri: None,
            request_headers: HeaderList::new(),
            response_headers: HeaderList::new(),
            request_body: Body::new(),
            response_body: Body::new(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    pub fn http_version(&self) -> HttpVersion {
        self.http_version
    }

    /// Status 0 means "unset/none" (`uhm_message_get_status`).
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason_phrase.as_deref()
    }

    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    pub fn set_uri(&mut self, uri: Url) {
        self.uri = Some(uri);
    }

    pub fn request_headers(&self) -> &HeaderList {
        &self.request_headers
    }

    pub fn request_headers_mut(&mut self) -> &mut HeaderList {
        &mut self.request_headers
    }

    pub fn response_headers(&self) -> &HeaderList {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderList {
        &mut self.response_headers
    }

    pub fn request_body(&self) -> &Body {
        &self.request_body
    }

    pub fn request_body_mut(&mut self) -> &mut Body {
        &mut self.request_body
    }

    pub fn response_body(&self) -> &Body {
        &self.response_body
    }

    pub fn response_body_mut(&mut self) -> &mut Body {
        &mut self.response_body
    }

    /// Set status and reason phrase together (`uhm_message_set_status`); `reason`
    /// of `None` clears any previously set reason phrase.
    pub fn set_status(&mut self, status: u16, reason: Option<String>) {
        self.status = status;
        self.reason_phrase = reason;
    }

    pub fn set_http_version(&mut self, version: HttpVersion) {
        self.http_version = version;
    }

    /// Path plus `?query` (or just `/` when the path is empty), used in
    /// diagnostic response bodies (mirrors `uri_get_path_query()`).
    pub fn path_and_query(&self) -> String {
        match &self.uri {
            Some(uri) => {
                let path = if uri.path().is_empty() { "/" } else { uri.path() };
                match uri.query() {
                    Some(q) => format!("{}?{}", path, q),
                    None => path.to_string(),
                }
            }
            None => "/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_message_has_defaults() {
        let msg = Message::new_from_uri("GET", Url::parse("http://example.org/x").unwrap());
        assert_eq!(msg.http_version(), HttpVersion::Http10);
        assert_eq!(msg.status(), 0);
        assert!(msg.request_headers().is_empty());
        assert!(msg.response_body().is_empty());
    }

    #[test]
    fn path_and_query_includes_query_string() {
        let msg = Message::new_from_uri("GET", Url::parse("http://example.org/x?a=1").unwrap());
        assert_eq!(msg.path_and_query(), "/x?a=1");
    }

    #[test]
    fn header_list_lookup_is_case_insensitive() {
        let mut headers = HeaderList::new();
        headers.append("Content-Length", "2");
        assert_eq!(headers.get("content-length"), Some("2"));
        assert_eq!(headers.get("CONTENT-LENGTH"), Some("2"));
    }
}
