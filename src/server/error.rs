/*
 * error.rs
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

//! Top-level server error, aggregating every concern the server surfaces to
//! the foreground caller.

use std::fmt;
use std::io;

use crate::resolver::ResolverError;
use crate::trace::TraceParseError;

#[derive(Debug)]
pub enum ServerError {
    TraceParse(TraceParseError),
    MessageMismatch { expected_uri: String, actual_uri: String },
    Io(io::Error),
    NotFound(String),
    InvalidState(String),
    Cancelled,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::TraceParse(e) => write!(f, "{}", e),
            ServerError::MessageMismatch { expected_uri, actual_uri } => {
                write!(f, "expected message for '{}', but got '{}'", expected_uri, actual_uri)
            }
            ServerError::Io(e) => write!(f, "{}", e),
            ServerError::NotFound(key) => write!(f, "not found: {}", key),
            ServerError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            ServerError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}

impl From<TraceParseError> for ServerError {
    fn from(e: TraceParseError) -> Self {
        ServerError::TraceParse(e)
    }
}

impl From<ResolverError> for ServerError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::NotFound(key) => ServerError::NotFound(key),
            ResolverError::Cancelled => ServerError::Cancelled,
        }
    }
}
