/*
 * lib.rs
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

//! Mock HTTP/HTTPS server for automated tests of network clients: log,
//! replay or compare traffic against a recorded trace file, plus an
//! in-memory mock DNS resolver. See `server::Server` for the entry point.

pub mod compare;
pub mod message;
pub mod resolver;
pub mod server;
pub mod trace;
