/*
 * install.rs
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

//! Process-wide "installed resolver" slot. `run()` pushes the mock resolver
//! in as the default; `stop()` pops it back out. Nested installation is
//! rejected — only one mock server may hold the slot at a time.

use std::sync::{Arc, Mutex, OnceLock};

use super::error::ServerError;
use crate::resolver::Resolver;

fn slot() -> &'static Mutex<Option<Arc<Resolver>>> {
    static SLOT: OnceLock<Mutex<Option<Arc<Resolver>>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Install `resolver` as the process default. Errors if a resolver is already
/// installed (nested install scopes are disallowed).
pub fn install(resolver: Arc<Resolver>) -> Result<(), ServerError> {
    let mut guard = slot().lock().unwrap();
    if guard.is_some() {
        return Err(ServerError::InvalidState(
            "a mock resolver is already installed as the process default".to_string(),
        ));
    }
    *guard = Some(resolver);
    Ok(())
}

/// Remove the currently installed resolver, if any. A no-op if none is
/// installed (`stop()` on a server that never reached `run()`).
pub fn uninstall() {
    let mut guard = slot().lock().unwrap();
    *guard = None;
}

/// The resolver currently installed as the process default, if any.
pub fn current() -> Option<Arc<Resolver>> {
    slot().lock().unwrap().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_install_is_rejected() {
        // Run serially: this process-wide slot is shared across tests in this
        // module, so only exercise it here rather than in handler/server tests.
        let a = Arc::new(Resolver::new());
        uninstall();
        install(a.clone()).unwrap();
        let b = Arc::new(Resolver::new());
        assert!(install(b).is_err());
        uninstall();
        assert!(current().is_none());
    }
}
