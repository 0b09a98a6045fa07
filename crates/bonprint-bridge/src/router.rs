// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Routes grant outcomes back to the command that is waiting on them.

use serde_json::Value;
use tracing::{debug, info, warn};

use bonprint_core::outcome::{CommandError, ErrorKind};
use bonprint_core::types::GrantOutcome;

use crate::dispatcher::Dispatcher;
use crate::slots::{PendingClass, PendingOperation};

impl Dispatcher {
    /// Resume, reject or answer the command suspended under
    /// `outcome.correlation`.
    ///
    /// Returns `false` when nothing is waiting on that correlation (a stale
    /// or foreign prompt); nothing changes in that case.
    pub fn on_grant_outcome(&mut self, outcome: GrantOutcome) -> bool {
        let Some((class, op)) = self.slots.take_matching(outcome.correlation) else {
            debug!(correlation = %outcome.correlation, "grant outcome matches no pending command");
            return false;
        };

        let waited_ms = (chrono::Utc::now() - op.suspended_at).num_milliseconds();
        info!(
            ?class,
            command = %op.command.id,
            correlation = %outcome.correlation,
            waited_ms,
            "grant outcome received"
        );

        match class {
            PendingClass::ExplicitGrantRequest => {
                op.command.responder.success(Value::Object(outcome.grant_map()));
            }
            PendingClass::DeviceList => self.resume_or_reject(
                op,
                &outcome,
                "Bluetooth permission is required to get device list",
            ),
            PendingClass::Print => self.resume_or_reject(
                op,
                &outcome,
                "Bluetooth permission is required for printing",
            ),
        }
        true
    }

    /// Only the first requested capability decides the command's fate.
    fn resume_or_reject(&self, op: PendingOperation, outcome: &GrantOutcome, denial: &str) {
        if outcome.first_granted() {
            self.executor.submit(op.command);
        } else {
            warn!(command = %op.command.id, requested = ?op.requested, "capability denied");
            op.command
                .responder
                .error(CommandError::new(ErrorKind::PermissionDenied, denial));
        }
    }
}
