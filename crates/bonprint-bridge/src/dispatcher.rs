// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command dispatch: capability gating in front of the print executor.
//
// A command whose capabilities are all granted goes straight to the
// executor. Otherwise it is parked in its class's pending register and the
// host is asked for the first missing capability; the router resumes or
// rejects it once the user answers. The dispatcher owns all of this state
// and is driven from a single task, so no locking is needed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use bonprint_core::outcome::CommandError;
use bonprint_core::types::{Arguments, Capability, CommandName, CorrelationId, PlatformProfile};

use crate::capabilities::{required_for, status_set};
use crate::executor::ExecutorHandle;
use crate::response::{Command, Responder};
use crate::slots::{PendingClass, PendingOperation, PendingSlots};
use crate::traits::PermissionOracle;

pub struct Dispatcher {
    pub(crate) profile: PlatformProfile,
    pub(crate) host: Option<Arc<dyn PermissionOracle>>,
    pub(crate) slots: PendingSlots,
    pub(crate) executor: ExecutorHandle,
    last_correlation: CorrelationId,
}

impl Dispatcher {
    pub fn new(profile: PlatformProfile, executor: ExecutorHandle) -> Self {
        Self {
            profile,
            host: None,
            slots: PendingSlots::default(),
            executor,
            last_correlation: CorrelationId(0),
        }
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// Bind the host that owns the capability prompts.
    pub fn attach_host(&mut self, oracle: Arc<dyn PermissionOracle>) {
        info!("host attached");
        self.host = Some(oracle);
    }

    /// Unbind the host. Already-suspended commands stay parked; new gated
    /// commands fail with `NO_ACTIVITY` until a host is attached again.
    pub fn detach_host(&mut self) {
        info!(pending = self.slots.len(), "host detached");
        self.host = None;
    }

    pub fn is_host_attached(&self) -> bool {
        self.host.is_some()
    }

    pub fn slots(&self) -> &PendingSlots {
        &self.slots
    }

    /// Entry point for a raw method call from the host channel.
    pub fn dispatch_call(&mut self, method: &str, arguments: Arguments, responder: Responder) {
        match CommandName::from_method(method) {
            Some(name) => self.dispatch(Command::new(name, arguments, responder)),
            None => {
                warn!(method, "unknown method");
                responder.not_implemented();
            }
        }
    }

    pub fn dispatch(&mut self, command: Command) {
        debug!(command = %command.id, name = %command.name, "dispatching");
        match command.name {
            CommandName::PlatformVersion => {
                command.responder.success(self.profile.version_string());
            }
            CommandName::PrintNetwork => self.executor.submit(command),
            CommandName::PrintWireless | CommandName::PrintWirelessDevice => {
                self.dispatch_gated(command, PendingClass::Print);
            }
            CommandName::ListWirelessDevices => {
                self.dispatch_gated(command, PendingClass::DeviceList);
            }
            CommandName::CheckGrants => self.check_grants(command),
            CommandName::RequestGrants => self.request_grants(command),
        }
    }

    /// Execute if every required capability is held, otherwise suspend and
    /// ask for the first one that is missing.
    fn dispatch_gated(&mut self, command: Command, class: PendingClass) {
        let Some(oracle) = self.host.clone() else {
            warn!(name = %command.name, "no host attached");
            command.responder.error(CommandError::no_activity());
            return;
        };

        let required = required_for(command.name, &self.profile);
        match required.into_iter().find(|c| !oracle.is_granted(*c)) {
            None => self.executor.submit(command),
            Some(missing) => self.suspend(class, command, oracle.as_ref(), vec![missing]),
        }
    }

    fn check_grants(&self, command: Command) {
        let Some(oracle) = self.host.as_ref() else {
            command.responder.error(CommandError::no_activity());
            return;
        };

        let statuses: Map<String, Value> = status_set(&self.profile)
            .into_iter()
            .map(|c| (c.name().to_owned(), Value::Bool(oracle.is_granted(c))))
            .collect();
        command.responder.success(statuses);
    }

    fn request_grants(&mut self, command: Command) {
        let Some(oracle) = self.host.clone() else {
            command.responder.error(CommandError::no_activity());
            return;
        };

        let missing: Vec<Capability> = status_set(&self.profile)
            .into_iter()
            .filter(|c| !oracle.is_granted(*c))
            .collect();

        if missing.is_empty() {
            command
                .responder
                .success(json!({ "status": "All permissions already granted" }));
            return;
        }

        self.suspend(
            PendingClass::ExplicitGrantRequest,
            command,
            oracle.as_ref(),
            missing,
        );
    }

    /// Park `command` and prompt the host. A command already waiting in the
    /// same register is dropped unanswered; its caller sees a closed channel.
    fn suspend(
        &mut self,
        class: PendingClass,
        command: Command,
        oracle: &dyn PermissionOracle,
        requested: Vec<Capability>,
    ) {
        let correlation = self.next_correlation();
        info!(
            command = %command.id,
            name = %command.name,
            %correlation,
            capabilities = ?requested,
            "suspending until capabilities are granted"
        );

        let op = PendingOperation {
            correlation,
            requested: requested.clone(),
            command,
            suspended_at: Utc::now(),
        };
        if let Some(displaced) = self.slots.store(class, op) {
            warn!(
                ?class,
                command = %displaced.command.id,
                correlation = %displaced.correlation,
                "pending command replaced before its grant arrived"
            );
        }

        oracle.request_grant(&requested, correlation);
    }

    fn next_correlation(&mut self) -> CorrelationId {
        self.last_correlation = self.last_correlation.next();
        self.last_correlation
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("profile", &self.profile)
            .field("host_attached", &self.host.is_some())
            .field("pending", &self.slots.len())
            .finish_non_exhaustive()
    }
}
