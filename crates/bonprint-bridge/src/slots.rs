// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Registers for commands suspended while a grant prompt is on screen.

use chrono::{DateTime, Utc};

use bonprint_core::types::{Capability, CorrelationId};

use crate::response::Command;

/// Which register a suspended command occupies. Each class holds at most
/// one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingClass {
    Print,
    DeviceList,
    ExplicitGrantRequest,
}

impl PendingClass {
    /// Order in which registers are searched when an outcome arrives.
    pub const LOOKUP_ORDER: [PendingClass; 3] = [
        PendingClass::ExplicitGrantRequest,
        PendingClass::DeviceList,
        PendingClass::Print,
    ];
}

/// A command waiting for the user to answer a grant prompt.
#[derive(Debug)]
pub struct PendingOperation {
    pub correlation: CorrelationId,
    /// Capabilities asked for, in request order.
    pub requested: Vec<Capability>,
    pub command: Command,
    pub suspended_at: DateTime<Utc>,
}

/// The three registers. Owned by the dispatcher and only touched from the
/// service task; nothing here is synchronised.
#[derive(Debug, Default)]
pub struct PendingSlots {
    print: Option<PendingOperation>,
    device_list: Option<PendingOperation>,
    grant_request: Option<PendingOperation>,
}

impl PendingSlots {
    /// Park `op` in `class`, returning whatever it displaced.
    pub fn store(&mut self, class: PendingClass, op: PendingOperation) -> Option<PendingOperation> {
        self.slot_mut(class).replace(op)
    }

    /// Remove and return the operation waiting on `correlation`.
    pub fn take_matching(
        &mut self,
        correlation: CorrelationId,
    ) -> Option<(PendingClass, PendingOperation)> {
        PendingClass::LOOKUP_ORDER.into_iter().find_map(|class| {
            let slot = self.slot_mut(class);
            if slot.as_ref().is_some_and(|op| op.correlation == correlation) {
                slot.take().map(|op| (class, op))
            } else {
                None
            }
        })
    }

    pub fn is_occupied(&self, class: PendingClass) -> bool {
        self.slot(class).is_some()
    }

    pub fn get(&self, class: PendingClass) -> Option<&PendingOperation> {
        self.slot(class).as_ref()
    }

    /// Number of suspended commands.
    pub fn len(&self) -> usize {
        [&self.print, &self.device_list, &self.grant_request]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, class: PendingClass) -> &Option<PendingOperation> {
        match class {
            PendingClass::Print => &self.print,
            PendingClass::DeviceList => &self.device_list,
            PendingClass::ExplicitGrantRequest => &self.grant_request,
        }
    }

    fn slot_mut(&mut self, class: PendingClass) -> &mut Option<PendingOperation> {
        match class {
            PendingClass::Print => &mut self.print,
            PendingClass::DeviceList => &mut self.device_list,
            PendingClass::ExplicitGrantRequest => &mut self.grant_request,
        }
    }
}
