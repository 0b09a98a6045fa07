// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inbound commands and their single-use response channels.

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use bonprint_core::outcome::{CommandError, Outcome};
use bonprint_core::types::{Arguments, CommandId, CommandName};

/// Single-use sink for a command's terminal outcome.
///
/// Every terminal method takes `self`, so a responder can be written at most
/// once. Dropping it unwritten closes the channel: the caller's receiver
/// then yields `RecvError` instead of a value.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Outcome>,
}

impl Responder {
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn send(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            debug!("caller dropped its response channel before the outcome arrived");
        }
    }

    pub fn success(self, value: impl Into<Value>) {
        self.send(Outcome::Success(value.into()));
    }

    pub fn error(self, error: CommandError) {
        self.send(Outcome::Error(error));
    }

    pub fn not_implemented(self) {
        self.send(Outcome::NotImplemented);
    }

    /// Deliver a `Result`-shaped outcome.
    pub fn complete(self, result: Result<Value, CommandError>) {
        match result {
            Ok(value) => self.success(value),
            Err(error) => self.error(error),
        }
    }
}

/// A command with its arguments and the channel to answer on.
#[derive(Debug)]
pub struct Command {
    pub id: CommandId,
    pub name: CommandName,
    pub arguments: Arguments,
    pub responder: Responder,
}

impl Command {
    pub fn new(name: CommandName, arguments: Arguments, responder: Responder) -> Self {
        Self {
            id: CommandId::new(),
            name,
            arguments,
            responder,
        }
    }

    /// Build a command together with the receiver its outcome arrives on.
    pub fn with_channel(
        name: CommandName,
        arguments: Arguments,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let (responder, rx) = Responder::channel();
        (Self::new(name, arguments, responder), rx)
    }
}
