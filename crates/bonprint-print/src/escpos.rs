// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal ESC/POS text driver.
//
// Understands the small markup most receipt payloads use: a leading
// `[L]`, `[C]` or `[R]` per line for alignment and `<b>`/`<u>` toggles for
// emphasis. Everything else is printed verbatim as UTF-8 and hard-wrapped
// at the configured characters per line. Each job ends with a 20 mm feed
// and a partial cut.

use tracing::{info, instrument};

use bonprint_core::error::Result;
use bonprint_core::types::PrinterSize;

use crate::connection::PrinterConnection;

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Paper advanced before the cut.
const CUT_FEED_MM: f32 = 20.0;

/// Horizontal alignment selected with `ESC a n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Inline style tags and the `ESC` command byte they toggle.
const STYLE_TAGS: [(&str, u8, bool); 4] = [
    ("<b>", b'E', true),
    ("</b>", b'E', false),
    ("<u>", b'-', true),
    ("</u>", b'-', false),
];

/// A printer handle bound to one transport.
#[derive(Debug)]
pub struct EscPosPrinter {
    connection: PrinterConnection,
    size: PrinterSize,
}

impl EscPosPrinter {
    pub fn new(connection: PrinterConnection, size: PrinterSize) -> Self {
        Self { connection, size }
    }

    /// Encode `text`, send it, feed, and cut. Consumes the handle; the
    /// transport is closed afterwards.
    #[instrument(skip_all, fields(chars = text.len(), dpi = self.size.dpi))]
    pub async fn print_formatted_text_and_cut(self, text: &str) -> Result<()> {
        let bytes = encode_formatted_text_and_cut(text, &self.size);
        info!(bytes = bytes.len(), "sending ESC/POS job");
        self.connection.send(bytes).await
    }
}

/// Encode a formatted payload into ESC/POS bytes, ending with feed and cut.
pub fn encode_formatted_text_and_cut(text: &str, size: &PrinterSize) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 32);

    // ESC @: initialise.
    out.extend_from_slice(&[ESC, b'@']);

    // GS W nL nH: printable area width in dots.
    let width = size.width_dots().min(u16::MAX as u32) as u16;
    let [lo, hi] = width.to_le_bytes();
    out.extend_from_slice(&[GS, b'W', lo, hi]);

    for line in text.split('\n') {
        encode_line(&mut out, line, size.chars_per_line as usize);
    }

    // ESC J n feeds n dots, then GS V 1 makes a partial cut.
    let feed_dots = (CUT_FEED_MM / 25.4 * size.dpi as f32).round().clamp(0.0, 255.0) as u8;
    out.extend_from_slice(&[ESC, b'J', feed_dots]);
    out.extend_from_slice(&[GS, b'V', 1]);
    out
}

fn encode_line(out: &mut Vec<u8>, line: &str, chars_per_line: usize) {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (align, mut rest) = split_alignment(line);
    out.extend_from_slice(&[ESC, b'a', align as u8]);

    let mut active: Vec<u8> = Vec::new();
    let mut column = 0usize;

    while !rest.is_empty() {
        if let Some((command, on, tail)) = STYLE_TAGS
            .iter()
            .find_map(|(tag, command, on)| rest.strip_prefix(*tag).map(|t| (*command, *on, t)))
        {
            out.extend_from_slice(&[ESC, command, on as u8]);
            active.retain(|c| *c != command);
            if on {
                active.push(command);
            }
            rest = tail;
            continue;
        }

        let Some(ch) = rest.chars().next() else { break };
        rest = &rest[ch.len_utf8()..];

        if chars_per_line > 0 && column == chars_per_line {
            out.push(LF);
            column = 0;
        }
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        column += 1;
    }

    // Styles never leak into the next line.
    for command in active {
        out.extend_from_slice(&[ESC, command, 0]);
    }
    out.push(LF);
}

fn split_alignment(line: &str) -> (Align, &str) {
    if let Some(rest) = line.strip_prefix("[L]") {
        (Align::Left, rest)
    } else if let Some(rest) = line.strip_prefix("[C]") {
        (Align::Center, rest)
    } else if let Some(rest) = line.strip_prefix("[R]") {
        (Align::Right, rest)
    } else {
        (Align::Left, line)
    }
}
