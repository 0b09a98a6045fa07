// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload shaping applied before the text reaches the driver.

use bonprint_core::types::PrintOptions;

/// Millimetres of paper advanced by one blank line.
pub const MM_PER_FEED_LINE: i64 = 4;

/// Longest feed honoured, one metre of paper. Larger requests are clamped.
pub const MAX_FEED_MM: i64 = 1000;

/// Append feed lines and the auto-cut line break to the caller's payload.
///
/// `floor(mm_feed_paper / 4)` blank lines are appended when a positive feed
/// was requested (at most [`MAX_FEED_MM`] worth), then one more line break
/// when `auto_cut` is set.
/// `open_cashbox` has no effect on the payload: no drawer-kick command is
/// emitted.
pub fn format_payload(options: &PrintOptions) -> String {
    let mut formatted = options.payload.clone();

    if options.mm_feed_paper > 0 {
        let lines = (options.mm_feed_paper.min(MAX_FEED_MM) / MM_PER_FEED_LINE) as usize;
        formatted.push_str(&"\n".repeat(lines));
    }

    if options.auto_cut {
        formatted.push('\n');
    }

    formatted
}
