// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Merchant id generation.
//!
//! Ids are `HT-` followed by three zero-padded digits, so the space holds
//! 1000 ids. A collision triggers a fresh draw, up to
//! [`MAX_MERCHANT_ID_ATTEMPTS`] draws in total.

use k256::elliptic_curve::rand_core::{OsRng, RngCore};

use super::database::{DbError, DbResult};

pub const MERCHANT_ID_PREFIX: &str = "HT-";
pub const MERCHANT_ID_SPACE: u32 = 1000;
pub const MAX_MERCHANT_ID_ATTEMPTS: u32 = 10;

/// Format a draw in `0..1000` as a merchant id.
pub fn format_merchant_id(draw: u32) -> String {
    format!("{MERCHANT_ID_PREFIX}{:03}", draw % MERCHANT_ID_SPACE)
}

/// Whether `value` has the `HT-###` shape.
pub fn is_valid_merchant_id(value: &str) -> bool {
    value
        .strip_prefix(MERCHANT_ID_PREFIX)
        .is_some_and(|digits| digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Uniform draw from the OS RNG.
pub fn random_draw() -> u32 {
    // Rejection sampling keeps the draw uniform over 0..1000.
    let zone = u32::MAX - (u32::MAX % MERCHANT_ID_SPACE);
    loop {
        let value = OsRng.next_u32();
        if value < zone {
            return value % MERCHANT_ID_SPACE;
        }
    }
}

/// Produce an id for which `is_taken` returns `false`.
///
/// `draw` supplies candidate numbers; tests inject a deterministic sequence.
pub fn generate_merchant_id<D, T>(mut draw: D, mut is_taken: T) -> DbResult<String>
where
    D: FnMut() -> u32,
    T: FnMut(&str) -> DbResult<bool>,
{
    for attempt in 1..=MAX_MERCHANT_ID_ATTEMPTS {
        let candidate = format_merchant_id(draw());
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(candidate = %candidate, attempt, "Merchant id collision");
    }
    Err(DbError::MerchantIdExhausted(MAX_MERCHANT_ID_ATTEMPTS))
}
