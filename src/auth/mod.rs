// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! # Authentication Module
//!
//! Merchants sign in with their wallet; there are no passwords.
//!
//! ## Auth Flow
//!
//! 1. Client requests `GET /v1/auth/challenge?address=0x...`
//! 2. Wallet signs the challenge text with `personal_sign` (EIP-191)
//! 3. `POST /v1/auth/verify` recovers the signer, checks it against the
//!    address, and issues an opaque bearer token
//! 4. Later requests send `Authorization: Bearer <token>`
//!
//! ## Sessions
//!
//! - Only the HMAC of a token is stored
//! - Signing in again deletes the wallet's earlier sessions
//! - Expiry is checked on every read; expired rows count as absent

pub mod challenge;
pub mod error;
pub mod extractor;
pub mod session;
pub mod signature;

pub use challenge::{Challenge, ChallengeIssuer, CHALLENGE_TTL_SECS};
pub use error::AuthError;
pub use extractor::{bearer_token, AuthenticatedMerchant, MerchantAuth};
pub use session::{generate_token, new_session, TokenHasher};
pub use signature::{parse_address, recover_signer, verify_signer};
