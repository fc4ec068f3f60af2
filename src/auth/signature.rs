// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! EIP-191 `personal_sign` verification.

use std::str::FromStr;

use alloy::primitives::{Address, Signature};

use super::AuthError;

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(value: &str) -> Result<Address, AuthError> {
    let trimmed = value.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(AuthError::InvalidAddress);
    }
    Address::from_str(trimmed).map_err(|_| AuthError::InvalidAddress)
}

/// Recover the signer of a `personal_sign` message.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, AuthError> {
    let signature =
        Signature::from_str(signature.trim()).map_err(|_| AuthError::InvalidSignature)?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| AuthError::InvalidSignature)
}

/// Check that `signature` over `message` was produced by `expected`.
pub fn verify_signer(message: &str, signature: &str, expected: Address) -> Result<(), AuthError> {
    let recovered = recover_signer(message, signature)?;
    if recovered != expected {
        tracing::debug!(
            expected = %expected,
            recovered = %recovered,
            "Signature recovered to a different address"
        );
        return Err(AuthError::AddressMismatch);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;

    pub(crate) fn sign(signer: &PrivateKeySigner, message: &str) -> String {
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        alloy::hex::encode_prefixed(signature.as_bytes())
    }

    #[test]
    fn recovers_the_signing_wallet() {
        let signer = PrivateKeySigner::random();
        let signature = sign(&signer, "hello hati");

        assert_eq!(recover_signer("hello hati", &signature).unwrap(), signer.address());
        verify_signer("hello hati", &signature, signer.address()).unwrap();
    }

    #[test]
    fn other_wallet_is_a_mismatch() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let signature = sign(&signer, "hello hati");

        assert!(matches!(
            verify_signer("hello hati", &signature, other.address()),
            Err(AuthError::AddressMismatch)
        ));
    }

    #[test]
    fn altered_message_does_not_verify() {
        let signer = PrivateKeySigner::random();
        let signature = sign(&signer, "pay 10");
        assert!(verify_signer("pay 1000", &signature, signer.address()).is_err());
    }

    #[test]
    fn garbage_signature_is_invalid() {
        assert!(matches!(
            recover_signer("msg", "0x1234"),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn address_parsing_accepts_any_case() {
        let lower = parse_address("0xabcdef0000000000000000000000000000000001").unwrap();
        let upper = parse_address("0xABCDEF0000000000000000000000000000000001").unwrap();
        assert_eq!(lower, upper);
        assert!(parse_address("abcdef0000000000000000000000000000000001").is_err());
        assert!(parse_address("0x1234").is_err());
    }
}
