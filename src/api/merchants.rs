// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Merchant onboarding, settings and public lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{active_profile, refresh_sessions};
use crate::auth::MerchantAuth;
use crate::error::ApiError;
use crate::providers::wallet_idempotency_key;
use crate::state::AppState;
use crate::storage::{
    random_draw, with_retry, MerchantProfile, NewProfile, ProfileRepository, ProfileUpdate,
};
use crate::yield_opt::RiskTolerance;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OnboardingRequest {
    pub business_name: String,
    pub business_email: String,
    pub business_type: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub yield_enabled: bool,
}

/// What a payer sees before paying a merchant.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicMerchant {
    pub merchant_id: String,
    pub business_name: String,
    /// Where bridged USDC lands
    pub settlement_address: String,
    pub settlement_network: String,
    pub settlement_chain_id: u64,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("business_email is not a valid email address")),
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

/// Complete onboarding for the signed-in wallet.
///
/// Provisions a Circle wallet when the vendor is configured. Provisioning and
/// yield setup failures are logged and do not fail onboarding.
#[utoipa::path(
    post,
    path = "/v1/merchants",
    tag = "Merchants",
    request_body = OnboardingRequest,
    responses(
        (status = 201, description = "Profile created", body = MerchantProfile),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Wallet already onboarded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn onboard(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Json(request): Json<OnboardingRequest>,
) -> Result<(StatusCode, Json<MerchantProfile>), ApiError> {
    require_text("business_name", &request.business_name)?;
    require_text("business_type", &request.business_type)?;
    validate_email(&request.business_email)?;

    let new = NewProfile {
        wallet_address: merchant.wallet_address.clone(),
        business_name: request.business_name.trim().to_string(),
        business_email: request.business_email.trim().to_string(),
        business_type: request.business_type.trim().to_string(),
        website: request.website,
        country: request.country,
        risk_tolerance: request.risk_tolerance,
        yield_enabled: request.yield_enabled,
    };

    let repo = ProfileRepository::new(&state.db);
    let profile = with_retry(state.retry, || repo.create(new.clone(), random_draw)).await?;
    info!(
        wallet_address = %profile.wallet_address,
        merchant_id = %profile.merchant_id,
        "Merchant onboarded"
    );

    // The profile is committed; everything below is best effort.
    let profile = provision_custodial_wallet(&state, profile).await;
    if let Err(e) = refresh_sessions(&state, &profile).await {
        warn!(
            wallet_address = %profile.wallet_address,
            error = %e.message,
            "Session refresh after onboarding failed"
        );
    }

    if profile.yield_enabled {
        start_yield(&state, &profile).await;
    }

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Create and link a custodial wallet for a freshly onboarded merchant.
///
/// Failures are logged and the profile is returned as it was.
async fn provision_custodial_wallet(state: &AppState, profile: MerchantProfile) -> MerchantProfile {
    let Some(wallets) = &state.wallets else {
        return profile;
    };
    let wallet = match wallets
        .create_wallet(&wallet_idempotency_key(&profile.wallet_address))
        .await
    {
        Ok(wallet) => wallet,
        Err(e) => {
            warn!(
                wallet_address = %profile.wallet_address,
                error = %e,
                "Circle wallet provisioning failed; continuing without custodial wallet"
            );
            return profile;
        }
    };

    let repo = ProfileRepository::new(&state.db);
    let linked = with_retry(state.retry, || {
        repo.set_circle_wallet(&profile.wallet_address, &wallet.wallet_id, &wallet.address)
    })
    .await;
    match linked {
        Ok(updated) => updated,
        Err(e) => {
            warn!(
                wallet_address = %profile.wallet_address,
                wallet_id = %wallet.wallet_id,
                error = %e,
                "Circle wallet created but not linked"
            );
            profile
        }
    }
}

/// Kick off yield allocation for a new merchant's settlement balance.
async fn start_yield(state: &AppState, profile: &MerchantProfile) {
    let Some(settlement) = &state.settlement else {
        return;
    };
    let balance = match settlement.usdc_balance(profile.settlement_address()).await {
        Ok(balance) => balance.as_f64(),
        Err(e) => {
            warn!(wallet_address = %profile.wallet_address, error = %e, "Yield setup skipped");
            return;
        }
    };
    if !state.yield_optimizer.eligibility(balance).eligible {
        return;
    }

    let optimizer = state.yield_optimizer.clone();
    let risk = profile.risk_tolerance;
    let wallet = profile.wallet_address.clone();
    tokio::spawn(async move {
        match optimizer.optimize(balance, risk).await {
            Ok(report) if report.success => {
                info!(wallet_address = %wallet, weighted_apy = report.plan.weighted_apy, "Yield allocated")
            }
            Ok(report) => warn!(wallet_address = %wallet, error = ?report.error, "Yield setup failed"),
            Err(e) => warn!(wallet_address = %wallet, error = %e, "Yield setup failed"),
        }
    });
}

/// Current merchant profile.
#[utoipa::path(
    get,
    path = "/v1/merchants/me",
    tag = "Merchants",
    responses(
        (status = 200, description = "Merchant profile", body = MerchantProfile),
        (status = 404, description = "Not onboarded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
) -> Result<Json<MerchantProfile>, ApiError> {
    ProfileRepository::new(&state.db)
        .get(&merchant.wallet_address)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Merchant profile not found"))
}

/// Update merchant settings.
#[utoipa::path(
    put,
    path = "/v1/merchants/me",
    tag = "Merchants",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = MerchantProfile),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Account deactivated"),
        (status = 404, description = "Not onboarded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<MerchantProfile>, ApiError> {
    if let Some(name) = &update.business_name {
        require_text("business_name", name)?;
    }
    if let Some(kind) = &update.business_type {
        require_text("business_type", kind)?;
    }
    if let Some(email) = &update.business_email {
        validate_email(email)?;
    }
    active_profile(&state, &merchant.wallet_address)?;

    let repo = ProfileRepository::new(&state.db);
    let profile =
        with_retry(state.retry, || repo.update(&merchant.wallet_address, update.clone())).await?;
    info!(wallet_address = %profile.wallet_address, "Merchant settings updated");
    Ok(Json(profile))
}

/// Deactivate the merchant account. The merchant id stays reserved.
#[utoipa::path(
    delete,
    path = "/v1/merchants/me",
    tag = "Merchants",
    responses(
        (status = 200, description = "Deactivated profile", body = MerchantProfile),
        (status = 404, description = "Not onboarded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn deactivate_me(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
) -> Result<Json<MerchantProfile>, ApiError> {
    let repo = ProfileRepository::new(&state.db);
    let profile = with_retry(state.retry, || repo.deactivate(&merchant.wallet_address)).await?;
    refresh_sessions(&state, &profile).await?;
    info!(
        wallet_address = %profile.wallet_address,
        merchant_id = %profile.merchant_id,
        "Merchant deactivated"
    );
    Ok(Json(profile))
}

/// Public merchant lookup for payment pages.
#[utoipa::path(
    get,
    path = "/v1/merchants/by-id/{merchant_id}",
    tag = "Merchants",
    params(("merchant_id" = String, Path, description = "Merchant id, e.g. HT-042")),
    responses(
        (status = 200, description = "Merchant found", body = PublicMerchant),
        (status = 400, description = "Malformed merchant id"),
        (status = 404, description = "Unknown or inactive merchant")
    )
)]
pub async fn get_by_merchant_id(
    State(state): State<AppState>,
    Path(merchant_id): Path<String>,
) -> Result<Json<PublicMerchant>, ApiError> {
    let profile = super::resolve_merchant(&state, &merchant_id)?;
    let network = state.settlement_network;
    Ok(Json(PublicMerchant {
        merchant_id: profile.merchant_id.clone(),
        business_name: profile.business_name.clone(),
        settlement_address: profile.settlement_address().to_string(),
        settlement_network: network.slug().to_string(),
        settlement_chain_id: network.config().chain_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        CustodialWallet, CustodialWallets, ProviderError, SignedTransaction, TokenBalance,
    };
    use crate::state::test_state;
    use crate::storage::is_valid_merchant_id;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    const WALLET: &str = "0x00000000000000000000000000000000000000aa";

    /// Hands out one fixed wallet and remembers the keys it was asked with.
    #[derive(Default)]
    struct FixedWallet {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CustodialWallets for FixedWallet {
        async fn create_wallet(&self, idempotency_key: &str) -> Result<CustodialWallet, ProviderError> {
            self.keys.lock().unwrap().push(idempotency_key.to_string());
            Ok(CustodialWallet {
                wallet_id: "w-1".into(),
                address: "0x00000000000000000000000000000000000000c1".into(),
                blockchain: "BASE-SEPOLIA".into(),
            })
        }

        async fn balances(&self, _wallet_id: &str) -> Result<Vec<TokenBalance>, ProviderError> {
            Ok(Vec::new())
        }

        async fn sign_transaction(
            &self,
            _wallet_id: &str,
            _transaction: &Value,
            _memo: Option<&str>,
        ) -> Result<SignedTransaction, ProviderError> {
            Err(ProviderError::NotConfigured("signing"))
        }
    }

    fn onboarded(state: &AppState) -> MerchantProfile {
        let new = NewProfile {
            wallet_address: WALLET.into(),
            business_name: "Corner Coffee".into(),
            business_email: "owner@corner.example".into(),
            business_type: "retail".into(),
            ..Default::default()
        };
        ProfileRepository::new(&state.db).create(new, || 7).unwrap()
    }

    #[tokio::test]
    async fn provisioning_links_wallet_with_merchant_key() {
        let (state, _dir) = test_state();
        let vendor = Arc::new(FixedWallet::default());
        let state = state.with_wallets(vendor.clone());
        let profile = onboarded(&state);

        let linked = provision_custodial_wallet(&state, profile).await;
        assert_eq!(linked.circle_wallet_id.as_deref(), Some("w-1"));
        assert_eq!(*vendor.keys.lock().unwrap(), vec![wallet_idempotency_key(WALLET)]);
    }

    #[tokio::test]
    async fn link_failure_after_onboarding_keeps_profile() {
        let (state, _dir) = test_state();
        let state = state.with_wallets(Arc::new(FixedWallet::default()));
        let profile = onboarded(&state);

        // A concurrent request already linked another wallet
        ProfileRepository::new(&state.db)
            .set_circle_wallet(WALLET, "w-0", "0x00000000000000000000000000000000000000c0")
            .unwrap();

        let returned = provision_custodial_wallet(&state, profile.clone()).await;
        assert_eq!(returned, profile);
        let stored = ProfileRepository::new(&state.db).get(WALLET).unwrap().unwrap();
        assert_eq!(stored.circle_wallet_id.as_deref(), Some("w-0"));
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("owner@shop.example").is_ok());
        assert!(validate_email("  owner@shop.io ").is_ok());
        assert!(validate_email("owner.shop.example").is_err());
        assert!(validate_email("@shop.example").is_err());
        assert!(validate_email("owner@localhost").is_err());
    }

    #[test]
    fn merchant_id_shape_is_checked_before_lookup() {
        assert!(is_valid_merchant_id("HT-007"));
        assert!(!is_valid_merchant_id("HT-7"));
    }
}
