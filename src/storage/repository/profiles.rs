// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Merchant profile repository.
//!
//! Profiles are keyed by lowercase wallet address. The merchant id index
//! (`merchant_ids`) is written in the same redb transaction as the profile,
//! so an id is never handed out twice.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{DbError, DbResult, GatewayDatabase, MERCHANT_IDS, PROFILES};
use crate::storage::merchant_id::generate_merchant_id;
use crate::yield_opt::RiskTolerance;

/// Stored merchant profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MerchantProfile {
    /// Owner wallet, lowercase
    pub wallet_address: String,
    /// Public merchant id (`HT-###`)
    pub merchant_id: String,
    /// Custodial settlement wallet id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_wallet_id: Option<String>,
    /// Custodial settlement wallet address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_wallet_address: Option<String>,
    pub business_name: String,
    pub business_email: String,
    pub business_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub yield_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MerchantProfile {
    /// Address payments settle to: the custodial wallet when provisioned,
    /// otherwise the merchant's own wallet.
    pub fn settlement_address(&self) -> &str {
        self.circle_wallet_address
            .as_deref()
            .unwrap_or(&self.wallet_address)
    }
}

/// Onboarding input.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub wallet_address: String,
    pub business_name: String,
    pub business_email: String,
    pub business_type: String,
    pub website: Option<String>,
    pub country: Option<String>,
    pub risk_tolerance: RiskTolerance,
    pub yield_enabled: bool,
}

/// Settings update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub business_name: Option<String>,
    pub business_email: Option<String>,
    pub business_type: Option<String>,
    pub website: Option<String>,
    pub country: Option<String>,
    pub risk_tolerance: Option<RiskTolerance>,
    pub yield_enabled: Option<bool>,
}

impl ProfileUpdate {
    fn apply(self, profile: &mut MerchantProfile) {
        if let Some(v) = self.business_name {
            profile.business_name = v;
        }
        if let Some(v) = self.business_email {
            profile.business_email = v;
        }
        if let Some(v) = self.business_type {
            profile.business_type = v;
        }
        if let Some(v) = self.website {
            profile.website = Some(v);
        }
        if let Some(v) = self.country {
            profile.country = Some(v);
        }
        if let Some(v) = self.risk_tolerance {
            profile.risk_tolerance = v;
        }
        if let Some(v) = self.yield_enabled {
            profile.yield_enabled = v;
        }
    }
}

/// Repository for merchant profiles.
pub struct ProfileRepository<'a> {
    db: &'a GatewayDatabase,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(db: &'a GatewayDatabase) -> Self {
        Self { db }
    }

    /// Look up a profile by wallet address (any case).
    pub fn get(&self, wallet_address: &str) -> DbResult<Option<MerchantProfile>> {
        let key = wallet_address.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROFILES)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up an active profile by its public merchant id.
    pub fn get_by_merchant_id(&self, merchant_id: &str) -> DbResult<Option<MerchantProfile>> {
        let wallet = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(MERCHANT_IDS)?;
            match table.get(merchant_id)? {
                Some(v) => v.value().to_string(),
                None => return Ok(None),
            }
        };
        Ok(self.get(&wallet)?.filter(|p| p.is_active))
    }

    /// Whether a merchant id is already assigned.
    pub fn merchant_id_taken(&self, merchant_id: &str) -> DbResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MERCHANT_IDS)?;
        Ok(table.get(merchant_id)?.is_some())
    }

    /// Create a profile with a freshly generated merchant id.
    ///
    /// Fails with `AlreadyExists` when the wallet already has a profile and
    /// with `MerchantIdExhausted` when every draw collided.
    pub fn create<D>(&self, new: NewProfile, draw: D) -> DbResult<MerchantProfile>
    where
        D: FnMut() -> u32,
    {
        let wallet = new.wallet_address.to_lowercase();
        let write_txn = self.db.begin_write()?;
        let profile = {
            let mut profiles = write_txn.open_table(PROFILES)?;
            if profiles.get(wallet.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!("Merchant {wallet}")));
            }

            let mut ids = write_txn.open_table(MERCHANT_IDS)?;
            let merchant_id =
                generate_merchant_id(draw, |candidate| Ok(ids.get(candidate)?.is_some()))?;

            let now = Utc::now();
            let profile = MerchantProfile {
                wallet_address: wallet.clone(),
                merchant_id,
                circle_wallet_id: None,
                circle_wallet_address: None,
                business_name: new.business_name,
                business_email: new.business_email,
                business_type: new.business_type,
                website: new.website,
                country: new.country,
                risk_tolerance: new.risk_tolerance,
                yield_enabled: new.yield_enabled,
                is_active: true,
                created_at: now,
                updated_at: now,
            };

            let json = serde_json::to_vec(&profile)?;
            profiles.insert(wallet.as_str(), json.as_slice())?;
            ids.insert(profile.merchant_id.as_str(), wallet.as_str())?;
            profile
        };
        write_txn.commit()?;
        Ok(profile)
    }

    /// Apply a settings update.
    pub fn update(&self, wallet_address: &str, update: ProfileUpdate) -> DbResult<MerchantProfile> {
        self.modify(wallet_address, |profile| {
            update.apply(profile);
            Ok(())
        })
    }

    /// Record the provisioned custodial wallet.
    ///
    /// A profile links at most one wallet: recording a different wallet id
    /// over an existing one fails with `AlreadyExists`, while repeating the
    /// stored id is a no-op success.
    pub fn set_circle_wallet(
        &self,
        wallet_address: &str,
        wallet_id: &str,
        address: &str,
    ) -> DbResult<MerchantProfile> {
        self.modify(wallet_address, |profile| {
            match profile.circle_wallet_id.as_deref() {
                Some(existing) if existing != wallet_id => {
                    return Err(DbError::AlreadyExists(format!(
                        "Custodial wallet for {}",
                        profile.wallet_address
                    )));
                }
                _ => {}
            }
            profile.circle_wallet_id = Some(wallet_id.to_string());
            profile.circle_wallet_address = Some(address.to_string());
            Ok(())
        })
    }

    /// Soft-deactivate. The row and merchant id stay reserved.
    pub fn deactivate(&self, wallet_address: &str) -> DbResult<MerchantProfile> {
        self.modify(wallet_address, |profile| {
            profile.is_active = false;
            Ok(())
        })
    }

    /// Read-modify-write one profile inside a single write transaction.
    /// An error from `change` aborts without writing.
    fn modify<F>(&self, wallet_address: &str, change: F) -> DbResult<MerchantProfile>
    where
        F: FnOnce(&mut MerchantProfile) -> DbResult<()>,
    {
        let key = wallet_address.to_lowercase();
        let write_txn = self.db.begin_write()?;
        let profile = {
            let mut table = write_txn.open_table(PROFILES)?;

            let existing_bytes = {
                let existing = table
                    .get(key.as_str())?
                    .ok_or_else(|| DbError::NotFound(format!("Merchant {key}")))?;
                existing.value().to_vec()
            };

            let mut profile: MerchantProfile = serde_json::from_slice(&existing_bytes)?;
            change(&mut profile)?;
            profile.updated_at = Utc::now();

            let json = serde_json::to_vec(&profile)?;
            table.insert(key.as_str(), json.as_slice())?;
            profile
        };
        write_txn.commit()?;
        Ok(profile)
    }
}
