//! Orchestrator configuration
//!
//! [`Configuration`] is the immutable identity of one orchestrator instance. It is
//! produced either programmatically through the [`Settings`] builder or from a TOML
//! file through [`SettingsInput`].

use std::path::Path;

use alloy_primitives::{Address, U256};
use serde::Deserialize;

use crate::utils::{
    common::{nat_to_u256, string_to_address},
    error::{OrchestratorError, OrchestratorResult},
};

/// Immutable identity of the orchestrator. None of the four addresses is ever null.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Configuration {
    protocol: Address,
    collateral_asset: Address,
    borrow_asset: Address,
    owner: Address,
}

impl Configuration {
    pub fn new(
        protocol: Address,
        collateral_asset: Address,
        borrow_asset: Address,
        owner: Address,
    ) -> OrchestratorResult<Self> {
        for (field, address) in [
            ("protocolAddress", protocol),
            ("collateralAsset", collateral_asset),
            ("borrowAsset", borrow_asset),
            ("owner", owner),
        ] {
            if address.is_zero() {
                return Err(OrchestratorError::InvalidAddress(field));
            }
        }

        Ok(Self {
            protocol,
            collateral_asset,
            borrow_asset,
            owner,
        })
    }

    /// Lending protocol contract address
    pub fn protocol(&self) -> Address {
        self.protocol
    }

    /// Asset flash-borrowed and pledged as collateral
    pub fn collateral_asset(&self) -> Address {
        self.collateral_asset
    }

    /// Asset borrowed against the collateral and dispatched to the executor
    pub fn borrow_asset(&self) -> Address {
        self.borrow_asset
    }

    /// Owning principal
    pub fn owner(&self) -> Address {
        self.owner
    }
}

/// Settings builder
/// Every field starts out null; `build` refuses to produce a configuration until all are set.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    /// Lending protocol contract address
    pub protocol: Address,
    /// Collateral asset address
    pub collateral_asset: Address,
    /// Borrow asset address
    pub borrow_asset: Address,
    /// Owner address
    pub owner: Address,
    /// Initial profit threshold
    pub profit_threshold: U256,
    /// Default log filter directive
    pub log_level: Option<String>,
}

impl Settings {
    /// Sets the lending protocol address.
    pub fn protocol(&mut self, protocol: Address) -> &mut Self {
        self.protocol = protocol;
        self
    }

    /// Sets the collateral asset address.
    pub fn collateral_asset(&mut self, collateral_asset: Address) -> &mut Self {
        self.collateral_asset = collateral_asset;
        self
    }

    /// Sets the borrow asset address.
    pub fn borrow_asset(&mut self, borrow_asset: Address) -> &mut Self {
        self.borrow_asset = borrow_asset;
        self
    }

    /// Sets the owner address.
    pub fn owner(&mut self, owner: Address) -> &mut Self {
        self.owner = owner;
        self
    }

    /// Sets the initial profit threshold.
    pub fn profit_threshold(&mut self, profit_threshold: U256) -> &mut Self {
        self.profit_threshold = profit_threshold;
        self
    }

    /// Sets the default log filter.
    pub fn log_level<S: AsRef<str>>(&mut self, log_level: S) -> &mut Self {
        self.log_level = Some(log_level.as_ref().to_string());
        self
    }

    /// Validates the addresses and freezes them into a [`Configuration`].
    pub fn build(&self) -> OrchestratorResult<Configuration> {
        Configuration::new(
            self.protocol,
            self.collateral_asset,
            self.borrow_asset,
            self.owner,
        )
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(text: &str) -> OrchestratorResult<Self> {
        let input: SettingsInput =
            toml::from_str(text).map_err(|err| OrchestratorError::Config(err.to_string()))?;
        input.try_into()
    }

    /// Reads and parses a TOML settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> OrchestratorResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            OrchestratorError::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Self::from_toml_str(&text)
    }
}

/// On-disk settings, addresses and amounts as strings
#[derive(Clone, Debug, Deserialize)]
pub struct SettingsInput {
    pub protocol: String,
    pub collateral_asset: String,
    pub borrow_asset: String,
    pub owner: String,
    /// Decimal amount in borrow-asset base units
    pub profit_threshold: Option<String>,
    pub log_level: Option<String>,
}

impl TryFrom<SettingsInput> for Settings {
    type Error = OrchestratorError;

    fn try_from(value: SettingsInput) -> Result<Self, Self::Error> {
        let profit_threshold = match value.profit_threshold {
            Some(raw) => {
                let nat = raw
                    .replace('_', "")
                    .parse::<candid::Nat>()
                    .map_err(|err| OrchestratorError::Config(format!("{:#?}", err)))?;
                nat_to_u256(&nat)?
            }
            None => U256::ZERO,
        };

        let settings = Self {
            protocol: string_to_address(&value.protocol)?,
            collateral_asset: string_to_address(&value.collateral_asset)?,
            borrow_asset: string_to_address(&value.borrow_asset)?,
            owner: string_to_address(&value.owner)?,
            profit_threshold,
            log_level: value.log_level,
        };
        // A null address is rejected at load time, not at first use
        settings.build()?;
        Ok(settings)
    }
}
