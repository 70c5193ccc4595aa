//! Reward mechanic registry
//!
//! Mechanics are keyed by their match key in a `DashMap`. Registration is an
//! atomic insert-if-absent, so concurrent registrations of the same key yield
//! exactly one success. Mechanics are immutable and never removed, which
//! means a snapshot taken by iterating the map always contains every
//! registration that returned before the snapshot began, and never a
//! half-written mechanic.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::{LoyaltyError, Mechanic, MechanicRequest};

/// Point-in-time view of the registered mechanics, keyed by match key
pub type MechanicSnapshot = Arc<HashMap<String, Mechanic>>;

/// Registered mechanics, keyed by match key
#[derive(Debug, Default)]
pub struct MechanicRegistry {
    mechanics: DashMap<String, Mechanic>,
}

impl MechanicRegistry {
    pub fn new() -> Self {
        Self {
            mechanics: DashMap::new(),
        }
    }

    /// Validate and register a mechanic
    ///
    /// # Returns
    ///
    /// * `Ok(Mechanic)` - The registered mechanic, visible to every later snapshot
    /// * `Err(LoyaltyError::InvalidInput)` - A field failed validation; nothing was stored
    /// * `Err(LoyaltyError::Conflict)` - The match key is already registered
    pub fn register(&self, request: MechanicRequest) -> Result<Mechanic, LoyaltyError> {
        let mechanic = Mechanic::try_from(request)?;

        let mut inserted = false;
        self.mechanics
            .entry(mechanic.match_key.clone())
            .or_insert_with(|| {
                inserted = true;
                mechanic.clone()
            });

        if !inserted {
            return Err(LoyaltyError::conflict("mechanic", &mechanic.match_key));
        }

        debug!(
            match_key = %mechanic.match_key,
            reward_type = %mechanic.reward_type,
            reward = %mechanic.reward,
            "Mechanic registered"
        );
        Ok(mechanic)
    }

    /// Look up a mechanic by its exact match key
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::MechanicRegistry;
    /// use loyalty_engine::types::{MechanicRequest, RewardType};
    /// use rust_decimal::Decimal;
    ///
    /// let registry = MechanicRegistry::new();
    /// registry
    ///     .register(MechanicRequest::new("sku1", "pt", Decimal::TEN))
    ///     .unwrap();
    ///
    /// assert_eq!(registry.get("sku1").unwrap().reward_type, RewardType::Points);
    /// assert!(registry.get("SKU1").is_none());
    /// assert_eq!(registry.len(), 1);
    /// ```
    pub fn get(&self, match_key: &str) -> Option<Mechanic> {
        self.mechanics.get(match_key).map(|entry| entry.value().clone())
    }

    /// Copy of every registered mechanic
    ///
    /// # Returns
    ///
    /// A map holding each registration that returned before this call, and
    /// possibly some that completed during it. Later registrations never
    /// change a snapshot already taken.
    pub fn snapshot(&self) -> MechanicSnapshot {
        Arc::new(
            self.mechanics
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        )
    }

    /// Number of registered mechanics
    pub fn len(&self) -> usize {
        self.mechanics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mechanics.is_empty()
    }
}
