//! Registered client logins
//!
//! Registration is independent of accounts: an account only appears once an
//! order for the client is credited.

use dashmap::DashMap;
use tracing::debug;

use crate::types::{ClientId, LoyaltyError};

/// Set of taken client logins
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, ()>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Register a login
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The login was free and is now taken
    /// * `Err(LoyaltyError::InvalidInput)` - The login is empty or whitespace
    /// * `Err(LoyaltyError::Conflict)` - Someone already registered it
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::ClientRegistry;
    ///
    /// let registry = ClientRegistry::new();
    /// assert!(registry.register("alice").is_ok());
    /// assert!(registry.register("alice").is_err());
    /// assert!(registry.register("  ").is_err());
    /// assert!(registry.contains("alice"));
    /// ```
    pub fn register(&self, login: &str) -> Result<(), LoyaltyError> {
        if login.trim().is_empty() {
            return Err(LoyaltyError::invalid_input("login", "must not be empty"));
        }

        let mut inserted = false;
        self.clients.entry(login.to_string()).or_insert_with(|| {
            inserted = true;
        });

        if !inserted {
            return Err(LoyaltyError::conflict("client", login));
        }
        debug!(login, "Client registered");
        Ok(())
    }

    pub fn contains(&self, login: &str) -> bool {
        self.clients.contains_key(login)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
