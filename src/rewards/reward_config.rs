use crate::constants::{DEFAULT_CREDIT_VALUE_CENTS, DEFAULT_REWARD_UNIT, DEFAULT_REWARD_UNIT_AMOUNT};
use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};

/// How much a single rewarded organisation access is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Credits per rewarded access
    pub unit_amount: u64,
    /// Name of the credit unit stored on each reward row
    pub unit: String,
    /// Monetary value of one credit, used for display only
    pub credit_value_cents: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            unit_amount: DEFAULT_REWARD_UNIT_AMOUNT,
            unit: DEFAULT_REWARD_UNIT.to_string(),
            credit_value_cents: DEFAULT_CREDIT_VALUE_CENTS,
        }
    }
}

impl RewardConfig {
    /// Creates a new `RewardConfig`
    ///
    /// # Errors
    ///
    /// Returns an Error if:
    /// - The unit amount is 0
    /// - The unit name is empty
    pub fn new(unit_amount: u64, unit: &str, credit_value_cents: u64) -> VaultResult<Self> {
        let config = Self {
            unit_amount,
            unit: unit.trim().to_string(),
            credit_value_cents,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.unit_amount == 0 {
            return Err(VaultError::Config(
                "Reward unit amount must be greater than 0".to_string(),
            ));
        }
        if self.unit.trim().is_empty() {
            return Err(VaultError::Config("Reward unit cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Monetary value of `credits`, in cents.
    pub fn value_cents(&self, credits: u64) -> u64 {
        credits.saturating_mul(self.credit_value_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(RewardConfig::new(0, "credit", 10).is_err());
        assert!(RewardConfig::new(1, "  ", 10).is_err());
        let config = RewardConfig::new(2, " credit ", 10).unwrap();
        assert_eq!(config.unit, "credit");
    }

    #[test]
    fn test_value_cents() {
        let config = RewardConfig::default();
        assert_eq!(config.value_cents(0), 0);
        assert_eq!(config.value_cents(7), 70);
    }
}
