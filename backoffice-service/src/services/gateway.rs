//! Simulated payment gateway.
//!
//! Stands in for a real processor behind the same seam a production
//! client would occupy: charges and refunds go through `PaymentGateway`,
//! and nothing outside this module knows the outcome is synthesized.

use crate::config::GatewayConfig;
use rand::Rng;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Outcome of a gateway charge or refund attempt.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub reference: String,
    pub approved: bool,
}

#[derive(Clone)]
pub struct PaymentGateway {
    config: GatewayConfig,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Charge an amount. Declines are a normal outcome, not an error;
    /// `Err` is reserved for the gateway being unreachable, which the
    /// simulation never produces.
    pub async fn charge(
        &self,
        invoice_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<GatewayReceipt, AppError> {
        self.simulate_latency().await;

        let approved = self.roll();
        let receipt = GatewayReceipt {
            reference: format!("sim_ch_{}", Uuid::new_v4().simple()),
            approved,
        };

        info!(
            invoice_id = %invoice_id,
            amount = %amount,
            currency = currency,
            approved = approved,
            reference = %receipt.reference,
            "Gateway charge attempted"
        );

        Ok(receipt)
    }

    /// Refund a previously settled charge. Simulated refunds always clear.
    pub async fn refund(
        &self,
        invoice_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<GatewayReceipt, AppError> {
        self.simulate_latency().await;

        let receipt = GatewayReceipt {
            reference: format!("sim_rf_{}", Uuid::new_v4().simple()),
            approved: true,
        };

        info!(
            invoice_id = %invoice_id,
            amount = %amount,
            currency = currency,
            reference = %receipt.reference,
            "Gateway refund issued"
        );

        Ok(receipt)
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn roll(&self) -> bool {
        rand::thread_rng().gen_bool(self.config.success_rate.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(success_rate: f64) -> PaymentGateway {
        PaymentGateway::new(GatewayConfig {
            latency_ms: 0,
            success_rate,
        })
    }

    #[tokio::test]
    async fn charge_always_approves_at_full_success_rate() {
        let gw = gateway(1.0);
        let receipt = gw
            .charge(Uuid::new_v4(), Decimal::from(100), "USD")
            .await
            .unwrap();
        assert!(receipt.approved);
        assert!(receipt.reference.starts_with("sim_ch_"));
    }

    #[tokio::test]
    async fn charge_always_declines_at_zero_success_rate() {
        let gw = gateway(0.0);
        let receipt = gw
            .charge(Uuid::new_v4(), Decimal::from(100), "USD")
            .await
            .unwrap();
        assert!(!receipt.approved);
    }

    #[tokio::test]
    async fn refunds_always_clear() {
        let gw = gateway(0.0);
        let receipt = gw
            .refund(Uuid::new_v4(), Decimal::from(25), "USD")
            .await
            .unwrap();
        assert!(receipt.approved);
        assert!(receipt.reference.starts_with("sim_rf_"));
    }
}
