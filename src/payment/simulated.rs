use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{CreateIntent, IntentStatus, PaymentIntent, PaymentProcessor, ProcessorError};
use crate::models::PaymentMethod;

/// Deterministic in-memory processor. Card confirmations succeed
/// immediately; voucher methods stay `Processing` until the out-of-band
/// webhook reports settlement, mirroring the real gateway's flow.
#[derive(Default)]
pub struct SimulatedProcessor {
    intents: Mutex<HashMap<String, StoredIntent>>,
}

struct StoredIntent {
    intent_id: String,
    method: PaymentMethod,
    status: IntentStatus,
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn create_intent(&self, req: CreateIntent) -> Result<PaymentIntent, ProcessorError> {
        if req.amount <= 0 {
            return Err(ProcessorError::Declined("amount must be positive".into()));
        }

        let intent_id = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{intent_id}_secret_{}", Uuid::new_v4().simple());
        let status = match req.method {
            PaymentMethod::Card => IntentStatus::RequiresConfirmation,
            // Voucher is handed to the shopper at creation time.
            PaymentMethod::Oxxo => IntentStatus::RequiresAction,
        };

        let mut intents = self.intents.lock().expect("intents lock poisoned");
        intents.insert(
            client_secret.clone(),
            StoredIntent {
                intent_id: intent_id.clone(),
                method: req.method,
                status,
            },
        );

        tracing::debug!(order_id = %req.order_id, %intent_id, amount = req.amount, "simulated intent created");

        Ok(PaymentIntent {
            intent_id,
            client_secret,
            status,
        })
    }

    async fn confirm_intent(&self, client_secret: &str) -> Result<PaymentIntent, ProcessorError> {
        let mut intents = self.intents.lock().expect("intents lock poisoned");
        let stored = intents
            .get_mut(client_secret)
            .ok_or(ProcessorError::UnknownIntent)?;

        stored.status = match stored.method {
            PaymentMethod::Card => IntentStatus::Succeeded,
            PaymentMethod::Oxxo => IntentStatus::Processing,
        };

        Ok(PaymentIntent {
            intent_id: stored.intent_id.clone(),
            client_secret: client_secret.to_string(),
            status: stored.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: PaymentMethod, amount: i64) -> CreateIntent {
        CreateIntent {
            order_id: Uuid::new_v4(),
            amount,
            email: "buyer@example.com".into(),
            method,
        }
    }

    #[tokio::test]
    async fn card_intent_confirms_to_succeeded() {
        let processor = SimulatedProcessor::default();
        let intent = processor
            .create_intent(request(PaymentMethod::Card, 97_000))
            .await
            .unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresConfirmation);

        let confirmed = processor.confirm_intent(&intent.client_secret).await.unwrap();
        assert_eq!(confirmed.status, IntentStatus::Succeeded);
        assert_eq!(confirmed.intent_id, intent.intent_id);
    }

    #[tokio::test]
    async fn voucher_intent_stays_processing_after_confirm() {
        let processor = SimulatedProcessor::default();
        let intent = processor
            .create_intent(request(PaymentMethod::Oxxo, 30_000))
            .await
            .unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresAction);

        let confirmed = processor.confirm_intent(&intent.client_secret).await.unwrap();
        assert_eq!(confirmed.status, IntentStatus::Processing);
    }

    #[tokio::test]
    async fn zero_amount_is_declined() {
        let processor = SimulatedProcessor::default();
        let err = processor
            .create_intent(request(PaymentMethod::Card, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Declined(_)));
    }

    #[tokio::test]
    async fn unknown_client_secret_is_rejected() {
        let processor = SimulatedProcessor::default();
        let err = processor.confirm_intent("pi_nope_secret").await.unwrap_err();
        assert!(matches!(err, ProcessorError::UnknownIntent));
    }
}
