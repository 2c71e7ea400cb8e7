use {
    crate::domain::{
        error::PipelineError,
        gateway::{GatewayPayment, GatewayPaymentStatus, PaymentGateway},
        id::{PaymentId, ProfileId},
        money::{Currency, Money, MoneyAmount},
    },
    async_trait::async_trait,
    serde::Deserialize,
};

/// HTTP adapter for the processor's payment API. Webhook envelopes only
/// name a payment; current status and the external reference come from
/// `GET /v1/payments/{id}`.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
    transaction_amount: f64,
    currency_id: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn convert(&self, raw: PaymentResponse) -> Result<GatewayPayment, PipelineError> {
        let id_str = match &raw.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(PipelineError::Validation(format!(
                    "unexpected payment id shape: {other}"
                )));
            }
        };

        let status = match raw.status.as_str() {
            "approved" => GatewayPaymentStatus::Approved,
            "rejected" | "cancelled" | "refunded" | "charged_back" => {
                GatewayPaymentStatus::Rejected
            }
            _ => GatewayPaymentStatus::InProcess,
        };

        let cents = (raw.transaction_amount * 100.0).round() as i64;
        let money = Money::new(
            MoneyAmount::new(cents)?,
            Currency::try_from(raw.currency_id.as_str())?,
        );

        let profile_id = raw
            .external_reference
            .filter(|r| !r.is_empty())
            .map(ProfileId::new)
            .transpose()?;

        Ok(GatewayPayment {
            payment_id: PaymentId::new(id_str)?,
            profile_id,
            status,
            money,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn fetch_payment(&self, id: &PaymentId) -> Result<GatewayPayment, PipelineError> {
        let url = format!("{}/v1/payments/{}", self.base_url, id.as_str());
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PipelineError::Gateway(format!("payment fetch failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound(format!("payment {id}")));
        }
        if !response.status().is_success() {
            return Err(PipelineError::Gateway(format!(
                "payment fetch returned {}",
                response.status()
            )));
        }

        let raw: PaymentResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Gateway(format!("payment body unreadable: {e}")))?;
        self.convert(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gw() -> HttpPaymentGateway {
        HttpPaymentGateway::new("https://api.test", "tok")
    }

    #[test]
    fn converts_approved_payment() {
        let raw: PaymentResponse = serde_json::from_value(serde_json::json!({
            "id": 555001,
            "status": "approved",
            "external_reference": "prof-1",
            "transaction_amount": 55.0,
            "currency_id": "BRL",
        }))
        .unwrap();
        let p = gw().convert(raw).unwrap();
        assert_eq!(p.payment_id.as_str(), "555001");
        assert_eq!(p.status, GatewayPaymentStatus::Approved);
        assert_eq!(p.money.amount().cents(), 5500);
        assert_eq!(p.profile_id.unwrap().as_str(), "prof-1");
    }

    #[test]
    fn empty_external_reference_is_none() {
        let raw: PaymentResponse = serde_json::from_value(serde_json::json!({
            "id": "1",
            "status": "in_process",
            "external_reference": "",
            "transaction_amount": 1.0,
            "currency_id": "brl",
        }))
        .unwrap();
        let p = gw().convert(raw).unwrap();
        assert!(p.profile_id.is_none());
        assert_eq!(p.status, GatewayPaymentStatus::InProcess);
    }
}
