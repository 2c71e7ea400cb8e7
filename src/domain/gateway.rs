use {
    super::error::PipelineError,
    super::id::{PaymentId, ProfileId},
    super::money::Money,
    async_trait::async_trait,
};

/// Payment state as reported by the processor's API. Webhook envelopes only
/// carry the payment id; current status and the profile reference come from
/// a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    InProcess,
}

#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub payment_id: PaymentId,
    /// The profile handle we attached at checkout time (the processor's
    /// "external reference"). Absent for payments we did not create.
    pub profile_id: Option<ProfileId>,
    pub status: GatewayPaymentStatus,
    pub money: Money,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_payment(&self, id: &PaymentId) -> Result<GatewayPayment, PipelineError>;
}
