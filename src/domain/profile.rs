use {
    super::error::PipelineError,
    super::id::{PaymentId, ProfileId},
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Pending,
    Activating,
    Active,
    Failed,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }

    /// Pending → Activating → {Active | Failed}. Terminal states reject
    /// everything; Activating is never skipped.
    pub fn can_transition_to(&self, next: &ProfileStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Activating)
                | (Self::Activating, Self::Active)
                | (Self::Activating, Self::Failed)
        )
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ProfileStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "activating" => Ok(Self::Activating),
            "active" => Ok(Self::Active),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Validation(format!(
                "unknown profile status: {other}"
            ))),
        }
    }
}

/// Deterministic QR payload for an activated profile. Pure on purpose:
/// re-running activation after a crash yields the same bytes, so the
/// rendering collaborator downstream never sees two versions.
pub fn qr_payload(profile: &ProfileId, payment: &PaymentId) -> String {
    format!("member://{}/{}", profile.as_str(), payment.as_str())
}

/// A unit of work awaiting activation. Created in `Pending` by the intake
/// flow; mutated exclusively through the transition methods below, which
/// return the next value — the store's compare-and-swap on `version` makes
/// the write atomic. Terminal rows are kept forever for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayableProfile {
    id: ProfileId,
    status: ProfileStatus,
    payment_id: Option<PaymentId>,
    money: Money,
    qr_payload: Option<String>,
    failure_reason: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PayableProfile {
    pub fn new_pending(id: ProfileId, money: Money, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: ProfileStatus::Pending,
            payment_id: None,
            money,
            qr_payload: None,
            failure_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &ProfileId {
        &self.id
    }

    pub fn status(&self) -> ProfileStatus {
        self.status
    }

    pub fn payment_id(&self) -> Option<&PaymentId> {
        self.payment_id.as_ref()
    }

    pub fn money(&self) -> Money {
        self.money
    }

    pub fn qr(&self) -> Option<&str> {
        self.qr_payload.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Pending → Activating, binding the external payment id. The binding
    /// is set at most once: re-binding the same payment is a no-op (crash
    /// recovery re-enters here), a different payment is an invariant
    /// violation.
    pub fn begin_activation(
        &self,
        payment: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        if let Some(bound) = &self.payment_id {
            if *bound != payment {
                return Err(PipelineError::Validation(format!(
                    "profile {} already bound to payment {bound}, refusing {payment}",
                    self.id
                )));
            }
        }
        self.step(ProfileStatus::Activating, now, |p| {
            p.payment_id = Some(payment);
        })
    }

    /// Activating → Active; derives the QR payload as part of the same
    /// logical unit.
    pub fn activate(&self, now: DateTime<Utc>) -> Result<Self, PipelineError> {
        let payment = self.payment_id.clone().ok_or_else(|| {
            PipelineError::Validation(format!("profile {} has no bound payment", self.id))
        })?;
        let qr = qr_payload(&self.id, &payment);
        self.step(ProfileStatus::Active, now, |p| {
            p.qr_payload = Some(qr);
        })
    }

    /// Activating → Failed.
    pub fn fail(&self, reason: &str, now: DateTime<Utc>) -> Result<Self, PipelineError> {
        let reason = reason.to_string();
        self.step(ProfileStatus::Failed, now, |p| {
            p.failure_reason = Some(reason);
        })
    }

    fn step(
        &self,
        next: ProfileStatus,
        now: DateTime<Utc>,
        mutate: impl FnOnce(&mut Self),
    ) -> Result<Self, PipelineError> {
        if !self.status.can_transition_to(&next) {
            return Err(PipelineError::Validation(format!(
                "invalid status transition for {}: {} → {next}",
                self.id, self.status
            )));
        }
        let mut out = self.clone();
        mutate(&mut out);
        out.status = next;
        out.version += 1;
        out.updated_at = now;
        Ok(out)
    }
}
