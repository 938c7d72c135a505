use common::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment.
///
/// `Rejected`, `Succeeded`, and `Failed` are terminal: once reached, the
/// payment is never transitioned again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Initialized,
    Pending,
    Rejected,
    Succeeded,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Rejected | Status::Succeeded | Status::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Initialized => "initialized",
            Status::Pending => "pending",
            Status::Rejected => "rejected",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initialized" => Ok(Status::Initialized),
            "pending" => Ok(Status::Pending),
            "rejected" => Ok(Status::Rejected),
            "succeeded" => Ok(Status::Succeeded),
            "failed" => Ok(Status::Failed),
            other => Err(CoreError::internal(format!("unknown payment status {other:?}"))),
        }
    }
}

/// A payment aggregate.
///
/// `gateway_id` is set only on success; `reason` only on rejection or
/// failure.
#[derive(Debug, Clone)]
pub struct Payment {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
    pub status: Status,
    pub reason: Option<String>,
    pub gateway_id: Option<String>,
}

/// Request to create a payment, as received on the HTTP surface.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
}

pub(crate) fn validate_create_request(request: &CreateRequest) -> Result<()> {
    if request.payment_id.is_empty()
        || request.user_id.is_empty()
        || request.amount <= 0
        || request.service.is_empty()
    {
        return Err(CoreError::invalid("invalid payment"));
    }
    Ok(())
}
