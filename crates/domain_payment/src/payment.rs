//! The payment entity
//!
//! Reported payments wait for verification; only verified payments reach
//! the allocation engine, and a verified payment's amount and date are
//! immutable. Rejection and refund are terminal.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{CondominiumId, Money, PaymentId, UnitId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Transfer,
    Cash,
    Card,
    Gateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingVerification,
    Verified,
    Rejected,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub condominium_id: CondominiumId,
    /// The unit this payment is for; drives automatic quota selection.
    pub unit_id: Option<UnitId>,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    /// Bank reference, transfer number, gateway id.
    pub reference: Option<String>,
    /// Receipt document location; the engine stores the reference only.
    pub receipt_url: Option<String>,
    pub registered_by: Option<UserId>,
    pub verified_by: Option<UserId>,
    pub rejection_reason: Option<String>,
    status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Registers a reported payment awaiting verification.
    pub fn report(
        condominium_id: CondominiumId,
        unit_id: Option<UnitId>,
        amount: Money,
        payment_date: NaiveDate,
        method: PaymentMethod,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            condominium_id,
            unit_id,
            amount,
            payment_date,
            method,
            reference: None,
            receipt_url: None,
            registered_by: None,
            verified_by: None,
            rejection_reason: None,
            status: PaymentStatus::PendingVerification,
            created_at: Utc::now(),
        }
    }

    /// Rehydrates a persisted payment.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: PaymentId,
        condominium_id: CondominiumId,
        unit_id: Option<UnitId>,
        amount: Money,
        payment_date: NaiveDate,
        method: PaymentMethod,
        reference: Option<String>,
        receipt_url: Option<String>,
        registered_by: Option<UserId>,
        verified_by: Option<UserId>,
        rejection_reason: Option<String>,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            condominium_id,
            unit_id,
            amount,
            payment_date,
            method,
            reference,
            receipt_url,
            registered_by,
            verified_by,
            rejection_reason,
            status,
            created_at,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_receipt(mut self, url: impl Into<String>) -> Self {
        self.receipt_url = Some(url.into());
        self
    }

    pub fn registered_by(mut self, user: UserId) -> Self {
        self.registered_by = Some(user);
        self
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn is_verified(&self) -> bool {
        self.status == PaymentStatus::Verified
    }

    pub fn verify(&mut self, by: Option<UserId>) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::PendingVerification {
            return Err(self.bad_transition());
        }
        self.status = PaymentStatus::Verified;
        self.verified_by = by;
        Ok(())
    }

    pub fn reject(&mut self, by: Option<UserId>, reason: impl Into<String>) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::PendingVerification {
            return Err(self.bad_transition());
        }
        self.status = PaymentStatus::Rejected;
        self.verified_by = by;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }

    /// Marks the payment refunded. The caller reverses its applications
    /// and resolves any pending allocation in the same transaction.
    pub fn refund(&mut self) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Verified {
            return Err(self.bad_transition());
        }
        self.status = PaymentStatus::Refunded;
        Ok(())
    }

    fn bad_transition(&self) -> PaymentError {
        PaymentError::InvalidTransition {
            payment: self.id,
            from: format!("{:?}", self.status).to_lowercase(),
        }
    }
}
