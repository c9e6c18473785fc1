//! # Entry Requests
//!
//! Caller intent for one stock movement, validated before the ledger sees it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::EntryKind;
use crate::validation::{
    validate_actor, validate_adjustment_quantity, validate_batch_number, validate_id, validate_note,
    validate_quantity, validate_unit_cost_cents, ValidationResult,
};

/// A requested stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntryRequest {
    pub venue_id: String,
    pub product_id: String,
    pub kind: EntryKind,
    #[ts(as = "String")]
    pub date: NaiveDate,
    /// Positive, except for downward adjustments.
    pub quantity: i64,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expire_date: Option<NaiveDate>,
    #[serde(default)]
    pub unit_cost_cents: Option<i64>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl EntryRequest {
    fn base(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        kind: EntryKind,
        quantity: i64,
        date: NaiveDate,
    ) -> Self {
        EntryRequest {
            venue_id: venue_id.into(),
            product_id: product_id.into(),
            kind,
            date,
            quantity,
            batch_number: None,
            expire_date: None,
            unit_cost_cents: None,
            actor: None,
            note: None,
        }
    }

    /// Stock received into a named batch.
    pub fn addition(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        unit_cost_cents: i64,
        batch_number: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let mut req = Self::base(venue_id, product_id, EntryKind::Added, quantity, date);
        req.unit_cost_cents = Some(unit_cost_cents);
        req.batch_number = Some(batch_number.into());
        req
    }

    /// A sale, drawn FIFO.
    pub fn sale(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        date: NaiveDate,
    ) -> Self {
        Self::base(venue_id, product_id, EntryKind::Sold, quantity, date)
    }

    /// An expiry write-off. Name a batch with [`with_batch`](Self::with_batch).
    pub fn expiry(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        date: NaiveDate,
    ) -> Self {
        Self::base(venue_id, product_id, EntryKind::Expired, quantity, date)
    }

    /// A damage write-off.
    pub fn damage(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        date: NaiveDate,
    ) -> Self {
        Self::base(venue_id, product_id, EntryKind::Damaged, quantity, date)
    }

    /// Stock returned to the shelf.
    pub fn stock_return(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        date: NaiveDate,
    ) -> Self {
        Self::base(venue_id, product_id, EntryKind::Returned, quantity, date)
    }

    /// A signed manual correction attributed to an actor.
    pub fn adjustment(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        actor: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let mut req = Self::base(venue_id, product_id, EntryKind::Adjustment, quantity, date);
        req.actor = Some(actor.into());
        req
    }

    pub fn with_batch(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }

    pub fn with_expiry(mut self, expire_date: NaiveDate) -> Self {
        self.expire_date = Some(expire_date);
        self
    }

    pub fn with_unit_cost(mut self, cents: i64) -> Self {
        self.unit_cost_cents = Some(cents);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Consumed quantity for drawing kinds (always positive).
    pub fn draw_quantity(&self) -> i64 {
        self.quantity.abs()
    }

    /// Field-level validation.
    ///
    /// ## Rules
    /// - Venue and product ids are well formed
    /// - Quantity is positive (signed and non-zero for adjustments)
    /// - ADDED needs a batch number and a unit cost
    /// - Adjustments need an actor
    /// - SOLD never names a batch; it always draws FIFO
    /// - A batch's expiry may not precede its entry date
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("venue_id", &self.venue_id)?;
        validate_id("product_id", &self.product_id)?;

        match self.kind {
            EntryKind::Adjustment => validate_adjustment_quantity(self.quantity)?,
            _ => validate_quantity(self.quantity)?,
        }

        if let Some(batch_number) = &self.batch_number {
            validate_batch_number(batch_number)?;
        }

        if let Some(cents) = self.unit_cost_cents {
            validate_unit_cost_cents(cents)?;
        }

        if let Some(note) = &self.note {
            validate_note(note)?;
        }

        match self.kind {
            EntryKind::Added => {
                if self.batch_number.is_none() {
                    return Err(ValidationError::Required {
                        field: "batch_number".to_string(),
                    });
                }
                if self.unit_cost_cents.is_none() {
                    return Err(ValidationError::Required {
                        field: "unit_cost".to_string(),
                    });
                }
            }
            EntryKind::Sold if self.batch_number.is_some() => {
                return Err(ValidationError::InvalidFormat {
                    field: "batch_number".to_string(),
                    reason: "sales are allocated FIFO and cannot name a batch".to_string(),
                });
            }
            EntryKind::Adjustment => {
                validate_actor("actor", self.actor.as_deref().unwrap_or_default())?;
            }
            _ => {}
        }

        if self.kind.opens_batch(self.quantity) {
            if let Some(expire_date) = self.expire_date {
                if expire_date < self.date {
                    return Err(ValidationError::InvalidFormat {
                        field: "expire_date".to_string(),
                        reason: "must not precede the entry date".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_addition_requires_batch_and_cost() {
        let ok = EntryRequest::addition("v1", "p1", 10, 150, "B1", day(2));
        assert!(ok.validate().is_ok());

        let mut no_batch = ok.clone();
        no_batch.batch_number = None;
        assert!(matches!(
            no_batch.validate(),
            Err(ValidationError::Required { field }) if field == "batch_number"
        ));

        let mut no_cost = ok;
        no_cost.unit_cost_cents = None;
        assert!(no_cost.validate().is_err());
    }

    #[test]
    fn test_sale_rejects_non_positive_quantity() {
        assert!(EntryRequest::sale("v1", "p1", 0, day(3)).validate().is_err());
        assert!(EntryRequest::sale("v1", "p1", -2, day(3)).validate().is_err());
        assert!(EntryRequest::sale("v1", "p1", 2, day(3)).validate().is_ok());
    }

    #[test]
    fn test_sale_cannot_name_batch() {
        let req = EntryRequest::sale("v1", "p1", 2, day(3)).with_batch("B1");
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_adjustment_needs_actor_and_non_zero() {
        assert!(EntryRequest::adjustment("v1", "p1", -3, "sam", day(4))
            .validate()
            .is_ok());
        assert!(EntryRequest::adjustment("v1", "p1", 0, "sam", day(4))
            .validate()
            .is_err());
        assert!(EntryRequest::adjustment("v1", "p1", 3, "  ", day(4))
            .validate()
            .is_err());
    }

    #[test]
    fn test_expiry_before_entry_date_rejected() {
        let req = EntryRequest::addition("v1", "p1", 10, 150, "B1", day(10)).with_expiry(day(9));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_venue_rejected() {
        let req = EntryRequest::sale("", "p1", 1, day(1));
        assert!(matches!(
            req.validate(),
            Err(ValidationError::Required { field }) if field == "venue_id"
        ));
    }
}
