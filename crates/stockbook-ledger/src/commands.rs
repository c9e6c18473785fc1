//! # Ledger Commands
//!
//! Input shapes for the write operations on [`StockLedger`](crate::StockLedger).
//! Each converts into a core [`EntryRequest`]; validation happens there.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockbook_core::EntryRequest;

/// Stock received from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStock {
    pub venue_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub batch_number: String,
    #[serde(default)]
    pub expire_date: Option<NaiveDate>,
    pub date: NaiveDate,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Units sold. Always drawn oldest batch first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellStock {
    pub venue_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Stock written off because it expired or was damaged.
///
/// Without a batch number the units come from the oldest batches (expired
/// ones first for expiry write-offs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOff {
    pub venue_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub batch_number: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Units coming back onto the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnStock {
    pub venue_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Generated (`RET-YYYYMMDD-n`) when absent.
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub expire_date: Option<NaiveDate>,
    #[serde(default)]
    pub unit_cost_cents: Option<i64>,
    pub date: NaiveDate,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A signed manual correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStock {
    pub venue_id: String,
    pub product_id: String,
    /// Positive adds a batch, negative draws FIFO.
    pub quantity: i64,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub expire_date: Option<NaiveDate>,
    pub date: NaiveDate,
}

fn with_optionals(
    mut req: EntryRequest,
    batch_number: Option<String>,
    expire_date: Option<NaiveDate>,
    actor: Option<String>,
    note: Option<String>,
) -> EntryRequest {
    req.batch_number = batch_number;
    req.expire_date = expire_date;
    req.actor = actor;
    req.note = note;
    req
}

impl From<AddStock> for EntryRequest {
    fn from(cmd: AddStock) -> Self {
        let req = EntryRequest::addition(
            cmd.venue_id,
            cmd.product_id,
            cmd.quantity,
            cmd.unit_cost_cents,
            cmd.batch_number.clone(),
            cmd.date,
        );
        with_optionals(req, Some(cmd.batch_number), cmd.expire_date, cmd.actor, cmd.note)
    }
}

impl From<SellStock> for EntryRequest {
    fn from(cmd: SellStock) -> Self {
        let req = EntryRequest::sale(cmd.venue_id, cmd.product_id, cmd.quantity, cmd.date);
        with_optionals(req, None, None, cmd.actor, cmd.note)
    }
}

impl From<ReturnStock> for EntryRequest {
    fn from(cmd: ReturnStock) -> Self {
        let mut req =
            EntryRequest::stock_return(cmd.venue_id, cmd.product_id, cmd.quantity, cmd.date);
        req.unit_cost_cents = cmd.unit_cost_cents;
        with_optionals(req, cmd.batch_number, cmd.expire_date, cmd.actor, cmd.note)
    }
}

impl From<AdjustStock> for EntryRequest {
    fn from(cmd: AdjustStock) -> Self {
        let req = EntryRequest::adjustment(
            cmd.venue_id,
            cmd.product_id,
            cmd.quantity,
            cmd.actor.clone(),
            cmd.date,
        );
        with_optionals(req, cmd.batch_number, cmd.expire_date, Some(cmd.actor), cmd.reason)
    }
}

impl WriteOff {
    pub(crate) fn into_expiry(self) -> EntryRequest {
        let req = EntryRequest::expiry(self.venue_id, self.product_id, self.quantity, self.date);
        with_optionals(req, self.batch_number, None, self.actor, self.note)
    }

    pub(crate) fn into_damage(self) -> EntryRequest {
        let req = EntryRequest::damage(self.venue_id, self.product_id, self.quantity, self.date);
        with_optionals(req, self.batch_number, None, self.actor, self.note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::EntryKind;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[test]
    fn test_add_stock_from_json() {
        let cmd: AddStock = serde_json::from_str(
            r#"{
                "venueId": "arena-1",
                "productId": "cola-330",
                "quantity": 24,
                "unitCostCents": 45,
                "batchNumber": "LOT-7",
                "expireDate": "2025-03-01",
                "date": "2025-01-02"
            }"#,
        )
        .unwrap();

        let req = EntryRequest::from(cmd);
        assert_eq!(req.kind, EntryKind::Added);
        assert_eq!(req.batch_number.as_deref(), Some("LOT-7"));
        assert_eq!(req.expire_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(req.unit_cost_cents, Some(45));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_adjustment_keeps_actor_and_reason() {
        let req = EntryRequest::from(AdjustStock {
            venue_id: "arena-1".to_string(),
            product_id: "cola-330".to_string(),
            quantity: -3,
            actor: "manager-7".to_string(),
            reason: Some("stock count".to_string()),
            batch_number: None,
            expire_date: None,
            date: jan(31),
        });
        assert_eq!(req.kind, EntryKind::Adjustment);
        assert_eq!(req.actor.as_deref(), Some("manager-7"));
        assert_eq!(req.note.as_deref(), Some("stock count"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_write_off_kinds() {
        let cmd = WriteOff {
            venue_id: "arena-1".to_string(),
            product_id: "cola-330".to_string(),
            quantity: 2,
            batch_number: Some("LOT-7".to_string()),
            date: jan(20),
            actor: None,
            note: None,
        };
        assert_eq!(cmd.clone().into_expiry().kind, EntryKind::Expired);
        assert_eq!(cmd.into_damage().kind, EntryKind::Damaged);
    }
}
