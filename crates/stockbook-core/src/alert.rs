//! # Stock Alerts
//!
//! Threshold checks run after every write, and the reconciliation that turns
//! their findings into alert openings and resolutions.
//!
//! ## Lifecycle
//! ```text
//!   evaluate(balance, batches, thresholds)
//!        │
//!        ▼
//!   conditions ──► reconcile(active alerts)
//!                     │
//!                     ├── condition without ACTIVE alert  → open
//!                     ├── ACTIVE alert without condition  → resolve
//!                     └── both present                    → leave as is
//! ```
//!
//! At most one ACTIVE alert exists per (venue, product, kind).

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::fifo::Batch;

// =============================================================================
// Enums
// =============================================================================

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    LowStock,
    OutOfStock,
    ExpiringSoon,
    ExpiredStock,
    Overstock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl Default for AlertStatus {
    fn default() -> Self {
        AlertStatus::Active
    }
}

// =============================================================================
// Thresholds
// =============================================================================

/// Per-product limits the check compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AlertThresholds {
    /// At or below this (and above zero) the product is low.
    pub reorder_level: i64,
    /// Above this the product is overstocked.
    pub max_stock: Option<i64>,
    /// Batches expiring within this many days raise EXPIRING_SOON.
    pub expiry_warning_days: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            reorder_level: 10,
            max_stock: None,
            expiry_warning_days: 7,
        }
    }
}

// =============================================================================
// Alert
// =============================================================================

/// A stock alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAlert {
    pub id: String,
    pub venue_id: String,
    pub product_id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub message: String,
    pub threshold: i64,
    pub observed: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl StockAlert {
    /// Opens a new ACTIVE alert for a condition.
    pub fn open(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        condition: &AlertCondition,
        now: DateTime<Utc>,
    ) -> Self {
        StockAlert {
            id: Uuid::new_v4().to_string(),
            venue_id: venue_id.into(),
            product_id: product_id.into(),
            kind: condition.kind,
            severity: condition.severity,
            status: AlertStatus::Active,
            message: condition.message.clone(),
            threshold: condition.threshold,
            observed: condition.observed,
            created_at: now,
            resolved_at: None,
            resolved_by: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// A condition found by [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCondition {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub threshold: i64,
    pub observed: i64,
    pub message: String,
}

/// Checks a product's stock position against its thresholds.
pub fn evaluate(
    balance: i64,
    batches: &[Batch],
    today: NaiveDate,
    thresholds: &AlertThresholds,
) -> Vec<AlertCondition> {
    let mut found = Vec::new();

    if balance <= 0 {
        found.push(AlertCondition {
            kind: AlertKind::OutOfStock,
            severity: AlertSeverity::Critical,
            threshold: 0,
            observed: balance,
            message: "Out of stock".to_string(),
        });
    } else if balance <= thresholds.reorder_level {
        found.push(AlertCondition {
            kind: AlertKind::LowStock,
            severity: AlertSeverity::Warning,
            threshold: thresholds.reorder_level,
            observed: balance,
            message: format!(
                "Stock {} at or below reorder level {}",
                balance, thresholds.reorder_level
            ),
        });
    }

    if let Some(max) = thresholds.max_stock {
        if balance > max {
            found.push(AlertCondition {
                kind: AlertKind::Overstock,
                severity: AlertSeverity::Info,
                threshold: max,
                observed: balance,
                message: format!("Stock {} above maximum {}", balance, max),
            });
        }
    }

    let on_hand = batches
        .iter()
        .filter(|b| b.remaining_quantity > 0 && b.entry_date <= today);

    let horizon = today + Duration::days(thresholds.expiry_warning_days.max(0));
    let (expired, expiring) = on_hand.fold((0, 0), |(expired, expiring), b| {
        if b.is_expired_on(today) {
            (expired + b.remaining_quantity, expiring)
        } else if b.expires_by(today, horizon) {
            (expired, expiring + b.remaining_quantity)
        } else {
            (expired, expiring)
        }
    });

    if expired > 0 {
        found.push(AlertCondition {
            kind: AlertKind::ExpiredStock,
            severity: AlertSeverity::Critical,
            threshold: 0,
            observed: expired,
            message: format!("{} units past expiry still on hand", expired),
        });
    }

    if expiring > 0 {
        found.push(AlertCondition {
            kind: AlertKind::ExpiringSoon,
            severity: AlertSeverity::Warning,
            threshold: thresholds.expiry_warning_days,
            observed: expiring,
            message: format!(
                "{} units expire within {} days",
                expiring, thresholds.expiry_warning_days
            ),
        });
    }

    found
}

/// Alerts to open and ids to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertChanges {
    pub opened: Vec<StockAlert>,
    pub resolved: Vec<String>,
}

impl AlertChanges {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.resolved.is_empty()
    }
}

/// Matches current conditions against the product's ACTIVE alerts.
pub fn reconcile(
    venue_id: &str,
    product_id: &str,
    active: &[StockAlert],
    conditions: &[AlertCondition],
    now: DateTime<Utc>,
) -> AlertChanges {
    let opened = conditions
        .iter()
        .filter(|c| !active.iter().any(|a| a.is_active() && a.kind == c.kind))
        .map(|c| StockAlert::open(venue_id, product_id, c, now))
        .collect();

    let resolved = active
        .iter()
        .filter(|a| a.is_active() && !conditions.iter().any(|c| c.kind == a.kind))
        .map(|a| a.id.clone())
        .collect();

    AlertChanges { opened, resolved }
}
