//! Consultation cooldown and company freshness rules.
//!
//! A CNPJ+produto pair may be successfully consulted at most once per
//! 3-month window. "3 months" is calendar-month arithmetic via
//! [`chrono::Months`], which clamps to the last valid day of the target
//! month (Jan 31 + 3 months = Apr 30) rather than rolling over.
//!
//! A cached company is "fresh" while its `last_updated` is under 24 hours
//! old; fresh records are served without touching the external registries.

use crate::errors::AppError;
use crate::models::{Company, Produto};
use crate::storage::Store;
use chrono::{DateTime, Duration, Months, Utc};

/// Length of the cooldown window, in calendar months.
const COOLDOWN_MONTHS: u32 = 3;

/// Maximum age of a company record before registries are re-queried.
const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Outcome of a cooldown check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownVerdict {
    /// No successful consultation inside the window; proceed.
    Clear,
    /// A successful consultation exists inside the window.
    Blocked {
        last_consultation_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    },
}

/// Start of the cooldown window: `now` minus 3 calendar months.
pub fn cooldown_window_start(now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    now.checked_sub_months(Months::new(COOLDOWN_MONTHS))
        .ok_or_else(|| AppError::InternalError("cooldown window underflow".to_string()))
}

/// When the pair becomes consultable again: last success plus 3 calendar
/// months.
pub fn next_allowed_at(last: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    last.checked_add_months(Months::new(COOLDOWN_MONTHS))
        .ok_or_else(|| AppError::InternalError("cooldown window overflow".to_string()))
}

/// Checks whether a CNPJ+produto pair is inside its cooldown window.
///
/// Only SUCCESS consultations count; deleting a SUCCESS record therefore
/// lifts its cooldown (documented behavior).
///
/// The store query is a conservative prefilter; whether the pair is
/// blocked is decided by `now < last + 3 months`, the same arithmetic
/// that produces the advertised `next_allowed_at`. End-of-month clamping
/// makes addition and subtraction asymmetric (Jan 31 + 3 months is
/// Apr 30, but Apr 30 - 3 months is Jan 30), so deciding off the window
/// start would keep blocking past the advertised time.
pub async fn check_cooldown<S: Store>(
    store: &S,
    cnpj: &str,
    produto: Produto,
    now: DateTime<Utc>,
) -> Result<CooldownVerdict, AppError> {
    let since = cooldown_window_start(now)?;

    let recent = store
        .find_latest_successful_consultation(cnpj, produto, since)
        .await?;

    match recent {
        None => Ok(CooldownVerdict::Clear),
        Some(consultation) => {
            let last = consultation.created_at;
            let next_allowed = next_allowed_at(last)?;
            if now < next_allowed {
                Ok(CooldownVerdict::Blocked {
                    last_consultation_at: last,
                    next_allowed_at: next_allowed,
                })
            } else {
                Ok(CooldownVerdict::Clear)
            }
        }
    }
}

/// True while `now - company.last_updated` is under 24 hours.
pub fn is_company_fresh(company: &Company, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(company.last_updated) < Duration::hours(FRESHNESS_WINDOW_HOURS)
}
