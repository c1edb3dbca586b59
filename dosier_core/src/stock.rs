//! Medication stock tracking and depletion alerts.

use crate::Medication;

/// Days of remaining doses at or below which stock is critical
pub const CRITICAL_STOCK_DAYS: u32 = 3;
/// Days of remaining doses at or below which stock is low
pub const LOW_STOCK_DAYS: u32 = 7;

/// Coarse stock classification for alerting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockLevel {
    Depleted,
    Critical,
    Low,
    Ok,
}

/// Consume one dose of stock. Saturates at zero; the caller decides whether
/// depletion completes the treatment.
pub fn consume_dose(med: &mut Medication) {
    med.current_stock = med.current_stock.saturating_sub(1);
    tracing::debug!(
        "Consumed one dose of '{}', {} left in stock",
        med.id,
        med.current_stock
    );
}

/// Days of doses the current stock covers, if the medication has a fixed
/// schedule to divide by
pub fn days_of_stock(med: &Medication) -> Option<u32> {
    if med.daily_dose_count == 0 {
        return None;
    }
    Some(med.current_stock / med.daily_dose_count)
}

/// Classify the current stock level
pub fn stock_level(med: &Medication) -> StockLevel {
    if med.current_stock == 0 {
        return StockLevel::Depleted;
    }
    match days_of_stock(med) {
        Some(days) if days <= CRITICAL_STOCK_DAYS => StockLevel::Critical,
        Some(days) if days <= LOW_STOCK_DAYS => StockLevel::Low,
        _ => StockLevel::Ok,
    }
}

/// A medication whose stock needs the user's attention
#[derive(Clone, Debug)]
pub struct StockAlert {
    pub medication_id: String,
    pub medication_name: String,
    pub level: StockLevel,
    pub days_left: Option<u32>,
}

/// Scan medications for stock that is depleted, classified low/critical, or
/// within the user's configured alert lead time
pub fn check_stock(medications: &[Medication], alert_lead_days: u32) -> Vec<StockAlert> {
    let mut alerts = Vec::new();

    for med in medications.iter().filter(|m| m.active) {
        let level = stock_level(med);
        let days_left = days_of_stock(med);

        let within_lead = days_left.is_some_and(|d| d <= alert_lead_days);
        if level == StockLevel::Ok && !within_lead {
            continue;
        }

        tracing::info!(
            "Stock alert for '{}': {:?}, {:?} day(s) left",
            med.id,
            level,
            days_left
        );
        alerts.push(StockAlert {
            medication_id: med.id.clone(),
            medication_name: med.name.clone(),
            level,
            days_left,
        });
    }

    alerts
}
