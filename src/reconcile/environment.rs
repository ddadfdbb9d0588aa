use crate::api::payload;
use crate::model::{ProcessedRecord, RawSource};

/// Currency per kWh used for the savings estimate when none is configured.
pub const DEFAULT_SAVINGS_RATE: f64 = 0.15;

const DAYS_PER_YEAR: f64 = 365.0;

/// Linear projection of a year-to-date figure to a full year. `None` on day zero.
pub fn annual_estimate(year_to_date: f64, day_of_year: u32) -> Option<f64> {
    if day_of_year == 0 {
        return None;
    }
    Some(year_to_date / f64::from(day_of_year) * DAYS_PER_YEAR)
}

pub fn reconcile(
    record: &mut ProcessedRecord,
    plant_stats: Option<&RawSource>,
    primary: &RawSource,
    day_of_year: u32,
    savings_rate: f64,
) {
    if let Some(stats) = plant_stats {
        /* tonnes; converted to kg on exposure */
        record.set_opt("co2_reduction", payload::number(stats, "totalReduceCo2"));
        record.set_opt("equivalent_trees", payload::number(stats, "totalPlantTreeNum"));
        record.set_opt("current_power", payload::number(stats, "powerNow"));
    }

    let year_to_date = plant_stats
        .and_then(|stats| payload::number(stats, "yearPvEnergy"))
        .or_else(|| payload::number(primary, "yearPvEnergy"));

    if let Some(production) = year_to_date.and_then(|ytd| annual_estimate(ytd, day_of_year)) {
        record.set_number("estimated_annual_production", production);
        record.set_number("estimated_annual_savings", production * savings_rate);
    }
}
