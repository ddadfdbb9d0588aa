//! Energy counters, ranked by source: the device sample first, then the load monitor's
//! totals, then plant statistics.

use crate::api::payload;
use crate::model::{LoadMonitoring, ProcessedRecord, RawSource};

pub struct Field {
    pub key: &'static str,
    pub device: &'static str,
    pub load_monitor: Option<&'static str>,
    pub plant: Option<&'static str>,
    /// Resets daily; reported as zero overnight when no source has it.
    pub today: bool,
}

const fn field(
    key: &'static str,
    device: &'static str,
    load_monitor: Option<&'static str>,
    plant: Option<&'static str>,
    today: bool,
) -> Field {
    Field {
        key,
        device,
        load_monitor,
        plant,
        today,
    }
}

pub const COMMON_FIELDS: &[Field] = &[
    field("today_pv_energy", "todayPvEnergy", Some("pvEnergy"), Some("todayPvEnergy"), true),
    field("total_pv_energy", "totalPvEnergy", None, Some("totalPvEnergy"), false),
    field("today_grid_export_energy", "todaySellEnergy", Some("sellEnergy"), Some("todaySellEnergy"), true),
    field("total_grid_export", "totalSellEnergy", None, Some("totalSellEnergy"), false),
    field("today_grid_import_energy", "todayBuyEnergy", Some("buyEnergy"), Some("todayBuyEnergy"), true),
    field("total_grid_import", "totalBuyEnergy", None, Some("totalBuyEnergy"), false),
    field("today_load_energy", "todayLoadEnergy", Some("loadEnergy"), Some("todayLoadEnergy"), true),
    field("total_load_energy", "totalLoadEnergy", None, Some("totalLoadEnergy"), false),
];

pub const BATTERY_FIELDS: &[Field] = &[
    field("today_battery_charge", "todayBatChgEnergy", None, None, true),
    field("today_battery_discharge", "todayBatDisEnergy", None, None, true),
    field("total_battery_charge", "totalBatChgEnergy", None, None, false),
    field("total_battery_discharge", "totalBatDisEnergy", None, None, false),
];

pub struct Sources<'a> {
    pub primary: &'a RawSource,
    pub load_monitoring: Option<&'a LoadMonitoring>,
    pub plant_stats: Option<&'a RawSource>,
}

impl<'a> Sources<'a> {
    fn lookup(&self, field: &Field) -> Option<f64> {
        payload::number(self.primary, field.device)
            .or_else(|| {
                let key = field.load_monitor?;
                payload::number(&self.load_monitoring?.total, key)
            })
            .or_else(|| payload::number(self.plant_stats?, field.plant?))
    }
}

pub fn reconcile(
    record: &mut ProcessedRecord,
    fields: &[Field],
    sources: &Sources<'_>,
    nighttime: bool,
) {
    for field in fields {
        let value = sources
            .lookup(field)
            .or_else(|| Some(0.0).filter(|_| nighttime && field.today));
        record.set_opt(field.key, value);
    }
}
