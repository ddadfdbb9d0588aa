use crate::api::payload;
use crate::model::{ProcessedRecord, RawSource};

const CHANNELS: u32 = 16;

/// Per-channel PV readings and their total.
///
/// A channel is only reported when it produces power. The vendor sometimes reports a total of
/// zero while the channels are producing; the channel sum wins in that case.
pub fn aggregate(record: &mut ProcessedRecord, source: &RawSource, nighttime: bool) {
    /* every channel the daytime path can report reads zero overnight */
    if nighttime {
        for channel in 1..=CHANNELS {
            record.set_number(format!("pv{}_power", channel), 0.0);
            record.set_number(format!("pv{}_voltage", channel), 0.0);
            record.set_number(format!("pv{}_current", channel), 0.0);
        }
        record.set_number("total_pv_power_calculated", 0.0);
        return;
    }

    let mut sum = 0.0;
    let mut reported = false;
    for channel in 1..=CHANNELS {
        let power = payload::number(source, &format!("pv{}power", channel));
        reported |= power.is_some();

        if let Some(power) = power.filter(|p| *p > 0.0) {
            sum += power;
            record.set_number(format!("pv{}_power", channel), power);
            record.set_opt(
                format!("pv{}_voltage", channel),
                payload::number(source, &format!("pv{}volt", channel)),
            );
            record.set_opt(
                format!("pv{}_current", channel),
                payload::number(source, &format!("pv{}curr", channel)),
            );
        }
    }

    let total = match payload::number(source, "totalPVPower") {
        Some(total) if total > 0.0 => Some(total),
        Some(_) => Some(sum),
        None if reported => Some(sum),
        None => None,
    };
    record.set_opt("total_pv_power_calculated", total);
}

/// The device's own PV total, as reported.
pub fn reported_total(record: &mut ProcessedRecord, source: &RawSource) {
    record.set_opt(
        "total_pv_power_calculated",
        payload::number(source, "totalPVPower"),
    );
}
