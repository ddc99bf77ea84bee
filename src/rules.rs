//! Tiered threshold rule engine.
//!
//! Maps a [`FeatureRecord`] to a [`SeverityCategory`] by counting boolean
//! band indicators per severity tier and applying the tiers in strict
//! precedence order (critical first). The bands are disjoint per feature, so
//! a single measurement can vote in at most one tier.
//!
//! Unrecognized-value policy: every band comparison is false for NaN, so
//! malformed inputs contribute no votes and the record falls toward the
//! lowest severity ("Suave (Verde)"). The engine is total and never errors.

use crate::models::{FeatureRecord, SeverityCategory};

/// Half-open band check, false for NaN
#[inline]
fn band(value: f64, lo: f64, hi: f64) -> bool {
    value >= lo && value < hi
}

fn count(indicators: &[bool]) -> usize {
    indicators.iter().filter(|&&v| v).count()
}

/// Categorize a weather observation. Pure and deterministic; first matching
/// tier wins.
pub fn categorize(record: &FeatureRecord) -> SeverityCategory {
    let critical = [
        record.wind_speed_10m >= 20.0,
        record.wind_gusts_10m >= 25.0,
        record.precipitation >= 50.0,
        record.snowfall >= 20.0,
        record.temperature_2m <= -20.0 || record.temperature_2m >= 45.0,
        record.relative_humidity_2m >= 95.0,
        record.cloud_cover >= 90.0,
    ];
    if count(&critical) >= 5 {
        return SeverityCategory::Critico;
    }

    let severe = [
        band(record.wind_speed_10m, 12.0, 20.0),
        band(record.wind_gusts_10m, 15.0, 25.0),
        band(record.precipitation, 30.0, 50.0),
        band(record.snowfall, 10.0, 20.0),
        band(record.temperature_2m, -20.0, -10.0)
            || (record.temperature_2m > 40.0 && record.temperature_2m < 45.0),
        band(record.relative_humidity_2m, 90.0, 95.0),
        band(record.cloud_cover, 75.0, 90.0),
    ];
    if count(&severe) >= 3 {
        return SeverityCategory::Severo;
    }

    let moderate = [
        band(record.wind_speed_10m, 6.0, 12.0),
        band(record.wind_gusts_10m, 8.0, 15.0),
        band(record.precipitation, 10.0, 30.0),
        band(record.snowfall, 5.0, 10.0),
        band(record.temperature_2m, -10.0, -5.0)
            || (record.temperature_2m > 35.0 && record.temperature_2m <= 40.0),
        band(record.relative_humidity_2m, 80.0, 90.0),
        band(record.cloud_cover, 50.0, 75.0),
    ];
    if count(&moderate) >= 3 {
        return SeverityCategory::Moderado;
    }

    let stable = [
        band(record.wind_speed_10m, 2.0, 6.0),
        band(record.wind_gusts_10m, 3.0, 8.0),
        band(record.precipitation, 1.0, 10.0),
        band(record.snowfall, 1.0, 5.0),
        record.temperature_2m >= 0.0 && record.temperature_2m <= 35.0,
        band(record.relative_humidity_2m, 50.0, 80.0),
        band(record.cloud_cover, 25.0, 50.0),
    ];
    if count(&stable) >= 3 {
        return SeverityCategory::Estavel;
    }

    SeverityCategory::Suave
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A record with every feature far outside all bands, so no tier votes
    fn quiet_record() -> FeatureRecord {
        FeatureRecord {
            apparent_temperature: -3.0,
            cloud_cover: 5.0,
            is_day: 1.0,
            precipitation: 0.2,
            pressure_msl: 1013.0,
            rain: 0.0,
            relative_humidity_2m: 20.0,
            showers: 0.0,
            snowfall: 0.0,
            surface_pressure: 1000.0,
            temperature_2m: -3.0,
            weather_code: 1.0,
            wind_direction_10m: 90.0,
            wind_gusts_10m: 1.0,
            wind_speed_10m: 0.5,
            elevation: 500.0,
            latitude: -23.5,
            longitude: -46.6,
        }
    }

    #[test]
    fn test_no_votes_defaults_to_suave() {
        assert_eq!(categorize(&quiet_record()), SeverityCategory::Suave);
    }

    #[test]
    fn test_deterministic() {
        let record = quiet_record();
        let first = categorize(&record);
        for _ in 0..10 {
            assert_eq!(categorize(&record), first);
        }
    }

    #[test]
    fn test_full_critical_scenario() {
        // 7 of 7 critical indicators true
        let mut record = quiet_record();
        record.wind_speed_10m = 25.0;
        record.wind_gusts_10m = 30.0;
        record.precipitation = 55.0;
        record.snowfall = 25.0;
        record.temperature_2m = -25.0;
        record.relative_humidity_2m = 97.0;
        record.cloud_cover = 95.0;

        assert_eq!(categorize(&record), SeverityCategory::Critico);
        assert_eq!(
            categorize(&record).label(),
            "Crítico (Emergência Imediata)"
        );
    }

    #[test]
    fn test_critical_wind_speed_boundary_is_inclusive() {
        let mut record = quiet_record();
        // 4 other critical votes, wind speed decides the fifth
        record.precipitation = 55.0;
        record.snowfall = 25.0;
        record.relative_humidity_2m = 97.0;
        record.cloud_cover = 95.0;

        record.wind_speed_10m = 20.0;
        assert_eq!(categorize(&record), SeverityCategory::Critico);

        record.wind_speed_10m = 19.999999;
        assert_ne!(categorize(&record), SeverityCategory::Critico);
    }

    #[test]
    fn test_critical_precedence_over_lower_tiers() {
        // 5 critical votes plus severe-band values on the remaining features;
        // the critical tier must win regardless of lower-tier counts.
        let mut record = quiet_record();
        record.wind_speed_10m = 22.0;
        record.wind_gusts_10m = 28.0;
        record.precipitation = 52.0;
        record.relative_humidity_2m = 96.0;
        record.cloud_cover = 92.0;
        record.snowfall = 12.0; // severe band
        record.temperature_2m = -15.0; // severe band

        assert_eq!(categorize(&record), SeverityCategory::Critico);
    }

    #[test]
    fn test_stable_band_midpoints() {
        let mut record = quiet_record();
        record.wind_speed_10m = 4.0;
        record.wind_gusts_10m = 5.0;
        record.precipitation = 5.0;
        record.snowfall = 3.0;
        record.temperature_2m = 20.0;
        record.relative_humidity_2m = 65.0;
        record.cloud_cover = 35.0;

        assert_eq!(categorize(&record), SeverityCategory::Estavel);
        assert_eq!(categorize(&record).label(), "Estável (Suporte Disponível)");
    }

    #[test]
    fn test_severe_tier() {
        let mut record = quiet_record();
        record.wind_speed_10m = 15.0;
        record.wind_gusts_10m = 20.0;
        record.precipitation = 40.0;

        assert_eq!(categorize(&record), SeverityCategory::Severo);
    }

    #[test]
    fn test_moderate_tier() {
        let mut record = quiet_record();
        record.wind_speed_10m = 8.0;
        record.wind_gusts_10m = 10.0;
        record.precipitation = 20.0;

        assert_eq!(categorize(&record), SeverityCategory::Moderado);
    }

    #[test]
    fn test_two_votes_are_not_enough() {
        let mut record = quiet_record();
        record.wind_speed_10m = 15.0;
        record.wind_gusts_10m = 20.0;

        assert_eq!(categorize(&record), SeverityCategory::Suave);
    }

    #[test]
    fn test_nan_inputs_fall_toward_lowest_severity() {
        let mut record = quiet_record();
        record.wind_speed_10m = f64::NAN;
        record.wind_gusts_10m = f64::NAN;
        record.precipitation = f64::NAN;
        record.snowfall = f64::NAN;
        record.temperature_2m = f64::NAN;
        record.relative_humidity_2m = f64::NAN;
        record.cloud_cover = f64::NAN;

        assert_eq!(categorize(&record), SeverityCategory::Suave);
    }
}
