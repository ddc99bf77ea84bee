//! Rule engine behavior across the five severity tiers.

use supernova_weather::models::{FeatureRecord, SeverityCategory};
use supernova_weather::rules::categorize;

/// Record with every feature outside all voting bands
fn baseline_record() -> FeatureRecord {
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
fn emergency_scenario_trips_all_seven_critical_indicators() {
    let mut record = baseline_record();
    record.wind_speed_10m = 25.0;
    record.wind_gusts_10m = 30.0;
    record.precipitation = 55.0;
    record.snowfall = 25.0;
    record.temperature_2m = -25.0;
    record.relative_humidity_2m = 97.0;
    record.cloud_cover = 95.0;

    let category = categorize(&record);
    assert_eq!(category, SeverityCategory::Critico);
    assert_eq!(category.label(), "Crítico (Emergência Imediata)");
}

#[test]
fn stable_band_midpoints_classify_as_estavel() {
    let mut record = baseline_record();
    record.wind_speed_10m = 4.0;
    record.wind_gusts_10m = 5.0;
    record.precipitation = 5.0;
    record.snowfall = 3.0;
    record.temperature_2m = 20.0;
    record.relative_humidity_2m = 65.0;
    record.cloud_cover = 35.0;

    let category = categorize(&record);
    assert_eq!(category, SeverityCategory::Estavel);
    assert_eq!(category.label(), "Estável (Suporte Disponível)");
}

#[test]
fn critical_wind_threshold_is_inclusive_at_twenty() {
    let mut record = baseline_record();
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
fn critical_tier_takes_precedence_over_all_lower_tiers() {
    // Five critical votes win even when the remaining features vote severe
    let mut record = baseline_record();
    record.wind_speed_10m = 22.0;
    record.wind_gusts_10m = 28.0;
    record.precipitation = 52.0;
    record.relative_humidity_2m = 96.0;
    record.cloud_cover = 92.0;
    record.snowfall = 15.0;
    record.temperature_2m = -15.0;

    assert_eq!(categorize(&record), SeverityCategory::Critico);
}

#[test]
fn categorize_is_deterministic() {
    let mut record = baseline_record();
    record.wind_speed_10m = 15.0;
    record.wind_gusts_10m = 20.0;
    record.precipitation = 40.0;

    let first = categorize(&record);
    for _ in 0..100 {
        assert_eq!(categorize(&record), first);
    }
}

#[test]
fn unmatched_records_default_to_suave() {
    assert_eq!(categorize(&baseline_record()), SeverityCategory::Suave);
}

#[test]
fn nan_features_fall_through_to_lowest_severity() {
    let mut record = baseline_record();
    record.wind_speed_10m = f64::NAN;
    record.precipitation = f64::NAN;
    record.temperature_2m = f64::NAN;
    record.cloud_cover = f64::NAN;

    assert_eq!(categorize(&record), SeverityCategory::Suave);
}
