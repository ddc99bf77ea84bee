//! Synthetic training corpus: rejection-sampled, rule-labeled, balanced.
//!
//! Candidate records are drawn with every feature independently uniform over
//! a fixed realistic range, labeled by the rule engine, and accepted only
//! while the label's bucket is below the target count. Rare categories (the
//! critical tier in particular) need many draws per accepted row, so the
//! loop is open-ended and terminates when every bucket is full.
//!
//! The corpus is persisted as plain CSV: the 18 feature columns in canonical
//! order plus the label column. Labels come from a closed set containing no
//! commas or quotes, so the fixed-schema reader/writer below is sufficient.

use crate::error::{AppError, Result};
use crate::models::{
    FeatureRecord, LabeledSample, SeverityCategory, FEATURE_COLUMNS, TARGET_COLUMN,
};
use crate::rules::categorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Default accepted rows per category
pub const DEFAULT_SAMPLES_PER_CATEGORY: usize = 1000;

/// Balanced corpus generator
pub struct CorpusGenerator {
    rng: StdRng,
}

impl CorpusGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw one candidate record with each feature uniform over its range
    fn random_record(&mut self) -> FeatureRecord {
        FeatureRecord {
            apparent_temperature: self.rng.gen_range(-30.0..50.0),
            cloud_cover: self.rng.gen_range(0.0..100.0),
            is_day: if self.rng.gen_bool(0.5) { 1.0 } else { 0.0 },
            precipitation: self.rng.gen_range(0.0..60.0),
            pressure_msl: self.rng.gen_range(900.0..1050.0),
            rain: self.rng.gen_range(0.0..60.0),
            relative_humidity_2m: self.rng.gen_range(0.0..100.0),
            showers: self.rng.gen_range(0.0..60.0),
            snowfall: self.rng.gen_range(0.0..30.0),
            surface_pressure: self.rng.gen_range(900.0..1050.0),
            temperature_2m: self.rng.gen_range(-30.0..50.0),
            weather_code: self.rng.gen_range(0.0..100.0),
            wind_direction_10m: self.rng.gen_range(0.0..360.0),
            wind_gusts_10m: self.rng.gen_range(0.0..60.0),
            wind_speed_10m: self.rng.gen_range(0.0..60.0),
            elevation: self.rng.gen_range(0.0..2000.0),
            latitude: self.rng.gen_range(-90.0..90.0),
            longitude: self.rng.gen_range(-180.0..180.0),
        }
    }

    /// Generate exactly `per_category` labeled rows for each of the five
    /// categories by rejection sampling.
    pub fn generate(&mut self, per_category: usize) -> Vec<LabeledSample> {
        let mut counts: HashMap<SeverityCategory, usize> = SeverityCategory::ALL
            .iter()
            .map(|c| (*c, 0usize))
            .collect();
        let mut samples = Vec::with_capacity(per_category * SeverityCategory::ALL.len());
        let mut draws: u64 = 0;

        while counts.values().any(|&n| n < per_category) {
            let record = self.random_record();
            draws += 1;
            let category = categorize(&record);
            let bucket = counts.get_mut(&category).unwrap();
            if *bucket < per_category {
                *bucket += 1;
                samples.push(LabeledSample::new(record, category));
            }
        }

        info!(
            accepted = samples.len(),
            draws = draws,
            per_category = per_category,
            "Corpus generation complete"
        );
        samples
    }
}

/// Write a corpus as CSV with the canonical header
pub fn write_corpus(path: &Path, samples: &[LabeledSample]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    let mut header: Vec<&str> = FEATURE_COLUMNS.to_vec();
    header.push(TARGET_COLUMN);
    writeln!(writer, "{}", header.join(","))?;

    for sample in samples {
        let values = sample.record.to_vector();
        let fields: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{},{}", fields.join(","), sample.category.label())?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = samples.len(), "Corpus written");
    Ok(())
}

/// Load a corpus file, validating the header and every row.
///
/// Malformed or empty files are a fatal [`AppError::Data`]: training cannot
/// proceed on a bad corpus.
pub fn load_corpus(path: &Path) -> Result<Vec<LabeledSample>> {
    let file = std::fs::File::open(path).map_err(|e| {
        AppError::Data(format!("cannot open corpus {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| AppError::Data("corpus file is empty".to_string()))??;
    let mut expected: Vec<&str> = FEATURE_COLUMNS.to_vec();
    expected.push(TARGET_COLUMN);
    let actual: Vec<&str> = header.split(',').collect();
    if actual != expected {
        return Err(AppError::Data(format!(
            "corpus header mismatch: expected {} columns, got {}",
            expected.len(),
            actual.len()
        )));
    }

    let mut samples = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != expected.len() {
            return Err(AppError::Data(format!(
                "corpus row {}: expected {} fields, got {}",
                line_no + 2,
                expected.len(),
                fields.len()
            )));
        }

        let mut values = [0.0f64; 18];
        for (i, field) in fields[..18].iter().enumerate() {
            values[i] = field.parse::<f64>().map_err(|_| {
                AppError::Data(format!(
                    "corpus row {}: column {} is not numeric: {:?}",
                    line_no + 2,
                    FEATURE_COLUMNS[i],
                    field
                ))
            })?;
        }
        let category = SeverityCategory::from_str(fields[18]).map_err(|_| {
            AppError::Data(format!(
                "corpus row {}: unknown category {:?}",
                line_no + 2,
                fields[18]
            ))
        })?;

        samples.push(LabeledSample::new(FeatureRecord::from_vector(&values), category));
    }

    if samples.is_empty() {
        return Err(AppError::Data("corpus contains no rows".to_string()));
    }
    Ok(samples)
}
