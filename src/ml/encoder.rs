use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Bidirectional mapping between category label strings and dense class
/// indices 0..k-1. Classes are sorted lexicographically at fit time, so the
/// index assignment is stable for a given label set; the assignment itself is
/// an internal detail of the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the class set from raw labels
    pub fn fit(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Err(AppError::Data(
                "cannot fit label encoder on empty label set".to_string(),
            ));
        }
        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();
        Ok(Self { classes })
    }

    /// Label string to class index
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| AppError::Data(format!("unknown label: {:?}", label)))
    }

    /// Class index back to label string
    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(|s| s.as_str())
            .ok_or_else(|| AppError::Data(format!("class index {} out of range", index)))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeverityCategory;

    #[test]
    fn test_fit_sorts_and_dedups() {
        let labels = vec![
            "Suave (Verde)".to_string(),
            "Crítico (Emergência Imediata)".to_string(),
            "Suave (Verde)".to_string(),
        ];
        let encoder = LabelEncoder::fit(&labels).unwrap();

        assert_eq!(encoder.n_classes(), 2);
        assert_eq!(encoder.classes()[0], "Crítico (Emergência Imediata)");
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let labels: Vec<String> = SeverityCategory::ALL.iter().map(|c| c.label()).collect();
        let encoder = LabelEncoder::fit(&labels).unwrap();

        for category in SeverityCategory::ALL {
            let label = category.label();
            let index = encoder.encode(&label).unwrap();
            assert_eq!(encoder.decode(index).unwrap(), label);
        }
    }

    #[test]
    fn test_unknown_label_rejected() {
        let encoder = LabelEncoder::fit(&["Suave (Verde)".to_string()]).unwrap();
        assert!(encoder.encode("Catastrófico").is_err());
        assert!(encoder.decode(5).is_err());
    }

    #[test]
    fn test_empty_fit_rejected() {
        assert!(LabelEncoder::fit(&[]).is_err());
    }
}
