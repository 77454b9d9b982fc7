//! Medicine catalog models.

use serde::{Deserialize, Serialize};

/// A medicine in the training formulary. Immutable reference data owned by
/// the catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    /// Catalog identifier (matches the barcode scanned on the ward)
    pub id: String,
    /// Display name
    pub name: String,
    /// Category label (e.g. "pain-killer", "antibiotic")
    pub category: String,
    /// Default dose text (e.g. "500mg")
    pub default_dose: String,
    /// Default route (e.g. "PO", "IV")
    pub default_route: String,
    /// Default frequency phrase (e.g. "Every 6 hours")
    pub default_frequency: String,
    /// Whether this medicine is normally given as-needed
    pub is_prn: bool,
}

impl Medicine {
    /// Create a catalog entry with required fields.
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            category: String::new(),
            default_dose: String::new(),
            default_route: String::new(),
            default_frequency: String::new(),
            is_prn: false,
        }
    }

    /// Pain-relief medicines prompt a follow-up pain assessment after a
    /// successful administration.
    pub fn is_pain_relief(&self) -> bool {
        matches!(
            self.category.to_lowercase().as_str(),
            "pain-killer" | "painkiller" | "pain-relief" | "analgesic"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pain_relief_category() {
        let mut med = Medicine::new("10000001".into(), "Paracetamol".into());
        med.category = "Pain-Killer".into();
        assert!(med.is_pain_relief());

        med.category = "antibiotic".into();
        assert!(!med.is_pain_relief());

        med.category = "analgesic".into();
        assert!(med.is_pain_relief());
    }

    #[test]
    fn test_unrelated_category_is_not_pain_relief() {
        let mut med = Medicine::new("10000002".into(), "Amoxicillin".into());
        med.category = "pain-adjacent".into();
        assert!(!med.is_pain_relief());
    }
}
