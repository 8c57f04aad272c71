//! Feature Gram Validation

use window_data::SizedIterable;

use crate::error::FeatureError;
use crate::feature::LabeledFeatureGram;

/// Check that extraction produced usable grams, looking at the first window
pub fn check_feature_grams(data: &dyn SizedIterable<Vec<LabeledFeatureGram>>) -> Result<(), FeatureError> {
    let first = data.items().next().ok_or(FeatureError::NoFeatureArrays)?;
    if first.is_empty() {
        return Err(FeatureError::NoFeatureGrams);
    }
    if let Some(index) = first.iter().position(|g| g.gram().is_empty()) {
        return Err(FeatureError::EmptyFeatureGram { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FeatureGram};
    use std::sync::Arc;

    fn gram(features: usize) -> LabeledFeatureGram {
        let features = (0..features).map(|i| Feature::new(i as f64, 1.0, vec![1.0])).collect();
        LabeledFeatureGram::new(Arc::new(Default::default()), Arc::new(FeatureGram::new(features)))
    }

    #[test]
    fn test_valid_grams() {
        let data = vec![vec![gram(2), gram(1)]];
        assert!(check_feature_grams(&data).is_ok());
    }

    #[test]
    fn test_no_arrays() {
        let data: Vec<Vec<LabeledFeatureGram>> = Vec::new();
        let err = check_feature_grams(&data).unwrap_err();
        assert_eq!(err, FeatureError::NoFeatureArrays);
        assert!(err.to_string().contains("Did you specify the correct training label?"));
    }

    #[test]
    fn test_empty_first_array() {
        let data = vec![Vec::new(), vec![gram(1)]];
        assert_eq!(check_feature_grams(&data), Err(FeatureError::NoFeatureGrams));
    }

    #[test]
    fn test_empty_gram_reports_index() {
        let data = vec![vec![gram(3), gram(0)]];
        let err = check_feature_grams(&data).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Featuregram[1] in the first array of feature grams contains zero features."
        );
    }
}
