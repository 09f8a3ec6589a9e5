use diagnosis_flow::ensemble::EnsembleWeights;
use diagnosis_flow::testing;
use diagnosis_flow::vocabulary::FeatureVector;
use proptest::prelude::*;

proptest! {
    #[test]
    fn every_binary_vector_gets_one_known_label(
        flags in prop::collection::vec(any::<bool>(), 8)
    ) {
        let predictor = testing::predictor();
        let vector = FeatureVector::from_values(
            flags.iter().map(|f| if *f { 1.0 } else { 0.0 }).collect(),
        );
        let prediction = predictor.predict(vector);
        let classes = testing::classes();
        prop_assert!(classes.contains(&prediction.final_label.name));
        prop_assert_eq!(
            predictor.labels().index_of(&prediction.final_label.name),
            Some(prediction.final_label.index)
        );
        for confidence in prediction.confidence_per_model.values() {
            prop_assert!(*confidence > 0.0 && *confidence <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn malformed_vectors_still_get_a_label(
        values in prop::collection::vec(-5.0f64..5.0, 0..20)
    ) {
        let predictor = testing::predictor();
        let prediction = predictor.predict(FeatureVector::from_values(values));
        prop_assert!(testing::classes().contains(&prediction.final_label.name));
    }

    #[test]
    fn weights_always_sum_to_one(raw in prop::collection::vec(0.0f64..100.0, 1..10)) {
        let weights = EnsembleWeights::new(raw).unwrap();
        let total: f64 = weights.as_slice().iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(weights.as_slice().iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn ranking_is_descending_and_bounded(
        flags in prop::collection::vec(any::<bool>(), 8),
        limit in 0usize..6
    ) {
        let predictor = testing::predictor();
        let vector = FeatureVector::from_values(
            flags.iter().map(|f| if *f { 1.0 } else { 0.0 }).collect(),
        );
        let ranked = predictor.rank(vector, limit);
        prop_assert_eq!(ranked.len(), limit.min(testing::classes().len()));
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].probability >= pair[1].probability);
        }
        for entry in &ranked {
            prop_assert!(entry.probability >= 0.0 && entry.probability <= 1.0 + 1e-9);
        }
    }
}
