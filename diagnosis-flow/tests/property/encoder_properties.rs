use diagnosis_flow::testing;
use diagnosis_flow::vocabulary::{SymptomVocabulary, normalize_symptom};
use proptest::prelude::*;

fn vocabulary() -> SymptomVocabulary {
    SymptomVocabulary::new(testing::symptoms()).unwrap()
}

proptest! {
    #[test]
    fn encoding_has_vocabulary_width_and_binary_flags(
        reported in prop::collection::vec(".{0,24}", 0..12)
    ) {
        let vocabulary = vocabulary();
        let vector = vocabulary.encode(&reported);
        prop_assert_eq!(vector.len(), vocabulary.len());
        prop_assert!(vector.as_slice().iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn known_symptoms_set_exactly_their_slots(
        picks in prop::collection::vec(0usize..8, 0..8),
        noise in prop::collection::vec("[a-z]{12,20}", 0..4)
    ) {
        let vocabulary = vocabulary();
        let symptoms = testing::symptoms();
        let mut reported: Vec<String> = picks.iter().map(|i| symptoms[*i].to_uppercase()).collect();
        reported.extend(noise);

        let vector = vocabulary.encode(&reported);
        for (index, value) in vector.as_slice().iter().enumerate() {
            let expected = if picks.contains(&index) { 1.0 } else { 0.0 };
            prop_assert_eq!(*value, expected);
        }
    }

    #[test]
    fn normalization_is_idempotent(raw in ".{0,40}") {
        let once = normalize_symptom(&raw);
        prop_assert_eq!(normalize_symptom(&once), once.clone());
    }
}

#[test]
fn empty_set_encodes_to_all_zero() {
    let vocabulary = vocabulary();
    let vector = vocabulary.encode(Vec::<String>::new());
    assert_eq!(vector.len(), vocabulary.len());
    assert_eq!(vector.active_count(), 0);
}
