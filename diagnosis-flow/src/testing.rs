//! Small deterministic artifact set for tests.
//!
//! Four diseases, each with a prototype symptom pattern, and one instance of every model
//! kind fitted by hand so that each model ranks a prototype's own disease first:
//!
//! | disease | symptoms |
//! |---|---|
//! | Allergy | skin_rash, itching |
//! | Common Cold | fever, cough, fatigue |
//! | Gastroenteritis | nausea, vomiting |
//! | Migraine | headache |
//!
//! An empty symptom set resolves to Migraine for every model.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::artifacts::{
    ArtifactMetadata, LABEL_ENCODER_FILE, METADATA_FILE, ModelEnvelope, WEIGHTS_FILE,
};
use crate::ensemble::{EnsemblePredictor, EnsembleWeights};
use crate::labels::LabelEncoder;
use crate::models::{
    BoostedTree, DecisionTree, GaussianNaiveBayes, GradientBoostedTrees, Kernel,
    LogisticRegression, ModelArtifact, ModelKind, NamedEstimator, PairwiseMachine, RandomForest,
    SoftVotingEnsemble, SplitRule, StackingEnsemble, SupportVectorClassifier,
};
use crate::vocabulary::{SymptomVocabulary, schema_hash};

const SYMPTOMS: [&str; 8] = [
    "fever",
    "headache",
    "cough",
    "nausea",
    "vomiting",
    "skin_rash",
    "itching",
    "fatigue",
];

const CLASSES: [&str; 4] = ["Allergy", "Common Cold", "Gastroenteritis", "Migraine"];

/// Held-out F1 scores in rf, nb, svm, xgb order.
const F1_SCORES: [f64; 4] = [0.96, 0.64, 0.8, 0.8];

const PROTOTYPES: [&[usize]; 4] = [&[5, 6], &[0, 2, 7], &[3, 4], &[1]];

pub fn symptoms() -> Vec<String> {
    SYMPTOMS.iter().map(|s| s.to_string()).collect()
}

pub fn classes() -> Vec<String> {
    CLASSES.iter().map(|s| s.to_string()).collect()
}

fn prototype(class: usize) -> Vec<f64> {
    let mut vector = vec![0.0; SYMPTOMS.len()];
    for index in PROTOTYPES[class] {
        vector[*index] = 1.0;
    }
    vector
}

fn split(feature: i64, left: i64, right: i64) -> (i64, i64, i64, Vec<f64>) {
    (left, right, feature, vec![0.0; CLASSES.len()])
}

fn leaf(value: Vec<f64>) -> (i64, i64, i64, Vec<f64>) {
    (-1, -1, -2, value)
}

fn tree(nodes: Vec<(i64, i64, i64, Vec<f64>)>, threshold: f64, rule: SplitRule) -> DecisionTree {
    let mut tree = DecisionTree {
        children_left: Vec::new(),
        children_right: Vec::new(),
        feature: Vec::new(),
        threshold: Vec::new(),
        value: Vec::new(),
        split: rule,
    };
    for (left, right, feature, value) in nodes {
        tree.children_left.push(left);
        tree.children_right.push(right);
        tree.feature.push(feature);
        tree.threshold.push(if left < 0 { -2.0 } else { threshold });
        tree.value.push(value);
    }
    tree
}

fn random_forest() -> RandomForest {
    let main = tree(
        vec![
            split(1, 1, 2),
            split(5, 3, 4),
            leaf(vec![0.0, 1.0, 1.0, 8.0]),
            split(3, 5, 6),
            leaf(vec![8.0, 1.0, 0.0, 1.0]),
            split(2, 7, 8),
            leaf(vec![0.0, 1.0, 8.0, 1.0]),
            leaf(vec![1.0, 1.0, 1.0, 2.0]),
            leaf(vec![1.0, 8.0, 0.0, 1.0]),
        ],
        0.5,
        SplitRule::LessOrEqual,
    );
    let fever = tree(
        vec![
            split(0, 1, 2),
            leaf(vec![1.0, 1.0, 1.0, 1.0]),
            leaf(vec![0.0, 3.0, 0.0, 1.0]),
        ],
        0.5,
        SplitRule::LessOrEqual,
    );
    RandomForest {
        n_features: SYMPTOMS.len(),
        n_classes: CLASSES.len(),
        trees: vec![main, fever],
    }
}

fn naive_bayes() -> GaussianNaiveBayes {
    GaussianNaiveBayes {
        class_prior: vec![0.25; CLASSES.len()],
        theta: (0..CLASSES.len()).map(prototype).collect(),
        var: vec![vec![0.25; SYMPTOMS.len()]; CLASSES.len()],
    }
}

fn svm() -> SupportVectorClassifier {
    let mut machines = Vec::new();
    for positive in 0..CLASSES.len() {
        for negative in (positive + 1)..CLASSES.len() {
            machines.push(PairwiseMachine {
                positive,
                negative,
                support: vec![positive, negative],
                dual_coef: vec![1.0, -1.0],
                intercept: 0.0,
                prob_a: -3.0,
                prob_b: 0.0,
            });
        }
    }
    SupportVectorClassifier {
        n_features: SYMPTOMS.len(),
        n_classes: CLASSES.len(),
        kernel: Kernel::Linear,
        support_vectors: (0..CLASSES.len()).map(prototype).collect(),
        machines,
    }
}

fn stump(feature: i64, below: f64, above: f64) -> DecisionTree {
    tree(
        vec![
            (1, 2, feature, vec![0.0]),
            (-1, -1, -2, vec![below]),
            (-1, -1, -2, vec![above]),
        ],
        1.0,
        SplitRule::LessThan,
    )
}

fn xgboost() -> GradientBoostedTrees {
    let trees = vec![
        (0, stump(5, -1.0, 2.0)),
        (1, stump(2, -1.0, 2.0)),
        (1, stump(0, 0.0, 1.0)),
        (2, stump(3, -1.0, 1.5)),
        (2, stump(4, 0.0, 1.0)),
        (3, stump(1, -0.5, 2.0)),
    ];
    GradientBoostedTrees {
        n_features: SYMPTOMS.len(),
        n_classes: CLASSES.len(),
        base_score: 0.5,
        trees: trees
            .into_iter()
            .map(|(class, tree)| BoostedTree { class, tree })
            .collect(),
    }
}

fn named(name: &str, model: ModelArtifact) -> NamedEstimator {
    NamedEstimator {
        name: name.to_string(),
        model,
    }
}

fn stacking() -> StackingEnsemble {
    let estimators = vec![
        named("rf", ModelArtifact::RandomForest(random_forest())),
        named("nb", ModelArtifact::NaiveBayes(naive_bayes())),
    ];
    let width = estimators.len() * CLASSES.len();
    let coef = (0..CLASSES.len())
        .map(|class| {
            let mut row = vec![0.0; width];
            for estimator in 0..estimators.len() {
                row[estimator * CLASSES.len() + class] = 3.0;
            }
            row
        })
        .collect();
    StackingEnsemble {
        n_features: SYMPTOMS.len(),
        n_classes: CLASSES.len(),
        estimators,
        final_estimator: LogisticRegression {
            coef,
            intercept: vec![0.0; CLASSES.len()],
        },
    }
}

fn voting() -> SoftVotingEnsemble {
    SoftVotingEnsemble {
        n_features: SYMPTOMS.len(),
        n_classes: CLASSES.len(),
        estimators: vec![
            named("rf", ModelArtifact::RandomForest(random_forest())),
            named("svm", ModelArtifact::Svm(svm())),
            named("nb", ModelArtifact::NaiveBayes(naive_bayes())),
            named("xgb", ModelArtifact::Xgboost(xgboost())),
        ],
        weights: Some(vec![2.0, 1.0, 1.0, 2.0]),
    }
}

pub fn models() -> Vec<ModelArtifact> {
    vec![
        ModelArtifact::Svm(svm()),
        ModelArtifact::NaiveBayes(naive_bayes()),
        ModelArtifact::RandomForest(random_forest()),
        ModelArtifact::Xgboost(xgboost()),
        ModelArtifact::Stacking(stacking()),
        ModelArtifact::Voting(voting()),
    ]
}

pub fn parts() -> (SymptomVocabulary, LabelEncoder, Vec<ModelArtifact>, EnsembleWeights) {
    (
        SymptomVocabulary::new(symptoms()).expect("fixture vocabulary"),
        LabelEncoder::new(classes()).expect("fixture labels"),
        models(),
        EnsembleWeights::new(F1_SCORES.to_vec()).expect("fixture weights"),
    )
}

/// Predictor with all six models.
pub fn predictor() -> EnsemblePredictor {
    predictor_without(&[])
}

/// Predictor with the given optional arbiters removed.
pub fn predictor_without(excluded: &[ModelKind]) -> EnsemblePredictor {
    let (vocabulary, labels, mut models, weights) = parts();
    models.retain(|model| !excluded.contains(&model.kind()));
    EnsemblePredictor::new(vocabulary, labels, models, weights).expect("fixture predictor")
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    fs::write(dir.join(name), bytes)
}

/// Writes the complete artifact set into `dir`.
pub fn write_artifacts(dir: &Path) -> io::Result<()> {
    let metadata = ArtifactMetadata::new(symptoms(), classes(), F1_SCORES.to_vec());
    write_json(dir, METADATA_FILE, &metadata)?;
    write_json(
        dir,
        LABEL_ENCODER_FILE,
        &LabelEncoder::new(classes()).expect("fixture labels"),
    )?;
    write_json(dir, WEIGHTS_FILE, &F1_SCORES)?;

    let hash = schema_hash(&symptoms(), &classes());
    for model in models() {
        let file_name = model.kind().file_name();
        let envelope = ModelEnvelope {
            schema_hash: hash.clone(),
            model,
        };
        write_json(dir, file_name, &envelope)?;
    }
    Ok(())
}
