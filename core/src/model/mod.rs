//! Model trainer — decision-tree classifier over the feature table.
//!
//!   stratified holdout → grid search (stratified k-fold, mean F1)
//!   → refit best candidate → held-out F1 / accuracy / ROC-AUC
//!
//! Every candidate is a scaler fitted on its own training rows followed
//! by a CART tree. All shuffling draws from the trainer's stage RNG.

pub mod cross_validation;
pub mod decision_tree;
pub mod metrics;
pub mod scaler;
pub mod trainer;

pub use decision_tree::{DecisionTreeClassifier, TreeParams};
pub use trainer::{FeatureImportance, ModelReport, TrainerStage};
