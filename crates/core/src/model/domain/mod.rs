pub mod fit_history;
pub mod hyperparameters;
pub mod model_error;
pub mod sequence_model;
