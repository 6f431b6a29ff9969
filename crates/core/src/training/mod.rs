pub mod train_request;
pub mod trainer;
pub mod training_error;
pub mod training_logger;
