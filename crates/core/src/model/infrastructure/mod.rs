pub mod artifact_io;
pub mod csv_epoch_log;
pub mod logistic_network;
