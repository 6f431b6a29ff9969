pub mod corpus_error;
pub mod extracted_corpus;
pub mod normalization;
pub mod training_set;
