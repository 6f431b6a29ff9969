pub mod extracted_sample;
pub mod feature_embedder;
