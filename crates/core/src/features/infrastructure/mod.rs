mod mel;
pub mod mfcc_feature_embedder;
