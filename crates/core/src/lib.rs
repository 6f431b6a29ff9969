pub mod corpus;
pub mod extraction;
pub mod features;
pub mod media;
pub mod model;
pub mod shared;
pub mod subtitles;
pub mod training;
