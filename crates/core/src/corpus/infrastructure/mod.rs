pub mod corpus_dump;
