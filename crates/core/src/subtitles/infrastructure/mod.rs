pub mod subtitle_parser;
