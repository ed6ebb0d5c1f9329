// Core modules implementing decoding, tokenizing, record assembly, caching, and error modeling.
pub mod assembler;
pub mod buffer;
pub mod cache;
pub mod column;
pub mod convert;
pub mod cursor;
pub mod error;
pub mod options;
pub mod policy;
pub mod reader;
pub mod record;
pub mod source;
pub mod tokenizer;
pub mod view;
