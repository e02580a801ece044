pub mod jsonl;

pub use jsonl::JsonLinesSink;
