pub mod db;
pub mod question_llm;

pub use db::DbAdapter;
pub use question_llm::{OpenAiQuestionAdapter, StubQuestionAdapter};
