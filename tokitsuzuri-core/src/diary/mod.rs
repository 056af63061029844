//! Persisted diary entries

pub mod book;
pub mod record;

pub use book::DiaryBook;
pub use record::DiaryRecord;
