pub mod card;
pub mod collection;
pub mod import_job;
