// Bulk import: parsing, per-card AI enhancement, background processing and
// the job tracker that polls active jobs.

pub mod enhance;
pub mod handlers;
pub mod parser;
pub mod processor;
pub mod prompts;
pub mod tracker;
