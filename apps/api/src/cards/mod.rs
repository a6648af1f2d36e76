// Recipe cards: CRUD, settled bulk save, and JSON/Markdown export.

pub mod bulk;
pub mod export;
pub mod handlers;
