//! Queries shared by more than one handler: listing search, cascading
//! deletes and the reporting queries written in raw SQL.

pub mod messages;
pub mod properties;
pub mod reviews;
pub mod users;
