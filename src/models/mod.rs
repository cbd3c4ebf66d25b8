pub mod daily_entry;
pub mod provider_link;
pub mod user;
