pub mod middleware;
pub mod password;
pub mod user_store;
