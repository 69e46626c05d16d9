pub mod db_utils;
pub mod query_cache;
