pub mod audio;
pub mod safe_list;
pub mod ticker;
pub mod ticker_manager;
pub mod time_control;
