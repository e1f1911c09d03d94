pub mod evaluate;
pub mod menu_info;
pub mod sleep;
