pub mod discount_repo;
pub mod shop_repo;
