pub mod api_errors;
pub mod routes;
pub mod shopify;
