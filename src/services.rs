pub mod issuance;
pub mod reconcile;
