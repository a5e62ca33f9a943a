pub mod inventory_alerts;
pub mod scheduler;
