pub mod alerts;
pub mod catalog;
pub mod dispatcher;
pub mod notifications;
pub mod products;
pub mod push_subscriptions;
pub mod scan;
pub mod schedules;
