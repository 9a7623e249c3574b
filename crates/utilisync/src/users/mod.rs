//! User accounts: model, storage, notifications, service and routes.

pub mod model;
pub mod notify;
pub mod pages;
pub mod routes;
pub mod service;
pub mod store;

pub use model::User;
pub use notify::{LogNotifier, Notifier, NoopNotifier};
pub use routes::register_user_routes;
pub use service::UserService;
pub use store::{InMemoryUserStore, ListFilter, StoreError, UserStore};
