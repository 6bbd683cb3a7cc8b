pub mod backend;
pub mod models;
pub mod remote;
pub mod store;

pub use backend::{ChatBackend, LocalBackend, SessionState};
pub use models::{Chat, DeliveryStatus, Message, Role};
pub use remote::FirestoreBackend;
pub use store::SessionStore;
