pub mod api;
pub mod human;
pub mod model;
pub mod poll;
pub mod reconcile;
pub mod store;
pub mod view;

pub use api::{proxy, Error, ProxyClient};
pub use poll::{Monitor, PollConfig, PollState, ProviderStatus, RetryPolicy};
pub use store::{BlobStore, CredentialStore, FileStore, MemoryStore};
pub use view::ProviderView;
