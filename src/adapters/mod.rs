// Adapters layer: concrete implementations of the domain ports (device API, local files).

pub mod as3_client;
pub mod storage;

pub use as3_client::{As3Client, As3ClientBuilder};
pub use storage::LocalStorage;
