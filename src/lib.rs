#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod alias;
pub mod config;
pub mod definition;
pub mod error;
pub mod mapping;
pub mod ready;
pub mod server;
pub mod setup;
pub mod status;
pub mod store;
