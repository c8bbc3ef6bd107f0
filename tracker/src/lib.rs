#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::future_not_send
)]

mod async_semaphore;
mod job_registry;

pub use async_semaphore::{AsyncSemaphore, AsyncSemaphorePermit};
pub use job_registry::JobRegistry;
