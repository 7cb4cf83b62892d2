//! Chrome page backend for Herbie over the DevTools Protocol.
//!
//! 1. Start Chrome with remote debugging:
//!    ```bash
//!    chrome --remote-debugging-port=9222
//!    ```
//!
//! 2. Attach and hand the page to an engine session:
//!    ```rust,ignore
//!    let client = CdpClient::connect("http://localhost:9222").await?;
//!    let page = CdpPage::new(client.page(None).await?);
//!    ```
//!
//! Elements are addressed through a registry the backend injects into each
//! document. The backend cannot stream DOM mutations, so watchers poll.

mod client;
mod error;
mod page;
mod protocol;
mod script;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use page::CdpPage;
pub use protocol::{BrowserVersion, PageInfo};
pub use session::PageSession;
