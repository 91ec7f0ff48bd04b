//! Collaborators that talk to the outside world.
//!
//! - Page rendering (`PageRenderer`, `HttpPageRenderer`, and
//!   `ChromiumPageRenderer` with the `browser` feature)
//! - Asset fetching (`AssetFetcher`, `HttpAssetFetcher`)
//! - Target-list loading (`TargetProvider` and its sources)

#[cfg(feature = "browser")]
pub mod browser;
pub mod fetch;
pub mod render;
pub mod targets;

#[cfg(feature = "browser")]
pub use browser::ChromiumPageRenderer;
pub use fetch::{AssetFetcher, FetchedAsset, HttpAssetFetcher};
pub use render::{HttpPageRenderer, PageRenderer, RenderSession, render_scoped};
pub use targets::{
    FileTargetProvider, SanityTargetProvider, StaticTargetProvider, TargetProvider,
};
