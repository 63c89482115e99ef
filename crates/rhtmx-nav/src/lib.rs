// File: rhtmx-nav/src/lib.rs
// Purpose: Navigation services for RHTMX client routing

//! # rhtmx-nav
//!
//! Everything that happens around a client-side navigation:
//!
//! - Guard chain (loop prevention, enabled, auth, role, dependencies)
//! - Active route and navigation history tracking
//! - Locale resolution (URL, cached choice, platform language, default)
//! - Section bundle preloading driven by the build manifest
//! - Per-section translation loading with base-locale fallback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rhtmx_nav::{GuardContext, NavConfig, Navigator};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let navigator = Navigator::from_config(NavConfig::load_default()?)?;
//!
//! let outcome = navigator.navigate("/feed", &GuardContext::authenticated("fan"));
//! if outcome.is_allowed() {
//!     let report = outcome.wait_for_background().await;
//!     println!("{:?}", report);
//! } else {
//!     println!("redirect to {:?}: {}", outcome.guard.redirect_to, outcome.guard.reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Services never fail outward: missing manifests, translation units or
//! assets degrade to empty results and are logged. The one exception is the
//! guard chain, which blocks a navigation when a guard errors.

pub mod cache;
pub mod config;
pub mod environment;
pub mod error;
pub mod guard;
pub mod history;
pub mod locale;
pub mod manifest;
pub mod navigator;
pub mod preload;
pub mod translation;

pub use cache::{CachedValue, NavCache};
pub use config::NavConfig;
pub use environment::{Environment, MemoryEnvironment};
pub use error::{GuardError, LoadError, LoadResult};
pub use guard::{
    AuthGuard, DependencyGuard, EnabledGuard, GuardChain, GuardContext, GuardRequest, GuardResult,
    LoopGuard, RoleGuard, RouteGuard,
};
pub use history::{ActiveRoute, HistoryEntry, NavigationHistory, NavigationStatistics};
pub use locale::{LocalePreference, LocaleResolver, LocaleSource};
pub use manifest::{
    BundlePaths, FileManifestSource, Manifest, ManifestEntry, ManifestLoader, ManifestSource,
    StaticManifestSource,
};
pub use navigator::{load_route_table, BackgroundReport, NavigationOutcome, Navigator, NavigatorBuilder};
pub use preload::{
    AssetKind, AssetLoader, DocumentHead, LinkRel, PreloadLink, PreloadRecord, PreloadState,
    PreloadStatistics, PreloadSummary, ResourceTable, SectionPreloader, StaticAssetDir,
};
pub use translation::{
    flatten_translations, DirectoryCatalog, MemoryCatalog, TranslationLoader, TranslationMap,
    TranslationSource, TranslationStatistics,
};

// Re-export the shared building blocks
pub use rhtmx_cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use rhtmx_router::{RouteDescriptor, RouteTable};
