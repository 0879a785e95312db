// # Query-string Dynamic DNS Updaters
//
// Services that take the new address as a query parameter on a single
// `GET /update` call.
//
// - [`DuckDnsUpdater`]: duckdns.org, success when the body is `OK`
// - [`DdnsFmUpdater`]: ddns.fm, success on HTTP 200
// - [`LightDnsUpdater`]: lightdns.io, success on HTTP 200
//
// None of them can read the current record back. The services themselves
// are idempotent, so a repeated call with the same address is harmless; a
// successful call is always reported as `Updated { previous: None }`.

mod http;

pub mod ddnsfm;
pub mod duckdns;
pub mod lightdns;

pub use ddnsfm::{DdnsFmFactory, DdnsFmUpdater};
pub use duckdns::{DuckDnsFactory, DuckDnsUpdater};
pub use lightdns::{LightDnsFactory, LightDnsUpdater};

use uddns_core::ComponentRegistry;

/// Register all query-string updaters with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_updater("duckdns", Box::new(DuckDnsFactory));
    registry.register_updater("ddnsfm", Box::new(DdnsFmFactory));
    registry.register_updater("lightdns", Box::new(LightDnsFactory));
}
