// Project activity: GitHub/Cloudflare enrichment, merged feeds, and the
// back-office writes that feed them. Remote calls go through `connectors`.

pub mod dashboard;
pub mod enrichment;
pub mod feed;
pub mod handlers;
pub mod tech_stack;
#[cfg(test)]
pub(crate) mod test_support;
pub mod updates;
