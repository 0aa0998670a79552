pub(crate) mod artifact;
pub(crate) mod config;
pub(crate) mod ledger;
pub(crate) mod session;
pub(crate) mod ticker;
