pub(crate) mod animated;
pub(crate) mod player;
