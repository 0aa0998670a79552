pub(crate) mod animate;
