pub(crate) mod canvas;
pub(crate) mod composite;
pub(crate) mod compositor;
pub(crate) mod layers;
pub(crate) mod text;
