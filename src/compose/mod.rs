pub(crate) mod blend;
pub(crate) mod clip;
pub(crate) mod mask;
