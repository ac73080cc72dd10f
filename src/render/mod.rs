pub(crate) mod backend;
pub(crate) mod device;
#[cfg(feature = "gpu")]
pub(crate) mod gpu;
pub(crate) mod hardware;
pub(crate) mod reference;
pub(crate) mod software;
pub(crate) mod surface;
