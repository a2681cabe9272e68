pub(crate) mod control;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod shared;
pub(crate) mod work;
