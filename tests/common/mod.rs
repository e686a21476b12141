pub(crate) mod logging;

pub(crate) mod mem_broker;

pub(crate) mod mem_cache;

pub(crate) mod mem_storage;

pub(crate) mod tree;
