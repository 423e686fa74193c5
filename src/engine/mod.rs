pub mod builder;
pub mod deferred;
pub mod dispatcher;
pub mod executors;
pub mod selector;
