// Aggregates all former standalone integration tests as modules.
mod dispatcher;
mod resolver;
