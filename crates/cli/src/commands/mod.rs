pub mod deactivate;
pub mod session;
pub mod test_connection;
