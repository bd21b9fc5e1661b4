//! Backend dispatch macro.
//!
//! Every operation branches on the connection's backend exactly once; this
//! macro keeps those matches uniform and lets arms carry `#[cfg]` attributes
//! so a disabled backend simply has no arm.

/// Macro for generating backend dispatch match arms over a [`Connection`].
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     #[cfg(feature = "mssql")]
///     Cursor(client) => mssql::do_thing(client).await,
///     #[cfg(feature = "postgres")]
///     ResultSet(pg) => postgres::do_thing(pg).await,
/// });
/// ```
///
/// [`Connection`]: crate::db::Connection
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($(#[$meta:meta])* $variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $(#[$meta])*
                $crate::db::Connection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;

