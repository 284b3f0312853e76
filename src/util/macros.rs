/// Converts a snowflake id newtype (`UserId`, `GuildId`, `RoleId`, ...)
/// into the `i64` representation used by the Postgres schema.
macro_rules! i64_from_id {
    ($id:expr) => {{
        let id: u64 = $id.0;
        #[allow(clippy::cast_possible_wrap)]
        let id: i64 = ::core::convert::identity::<u64>(id) as i64;
        id
    }};
}

/// Converts an `i64` database id back into the `u64` a snowflake
/// newtype wraps.
macro_rules! u64_from_db_id {
    ($id:expr) => {{
        let id: i64 = $id;
        #[allow(clippy::cast_sign_loss)]
        let id: u64 = ::core::convert::identity::<i64>(id) as u64;
        id
    }};
}

// Exporting the macros
// https://stackoverflow.com/questions/26731243/how-do-i-use-a-macro-across-module-files/67140319#67140319
pub(crate) use i64_from_id;
pub(crate) use u64_from_db_id;
