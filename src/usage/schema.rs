diesel::table! {
    daily_usage (id) {
        id -> Integer,
        user_id -> Integer,
        day -> BigInt,
        messages_count -> BigInt,
    }
}
