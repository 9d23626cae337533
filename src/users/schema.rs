diesel::table! {
    users (id) {
        id -> Integer,
        email -> Text,
        password_hash -> Text,
        role -> Text,
        status -> Text,
        locale -> Text,
        created_at -> BigInt,
    }
}
