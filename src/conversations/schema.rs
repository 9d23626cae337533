diesel::table! {
    conversations (id) {
        id -> Integer,
        user_id -> Integer,
        title -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    messages (id) {
        id -> Integer,
        conversation_id -> Integer,
        role -> Text,
        content -> Text,
        created_at -> BigInt,
    }
}
