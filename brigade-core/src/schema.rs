use diesel::{table, allow_tables_to_appear_in_same_query};

table! {
    notifications (id) {
        id -> BigInt,
        restaurant_id -> Text,
        module -> Text,
        kind -> Text,
        title -> Text,
        message -> Text,
        link -> Text,
        data -> Jsonb,
        meta -> Jsonb,
        read -> Bool,
        read_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

table! {
    push_subscriptions (id) {
        id -> BigInt,
        endpoint -> Text,
        p256dh -> Text,
        auth -> Text,
        restaurant_id -> Text,
        module -> Text,
        user_id -> Nullable<Text>,
        created_at -> Timestamptz,
        last_seen_at -> Timestamptz,
    }
}

allow_tables_to_appear_in_same_query!(notifications, push_subscriptions);
