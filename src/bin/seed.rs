use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    models::{Category, Product, User},
    store::Store,
    store::snapshot::{JsonSnapshotFile, SnapshotSink},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let sink = JsonSnapshotFile::new(&config.snapshot_path);
    let store = Arc::new(Store::from_snapshot(sink.load().await?));

    let admin_id = ensure_user(&store, "admin@example.com", "admin123", "admin")?;
    let user_id = ensure_user(&store, "user@example.com", "user123", "customer")?;
    seed_catalog(&store);

    sink.save(&store.snapshot()).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {user_id}");
    Ok(())
}

fn ensure_user(store: &Store, email: &str, password: &str, role: &str) -> anyhow::Result<Uuid> {
    if let Some(existing) = store.user_by_email(email) {
        println!("User {email} already present (role={})", existing.role);
        return Ok(existing.id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash,
        role: role.to_string(),
        created_at: Utc::now(),
    };
    let id = user.id;
    store.insert_user(user);

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

fn seed_catalog(store: &Store) {
    let categories = vec![("Apparel", "Clothing and wearables"), ("Accessories", "Small goods")];
    for (name, description) in categories {
        let _ = store.insert_category(Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
        });
    }

    let products = vec![
        ("Storefront Hoodie", "Warm hoodie for late deploys", 550_000, "Apparel", 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", 120_000, "Accessories", 100),
        ("Sticker Pack", "Decorate your laptop", 50_000, "Accessories", 200),
        ("E-book: Async Rust", "Learn async Rust patterns", 250_000, "Accessories", 75),
    ];

    for (name, desc, price, category, stock) in products {
        // insert_product rejects duplicates by name, which makes reruns safe
        let _ = store.insert_product(Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some(desc.to_string()),
            price,
            category: category.to_string(),
            stock,
            created_at: Utc::now(),
        });
    }

    println!("Seeded catalog");
}
