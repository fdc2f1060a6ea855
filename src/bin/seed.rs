use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use storefront_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    models::Role,
    services::{auth_service::hash_password, product_service::slugify},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let orm = orm_from_pool(pool);

    let admin_id = ensure_user(&orm, "Store Admin", "admin@example.com", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&orm, "Demo Shopper", "user@example.com", "user123", Role::User).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        let id = existing.id;
        let mut active: UserActive = existing.into();
        active.role = Set(role.as_str().to_string());
        active.update(orm).await?;
        println!("Ensured user {email} (role={role})");
        return Ok(id);
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Created user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let products = [
        ("Seiko 5 Sports SRPD55", "Seiko", "Men", 5_500_000, 12, "seiko-5.png"),
        ("Casio G-Shock GA-2100", "Casio", "Men", 2_800_000, 30, "g-shock.png"),
        ("Tissot PRX Powermatic 80", "Tissot", "Men", 19_500_000, 4, "tissot-prx.png"),
        ("Fossil Carlie Mini", "Fossil", "Women", 3_200_000, 18, "fossil-carlie.png"),
        ("Michael Kors Parker", "Michael Kors", "Women", 6_400_000, 7, "mk-parker.png"),
    ];

    for (title, brand, category, price, stock, image) in products {
        let Some(slug) = slugify(title) else {
            continue;
        };
        let exists = Products::find()
            .filter(ProductCol::Slug.eq(slug.as_str()))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        ProductActive {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            slug: Set(slug),
            description: Set(Some(format!("{brand} {category}'s watch"))),
            brand: Set(Some(brand.to_string())),
            category: Set(Some(category.to_string())),
            price: Set(price),
            count_in_stock: Set(stock),
            images: Set(serde_json::json!([image])),
            rating: Set(0.0),
            num_reviews: Set(0),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
