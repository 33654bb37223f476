//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `contentweave_core` linkage.
//! - Run one in-memory collation so redirect wiring can be checked by eye.

use contentweave_core::db::open_db_in_memory;
use contentweave_core::{
    Content, ContentCollator, ContentTypeDef, ContentTypeRegistry, ItemVersion, PersistOptions,
    RedirectRule, SqliteContainerRepository, TypeName, VersionContext,
};
use serde_json::json;
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    println!("contentweave_core ping={}", contentweave_core::ping());
    println!("contentweave_core version={}", contentweave_core::core_version());

    let registry = ContentTypeRegistry::new()
        .with(
            ContentTypeDef::new("Demo.Article")
                .segments(&["Section", "Slug"])
                .redirect(RedirectRule::new(
                    Some("Demo.Index"),
                    "index/{0}",
                    &["IndexTitle > Title"],
                )),
        )?
        .with(ContentTypeDef::new("Demo.Index"))?;
    let registry = Arc::new(registry);

    let conn = open_db_in_memory()?;
    let collator = ContentCollator::new(SqliteContainerRepository::try_new(&conn)?, registry);
    let mut ctx = VersionContext::default();

    let index_address = collator
        .registry()
        .address_from_path(&TypeName::from("Demo.Index"), "/index/news");
    let mut index = Content::new(
        TypeName::from("Demo.Index"),
        ItemVersion::new(),
        json!({"Title": "News"}),
    );
    collator.set(&mut ctx, Some(&index_address), &mut index, PersistOptions::default())?;

    let article_address = collator
        .registry()
        .address_from_path(&TypeName::from("Demo.Article"), "/news/hello");
    let mut article = Content::new(
        TypeName::from("Demo.Article"),
        ItemVersion::new(),
        json!({"Title": "Hello", "Body": "First post"}),
    );
    collator.set(&mut ctx, Some(&article_address), &mut article, PersistOptions::default())?;

    for item in collator.get_by_addresses(&mut ctx, &[article_address])? {
        println!("{} {}", item.content_type, serde_json::to_string(&item.data)?);
    }
    Ok(())
}
