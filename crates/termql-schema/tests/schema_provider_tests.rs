use anyhow::Result;
use termql_schema::{EntityType, SchemaIndex, SchemaProvider, StaticSchema, TypeId};
use uuid::Uuid;

#[test]
fn static_schema_round_trips_through_json() -> Result<()> {
    let g = Uuid::new_v4();
    let concept = TypeId::new(g, "Concept");
    let schema = StaticSchema::new(vec![EntityType::builder(concept.clone())
        .text_attribute("prefLabel")
        .reference_attribute("broader", concept.clone())
        .build()]);

    let text = serde_json::to_string(&schema)?;
    let loaded = StaticSchema::from_json(&text)?;
    assert_eq!(loaded, schema);

    let index = SchemaIndex::from_provider(&loaded)?;
    assert_eq!(index.referrers_of(&concept).len(), 1);
    Ok(())
}

struct FailingProvider;

impl SchemaProvider for FailingProvider {
    fn list_types(&self) -> Result<Vec<EntityType>> {
        Err(anyhow::anyhow!("schema store unavailable"))
    }
}

#[test]
fn provider_errors_propagate() {
    let err = SchemaIndex::from_provider(&FailingProvider).unwrap_err();
    assert!(err.to_string().contains("unavailable"), "err={err}");
}

#[test]
fn duplicate_types_from_provider_are_reported() {
    let g = Uuid::new_v4();
    let t = TypeId::new(g, "Term");
    let schema = StaticSchema::new(vec![
        EntityType::builder(t.clone()).build(),
        EntityType::builder(t).build(),
    ]);
    let err = SchemaIndex::from_provider(&schema).unwrap_err();
    assert!(err.to_string().contains("duplicate"), "err={err}");
}
