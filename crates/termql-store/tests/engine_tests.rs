use anyhow::Result;
use chrono::NaiveDate;
use std::io::Write;
use termql_schema::{EntityType, LangValue, Node, StaticSchema, TypeId};
use termql_select::{QualifiedSelect, QualifierMode};
use termql_spec::{NodeLeaf, Specification};
use termql_store::{
    EngineConfig, MemoryIndex, MemoryRelationalStore, QueryEngine, SearchOptions, SortField,
};
use uuid::Uuid;

struct Fixture {
    engine: QueryEngine,
    concept: TypeId,
    term: TypeId,
    nodes: Vec<Node>,
}

fn fixture(config: EngineConfig) -> Result<Fixture> {
    let g = Uuid::new_v4();
    let concept = TypeId::new(g, "Concept");
    let term = TypeId::new(g, "Term");
    let schema = StaticSchema::new(vec![
        EntityType::builder(concept.clone())
            .text_attribute("prefLabel")
            .reference_attribute("prefLabelXl", term.clone())
            .reference_attribute("broader", concept.clone())
            .build(),
        EntityType::builder(term.clone())
            .text_attribute("value")
            .build(),
    ]);
    let engine = QueryEngine::new(config, &schema)?;

    let created = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let nodes = (0..5)
        .map(|i| {
            Node::new(Uuid::from_u128(i + 1), concept.clone(), created)
                .with_code(format!("c{i}"))
                .with_number(i as i64)
                .with_property("prefLabel", LangValue::new("en", format!("Concept {i}")))
        })
        .collect();
    Ok(Fixture {
        engine,
        concept,
        term,
        nodes,
    })
}

#[test]
fn relational_and_index_finds_agree() -> Result<()> {
    let f = fixture(EngineConfig::default())?;
    let store = MemoryRelationalStore::from_nodes(&f.nodes);
    let index = MemoryIndex::from_nodes(&f.nodes)?;

    let spec = f.engine.parse("type.id:Concept AND NOT (code:c1 OR code:c3)")?;
    let relational = f.engine.find_relational(&store, &spec)?;
    let indexed = f.engine.find_indexed(
        &index,
        &spec,
        &SearchOptions::default().sorted_by(SortField::asc("code")),
    )?;
    assert_eq!(relational, indexed);
    assert_eq!(
        relational.iter().map(|k| k.id.as_u128()).collect::<Vec<_>>(),
        vec![1, 3, 5]
    );
    Ok(())
}

#[test]
fn index_finds_use_the_configured_limit() -> Result<()> {
    let mut config = EngineConfig::default();
    config.index.default_limit = 2;
    let f = fixture(config)?;
    let index = MemoryIndex::from_nodes(&f.nodes)?;

    let spec = Specification::MatchAll;
    assert_eq!(f.engine.find_indexed(&index, &spec, &SearchOptions::default())?.len(), 2);
    let explicit = SearchOptions::default().limited_to(4);
    assert_eq!(f.engine.find_indexed(&index, &spec, &explicit)?.len(), 4);
    Ok(())
}

#[test]
fn property_leaves_do_not_compile_to_sql() -> Result<()> {
    let f = fixture(EngineConfig::default())?;
    let store = MemoryRelationalStore::from_nodes(&f.nodes);
    let spec = Specification::and([
        Specification::leaf(NodeLeaf::ByCode("c1".into())),
        Specification::leaf(NodeLeaf::ByPropertyWords {
            attr: "prefLabel".into(),
            lang: String::new(),
            text: "concept".into(),
        }),
    ]);
    let err = f.engine.find_relational(&store, &spec).unwrap_err();
    assert!(err.to_string().contains("relational"), "err={err}");
    assert!(f.engine.compile_index(&spec).is_ok());
    Ok(())
}

#[test]
fn normal_forms_respect_the_clause_budget() -> Result<()> {
    let mut config = EngineConfig::default();
    config.normal_form.max_clauses = 8;
    let f = fixture(config)?;
    // (a1 AND b1) OR (a2 AND b2) OR ... expands to 2^n CNF clauses
    let text = (0..4)
        .map(|i| format!("(code:a{i} AND number:{i})"))
        .collect::<Vec<_>>()
        .join(" OR ");
    let spec = f.engine.parse(&text)?;
    assert!(f.engine.normalize_cnf(&spec).is_err());
    assert_eq!(f.engine.normalize_dnf(&spec)?.len(), 4);
    Ok(())
}

#[test]
fn select_uses_the_configured_mode() -> Result<()> {
    let text = "props.prefLabel,refs.prefLabelXl,props.value";

    let f = fixture(EngineConfig::default())?;
    let transitive = f.engine.select(text, &[f.concept.clone()])?;
    assert!(transitive
        .plan
        .property_depth(&f.term, "value")
        .is_some());

    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{"select": {{"mode": "depth_bounded"}}}}"#)?;
    let config = EngineConfig::load(Some(file.path()))?;
    assert_eq!(config.select.mode, QualifierMode::DepthBounded);

    let f = fixture(config)?;
    let layered = f.engine.select(text, &[f.concept.clone()])?;
    // Term is one layer past prefLabelXl's depth of 1, but properties follow
    // every layer reached.
    assert_eq!(layered.plan.property_depth(&f.term, "value"), Some(1));
    assert_eq!(layered.plan.reference_depth(&f.concept, "prefLabelXl"), Some(1));
    assert!(layered.selects.contains(&QualifiedSelect::Property {
        attribute: termql_schema::TextAttributeId::new(f.concept.clone(), "prefLabel"),
    }));
    Ok(())
}

#[test]
fn bad_input_reports_the_fragment() -> Result<()> {
    let f = fixture(EngineConfig::default())?;
    let err = f.engine.select("id,props.", &[f.concept.clone()]).unwrap_err();
    assert!(err.to_string().contains("offset"), "err={err}");
    let err = f.engine.parse("code:a AND").unwrap_err();
    assert!(err.to_string().contains("AND"), "err={err}");
    assert!(EngineConfig::load(Some(std::path::Path::new("/nonexistent/termql.json"))).is_err());
    Ok(())
}

#[test]
fn reference_paths_resolve_through_the_index() -> Result<()> {
    let mut config = EngineConfig::default();
    config.index.default_limit = 1;
    let f = fixture(config)?;
    let mut nodes = f.nodes.clone();
    nodes[1] = nodes[1].clone().with_reference("broader", nodes[0].key());
    nodes[2] = nodes[2].clone().with_reference("broader", nodes[1].key());
    let index = MemoryIndex::from_nodes(&nodes)?;
    let store = MemoryRelationalStore::from_nodes(&nodes);
    let all = SearchOptions::default().limited_to(10);

    let spec = f.engine.parse("r.broader.code:c0")?;
    assert_eq!(f.engine.find_indexed(&index, &spec, &all)?, vec![nodes[1].key()]);

    let spec = f.engine.parse("r.broader.r.broader.code:c0")?;
    assert_eq!(f.engine.find_indexed(&index, &spec, &all)?, vec![nodes[2].key()]);

    // Resolution ignores the default limit; only the final search is capped.
    let spec = f.engine.parse("r.broader.type.id:Concept AND code:c2")?;
    assert_eq!(
        f.engine.find_indexed(&index, &spec, &SearchOptions::default())?,
        vec![nodes[2].key()]
    );

    let spec = f.engine.parse("r.broader.code:missing")?;
    assert!(f.engine.find_indexed(&index, &spec, &all)?.is_empty());
    assert!(f.engine.compile_index(&spec).is_err());
    assert!(f.engine.find_relational(&store, &spec).is_err());
    Ok(())
}

#[test]
fn word_prefix_finds_labels() -> Result<()> {
    let f = fixture(EngineConfig::default())?;
    let index = MemoryIndex::from_nodes(&f.nodes)?;
    let spec = f.engine.parse("p.prefLabel.en:conc* AND number:3")?;
    assert_eq!(
        f.engine.find_indexed(&index, &spec, &SearchOptions::default())?,
        vec![f.nodes[3].key()]
    );
    Ok(())
}

#[test]
fn strict_schema_rejects_dangling_ranges() -> Result<()> {
    let g = Uuid::new_v4();
    let schema = StaticSchema::new(vec![EntityType::builder(TypeId::new(g, "Concept"))
        .reference_attribute("inScheme", TypeId::new(g, "Scheme"))
        .build()]);
    assert!(QueryEngine::new(EngineConfig::default(), &schema).is_ok());

    let config = EngineConfig::from_json(r#"{"schema": {"strict": true}}"#)?;
    let err = QueryEngine::new(config, &schema).unwrap_err();
    assert!(format!("{err:#}").contains("inScheme"), "{err:#}");
    Ok(())
}
