use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use termql_schema::{LangValue, Node, NodeId, TypeId};
use termql_spec::{resolve_reference_paths, Leaf, NodeLeaf, NodeSpecification, Specification};
use termql_store::{
    IndexExecutor, MemoryIndex, MemoryRelationalStore, RelationalExecutor, SearchOptions,
};
use uuid::Uuid;

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, d)
        .and_then(|d| d.and_hms_opt(8, 30, 0))
        .unwrap()
}

fn graph(i: u8) -> Uuid {
    Uuid::from_u128(0xfeed_0000 + i as u128)
}

// References point at the first generated nodes, so paths can resolve.
fn target(i: u8) -> Uuid {
    Uuid::from_u128(i as u128 + 1)
}

type NodeParts = (
    u8,
    &'static str,
    Option<&'static str>,
    Option<&'static str>,
    i64,
    (u32, u32),
    Vec<LangValue>,
    Option<u8>,
);

fn node_parts() -> impl Strategy<Value = NodeParts> {
    (
        0u8..2,
        prop_oneof![Just("Concept"), Just("Term"), Just("Collection")],
        prop::option::of(prop_oneof![Just("c1"), Just("c2"), Just("x-9")]),
        prop::option::of(prop_oneof![Just("urn:a"), Just("urn:b")]),
        -1i64..3,
        (1u32..6, 0u32..3),
        prop::collection::vec(
            prop_oneof![
                Just(LangValue::new("en", "Domestic cat")),
                Just(LangValue::new("fi", "Kissa")),
                Just(LangValue::new("en", "catFood")),
                Just(LangValue::plain("Dog")),
                Just(LangValue::new("string", "Foo bar")),
            ],
            0..3,
        ),
        prop::option::of(0u8..2),
    )
}

fn nodes() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(node_parts(), 1..12).prop_map(|parts| {
        parts
            .into_iter()
            .enumerate()
            .map(|(i, (g, ty, code, uri, number, (created, age), labels, reference))| {
                let type_id = TypeId::new(graph(g), ty);
                let mut n = Node::new(Uuid::from_u128(i as u128 + 1), type_id.clone(), day(created))
                    .with_number(number)
                    .with_last_modified(day(created + age));
                if let Some(c) = code {
                    n = n.with_code(c);
                }
                if let Some(u) = uri {
                    n = n.with_uri(u);
                }
                for l in labels {
                    n = n.with_property("prefLabel", l);
                }
                if let Some(r) = reference {
                    n = n.with_reference("broader", NodeId::new(target(r), type_id));
                }
                n
            })
            .collect()
    })
}

fn relational_leaf() -> impl Strategy<Value = NodeLeaf> {
    prop_oneof![
        (1u128..6).prop_map(|i| NodeLeaf::ById(Uuid::from_u128(i))),
        (0u8..3).prop_map(|g| NodeLeaf::ByGraphId(graph(g))),
        prop_oneof![Just("Concept"), Just("Term")].prop_map(|t| NodeLeaf::ByTypeId(t.into())),
        prop_oneof![Just("c1"), Just("x-9")].prop_map(|c| NodeLeaf::ByCode(c.into())),
        Just(NodeLeaf::ByUri("urn:a".into())),
        (-1i64..3).prop_map(NodeLeaf::ByNumber),
        (prop::option::of(1u32..8), prop::option::of(1u32..8)).prop_map(|(l, u)| {
            NodeLeaf::ByCreatedDate {
                lower: l.map(day),
                upper: u.map(day),
            }
        }),
        (prop::option::of(1u32..8), prop::option::of(1u32..8)).prop_map(|(l, u)| {
            NodeLeaf::ByLastModifiedDate {
                lower: l.map(day),
                upper: u.map(day),
            }
        }),
    ]
}

fn lang() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("en".to_string()),
        Just("fi".to_string()),
        Just("string".to_string()),
    ]
}

fn any_leaf() -> impl Strategy<Value = NodeLeaf> {
    prop_oneof![
        3 => relational_leaf(),
        1 => (lang(), prop_oneof![Just("Kissa"), Just("Domestic cat"), Just("foo"), Just("Foo bar")]).prop_map(|(lang, v)| {
            NodeLeaf::ByPropertyString {
                attr: "prefLabel".into(),
                lang,
                value: v.into(),
            }
        }),
        1 => (lang(), prop_oneof![Just("Do"), Just("cat"), Just("K")]).prop_map(|(lang, p)| {
            NodeLeaf::ByPropertyStringPrefix {
                attr: "prefLabel".into(),
                lang,
                prefix: p.into(),
            }
        }),
        1 => (
            lang(),
            prop::option::of(prop_oneof![Just("D"), Just("Kissa")]),
            prop::option::of(prop_oneof![Just("Dog"), Just("z")]),
        )
            .prop_map(|(lang, lower, upper)| NodeLeaf::ByPropertyStringRange {
                attr: "prefLabel".into(),
                lang,
                lower: lower.map(Into::into),
                upper: upper.map(Into::into),
            }),
        1 => (lang(), prop_oneof![Just("cat"), Just("cat food"), Just("the"), Just("dog")])
            .prop_map(|(lang, text)| NodeLeaf::ByPropertyWords {
                attr: "prefLabel".into(),
                lang,
                text: text.into(),
            }),
        1 => (lang(), prop_oneof![Just("ca"), Just("Do"), Just("foo"), Just("")]).prop_map(|(lang, p)| {
            NodeLeaf::ByPropertyWordPrefix {
                attr: "prefLabel".into(),
                lang,
                prefix: p.into(),
            }
        }),
        1 => (0u8..3).prop_map(|r| NodeLeaf::ByReference {
            attr: "broader".into(),
            target: target(r),
        }),
        1 => Just(NodeLeaf::WithoutReferences {
            attr: "broader".into()
        }),
    ]
}

fn broader_path(path: NodeLeaf) -> NodeLeaf {
    NodeLeaf::ByReferencePath {
        attr: "broader".into(),
        path: Box::new(path),
    }
}

fn path_leaf() -> impl Strategy<Value = NodeLeaf> {
    prop_oneof![
        3 => any_leaf(),
        2 => relational_leaf().prop_map(broader_path),
        1 => relational_leaf().prop_map(|l| broader_path(broader_path(l))),
    ]
}

fn spec(leaf: impl Strategy<Value = NodeLeaf> + 'static) -> impl Strategy<Value = NodeSpecification> {
    let base = prop_oneof![
        8 => leaf.prop_map(Specification::Leaf),
        1 => Just(Specification::MatchAll),
        1 => Just(Specification::MatchNone),
    ];
    base.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Specification::And),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Specification::Or),
            inner.prop_map(Specification::not),
        ]
    })
}

fn expected(spec: &NodeSpecification, nodes: &[Node]) -> BTreeSet<NodeId> {
    nodes
        .iter()
        .filter(|n| spec.test(&n.key(), n))
        .map(Node::key)
        .collect()
}

fn in_memory_resolution(spec: &NodeSpecification, nodes: &[Node]) -> NodeSpecification {
    resolve_reference_paths(spec, &mut |path: &NodeSpecification| {
        Ok::<_, ()>(expected(path, nodes).into_iter().collect())
    })
    .unwrap()
}

#[test]
fn language_tag_named_string_does_not_leak_words() {
    let ty = TypeId::new(graph(0), "Concept");
    let node = Node::new(Uuid::from_u128(1), ty, day(1))
        .with_property("x", LangValue::new("string", "Foo bar"));
    let index = MemoryIndex::from_nodes(std::slice::from_ref(&node)).unwrap();

    for (lang, value, hit) in [("", "foo", false), ("", "Foo bar", true), ("string", "Foo bar", true)] {
        let leaf = NodeLeaf::ByPropertyString {
            attr: "x".into(),
            lang: lang.into(),
            value: value.into(),
        };
        assert_eq!(leaf.test(&node.key(), &node), hit, "{leaf}");
        let spec = Specification::Leaf(leaf);
        let found = index
            .search(&spec.to_index_query().unwrap(), &SearchOptions::default())
            .unwrap();
        assert_eq!(!found.is_empty(), hit, "{spec}");
    }
}

#[test]
fn date_ranges_agree_past_year_9999() {
    let ty = TypeId::new(graph(0), "Concept");
    let at = |y: i32| NaiveDate::from_ymd_opt(y, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)).unwrap();
    let nodes: Vec<Node> = [2024, 9999, 10_000, 123_456]
        .into_iter()
        .enumerate()
        .map(|(i, y)| Node::new(Uuid::from_u128(i as u128 + 1), ty.clone(), at(y)))
        .collect();
    let index = MemoryIndex::from_nodes(&nodes).unwrap();
    let store = MemoryRelationalStore::from_nodes(&nodes);

    let spec = Specification::Leaf(NodeLeaf::ByCreatedDate {
        lower: Some(at(9000)),
        upper: Some(at(20_000)),
    });
    let want = expected(&spec, &nodes);
    assert_eq!(want.len(), 2);
    let hits: BTreeSet<NodeId> = index
        .search(&spec.to_index_query().unwrap(), &SearchOptions::default())
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(hits, want);
    let rows: BTreeSet<NodeId> = store.execute(&spec.to_sql().unwrap()).unwrap().into_iter().collect();
    assert_eq!(rows, want);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn relational_compilation_agrees_with_test(nodes in nodes(), spec in spec(relational_leaf())) {
        let store = MemoryRelationalStore::from_nodes(&nodes);
        let query = spec.to_sql().unwrap();
        let got: BTreeSet<NodeId> = store.execute(&query).unwrap().into_iter().collect();
        prop_assert_eq!(got, expected(&spec, &nodes), "{} => {}", spec, query);
    }

    #[test]
    fn index_compilation_agrees_with_test(nodes in nodes(), spec in spec(any_leaf())) {
        let index = MemoryIndex::from_nodes(&nodes).unwrap();
        let query = spec.to_index_query().unwrap();
        let got: BTreeSet<NodeId> = index
            .search(&query, &SearchOptions::default())
            .unwrap()
            .into_iter()
            .collect();
        prop_assert_eq!(got, expected(&spec, &nodes), "{} => {}", spec, query);
    }

    #[test]
    fn resolved_reference_paths_agree_with_test(nodes in nodes(), spec in spec(path_leaf())) {
        let index = MemoryIndex::from_nodes(&nodes).unwrap();
        let by_index = resolve_reference_paths(&spec, &mut |path: &NodeSpecification| {
            index.search(&path.to_index_query().unwrap(), &SearchOptions::default())
        })
        .unwrap();
        let query = by_index.to_index_query().unwrap();
        let got: BTreeSet<NodeId> = index
            .search(&query, &SearchOptions::default())
            .unwrap()
            .into_iter()
            .collect();
        let resolved = in_memory_resolution(&spec, &nodes);
        prop_assert_eq!(got, expected(&resolved, &nodes), "{} => {}", spec, query);
    }
}
