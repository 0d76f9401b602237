//! Shared fixture types for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, OnceLock, Weak};

use nebula_graph_validator::prelude::*;

// ============================================================================
// LINKED RINGS
// ============================================================================

/// A node in a singly linked ring. The back edge is weak so rings do not leak.
pub struct Link {
    pub label: Option<String>,
    next: OnceLock<Weak<Link>>,
}

impl Link {
    pub fn new(label: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            label: label.map(str::to_owned),
            next: OnceLock::new(),
        })
    }

    pub fn point_to(&self, next: &Arc<Link>) {
        let _ = self.next.set(Arc::downgrade(next));
    }

    pub fn next(&self) -> Option<Arc<Link>> {
        self.next.get().and_then(Weak::upgrade)
    }
}

impl Reflect for Link {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, String>("label", |l| Value::optional(l.label.clone())),
            PropertyInfo::readable::<Self, Link>("next", |l| Value::shared_opt(l.next())),
        ]
    }
}

/// `len` links, each pointing at the following one and the last at the first.
pub fn ring(len: usize) -> Vec<Arc<Link>> {
    let links: Vec<_> = (0..len)
        .map(|i| Link::new(Some(format!("link-{i}").as_str())))
        .collect();
    for (i, link) in links.iter().enumerate() {
        link.point_to(&links[(i + 1) % len]);
    }
    links
}

// ============================================================================
// TREES
// ============================================================================

/// A tree node whose children may be shared between parents.
pub struct Item {
    pub name: String,
    pub children: Vec<Arc<Item>>,
}

impl Item {
    pub fn leaf(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            children: Vec::new(),
        })
    }

    pub fn branch(name: &str, children: Vec<Arc<Item>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            children,
        })
    }
}

impl Reflect for Item {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, String>("name", |i| Value::item(i.name.clone()))
                .with_annotation(Pattern::new("^[a-z]+$")),
            PropertyInfo::readable::<Self, Vec<Item>>("children", |i| {
                Value::list(i.children.iter().cloned().map(Value::shared))
            }),
        ]
    }
}

/// A forest with shared subtrees and a mix of valid and invalid names.
pub fn forest() -> Arc<Item> {
    let shared = Item::branch("shared", vec![Item::leaf("Bad"), Item::leaf("good")]);
    let left = Item::branch("left", vec![Arc::clone(&shared), Item::leaf("Nope")]);
    let right = Item::branch("right", vec![shared, Item::leaf("fine")]);
    Item::branch("root", vec![left, right, Item::leaf("ALSO")])
}

// ============================================================================
// SCALAR HOLDERS
// ============================================================================

/// A single optional string checked against `he.*lo`.
pub struct Greeting {
    pub text: Option<String>,
}

impl Reflect for Greeting {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, String>("text", |g| Value::optional(g.text.clone()))
                .with_annotation(Pattern::new("he.*lo")),
        ]
    }
}

/// An integer property, for mapper and unsupported-type scenarios.
pub struct Slot {
    pub id: i32,
}

impl Reflect for Slot {
    fn properties() -> Vec<PropertyInfo> {
        vec![PropertyInfo::readable::<Self, i32>("id", |s| Value::item(s.id))]
    }
}

/// Same as [`Slot`] but with a pattern attached to the integer.
pub struct MisannotatedSlot {
    pub id: i32,
}

impl Reflect for MisannotatedSlot {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, i32>("id", |s| Value::item(s.id))
                .with_annotation(Pattern::new("^[0-9]+$")),
        ]
    }
}

/// Two properties declaring the same pattern source.
pub struct Twins {
    pub left: String,
    pub right: String,
}

impl Reflect for Twins {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, String>("left", |t| Value::item(t.left.clone()))
                .with_annotation(Pattern::new("^[a-z]+$")),
            PropertyInfo::readable::<Self, String>("right", |t| Value::item(t.right.clone()))
                .with_annotation(Pattern::new("^[a-z]+$")),
        ]
    }
}

/// Two sibling leaves reached from one parent.
pub struct Pair {
    pub first: Arc<Leaf>,
    pub second: Arc<Leaf>,
}

pub struct Leaf {
    pub name: String,
}

impl Reflect for Pair {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, Leaf>("first", |p| Value::shared(Arc::clone(&p.first))),
            PropertyInfo::readable::<Self, Leaf>("second", |p| {
                Value::shared(Arc::clone(&p.second))
            }),
        ]
    }
}

impl Reflect for Leaf {
    fn properties() -> Vec<PropertyInfo> {
        vec![PropertyInfo::readable::<Self, String>("name", |l| Value::item(l.name.clone()))]
    }
}

pub fn pair(first: &str, second: &str) -> Arc<Pair> {
    Arc::new(Pair {
        first: Arc::new(Leaf {
            name: first.to_owned(),
        }),
        second: Arc::new(Leaf {
            name: second.to_owned(),
        }),
    })
}

/// A dynamically typed slot that may hold an instance of any type.
pub struct Holder {
    pub name: String,
    pub slot: Option<Node>,
}

/// A type no validator declares.
pub struct Stranger;

impl Reflect for Holder {
    fn properties() -> Vec<PropertyInfo> {
        vec![
            PropertyInfo::readable::<Self, String>("name", |h| Value::item(h.name.clone()))
                .with_annotation(Pattern::new("^[a-z]+$")),
            PropertyInfo::readable::<Self, Node>("slot", |h| Value::from(h.slot.clone())),
        ]
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Routes build and traversal logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Shared sink for callback observations.
pub type Sink<T> = Arc<Mutex<Vec<T>>>;

pub fn sink<T>() -> Sink<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn drain<T>(sink: &Sink<T>) -> Vec<T> {
    std::mem::take(&mut *sink.lock().unwrap())
}

/// A constraint over any property that never fails.
pub fn accept_all(_: &FactoryContext<'_>) -> Result<Option<ConstraintRef>, FactoryError> {
    let check: ConstraintRef = Arc::new(DelegateConstraint::any("AcceptAll", |_, _| Ok(())));
    Ok(Some(check))
}
