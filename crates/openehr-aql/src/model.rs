//! openEHR reference model inheritance.
//!
//! The inheritance table maps each class to its direct subclasses. It is
//! built once on first use and never mutated afterwards.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use indexmap::IndexSet;

/// Direct subclasses per reference model class.
const INHERITANCE: &[(&str, &[&str])] = &[
    ("PATHABLE", &["LOCATABLE", "ISM_TRANSITION", "INSTRUCTION_DETAILS"]),
    (
        "LOCATABLE",
        &[
            "CONTENT_ITEM",
            "COMPOSITION",
            "EHR_STATUS",
            "EHR_ACCESS",
            "FOLDER",
            "PARTY",
            "ITEM_STRUCTURE",
            "ITEM",
            "EVENT_CONTEXT",
            "HISTORY",
            "EVENT",
            "ACTIVITY",
            "ADDRESS",
            "CAPABILITY",
            "CONTACT",
            "PARTY_IDENTITY",
            "PARTY_RELATIONSHIP",
        ],
    ),
    ("CONTENT_ITEM", &["SECTION", "ENTRY", "GENERIC_ENTRY"]),
    ("ENTRY", &["ADMIN_ENTRY", "CARE_ENTRY"]),
    (
        "CARE_ENTRY",
        &["OBSERVATION", "EVALUATION", "INSTRUCTION", "ACTION"],
    ),
    (
        "ITEM_STRUCTURE",
        &["ITEM_SINGLE", "ITEM_LIST", "ITEM_TABLE", "ITEM_TREE"],
    ),
    ("ITEM", &["CLUSTER", "ELEMENT"]),
    ("EVENT", &["POINT_EVENT", "INTERVAL_EVENT"]),
    ("PARTY", &["ACTOR", "ROLE"]),
    ("ACTOR", &["AGENT", "ORGANISATION", "GROUP", "PERSON"]),
    (
        "VERSIONED_OBJECT",
        &[
            "VERSIONED_COMPOSITION",
            "VERSIONED_EHR_STATUS",
            "VERSIONED_EHR_ACCESS",
            "VERSIONED_FOLDER",
            "VERSIONED_PARTY",
        ],
    ),
    ("VERSION", &["ORIGINAL_VERSION", "IMPORTED_VERSION"]),
    (
        "DATA_VALUE",
        &[
            "DV_BOOLEAN",
            "DV_STATE",
            "DV_IDENTIFIER",
            "DV_TEXT",
            "DV_PARAGRAPH",
            "DV_ORDERED",
            "DV_INTERVAL",
            "DV_ENCAPSULATED",
            "DV_URI",
            "DV_TIME_SPECIFICATION",
        ],
    ),
    ("DV_TEXT", &["DV_CODED_TEXT"]),
    (
        "DV_ORDERED",
        &["DV_QUANTIFIED", "DV_ORDINAL", "DV_SCALE"],
    ),
    ("DV_QUANTIFIED", &["DV_AMOUNT", "DV_ABSOLUTE_QUANTITY"]),
    (
        "DV_AMOUNT",
        &["DV_QUANTITY", "DV_COUNT", "DV_PROPORTION", "DV_DURATION"],
    ),
    ("DV_ABSOLUTE_QUANTITY", &["DV_TEMPORAL"]),
    ("DV_TEMPORAL", &["DV_DATE", "DV_TIME", "DV_DATE_TIME"]),
    ("DV_ENCAPSULATED", &["DV_MULTIMEDIA", "DV_PARSABLE"]),
    ("DV_URI", &["DV_EHR_URI"]),
    (
        "DV_TIME_SPECIFICATION",
        &["DV_PERIODIC_TIME_SPECIFICATION", "DV_GENERAL_TIME_SPECIFICATION"],
    ),
];

struct InheritanceTable {
    subtypes: HashMap<&'static str, &'static [&'static str]>,
    supertypes: HashMap<&'static str, Vec<&'static str>>,
}

impl InheritanceTable {
    fn load(entries: &'static [(&'static str, &'static [&'static str])]) -> Self {
        let mut subtypes = HashMap::with_capacity(entries.len());
        let mut supertypes: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for (parent, children) in entries {
            subtypes.insert(*parent, *children);
            for child in *children {
                supertypes.entry(*child).or_default().push(*parent);
            }
        }
        Self {
            subtypes,
            supertypes,
        }
    }
}

static TABLE: LazyLock<InheritanceTable> = LazyLock::new(|| InheritanceTable::load(INHERITANCE));

/// Read-only queries over the reference model inheritance table.
pub struct ModelTypeResolver;

impl ModelTypeResolver {
    /// `model` plus every direct or indirect subtype, breadth-first.
    ///
    /// Unknown models resolve to themselves.
    pub fn closure(model: &str) -> IndexSet<String> {
        walk(model, |name| {
            TABLE
                .subtypes
                .get(name)
                .map(|children| children.to_vec())
                .unwrap_or_default()
        })
    }

    /// `model` plus every direct or indirect supertype, breadth-first.
    pub fn reverse_closure(model: &str) -> IndexSet<String> {
        walk(model, |name| {
            TABLE.supertypes.get(name).cloned().unwrap_or_default()
        })
    }

    /// Whether `model` is `ancestor` or one of its subtypes.
    pub fn is_subtype_of(model: &str, ancestor: &str) -> bool {
        Self::reverse_closure(model).contains(ancestor)
    }
}

/// Breadth-first traversal with a visited set, so a cyclic table still terminates.
fn walk<F>(model: &str, next: F) -> IndexSet<String>
where
    F: Fn(&str) -> Vec<&'static str>,
{
    let mut result = IndexSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::from([model.to_string()]);

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        for neighbour in next(&current) {
            if !visited.contains(neighbour) {
                queue.push_back(neighbour.to_string());
            }
        }
        result.insert(current);
    }

    result
}
