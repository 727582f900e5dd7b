//! Dedicated table expressions for classes with first-class storage.
//!
//! Every expression projects `(id, ehr_id, versioned_object_id,
//! contribution_id, data)` so that children can join on any of the keys
//! regardless of which class their parent is.

use crate::context::Source;
use crate::sql_builder::{JsonPath, quote_literal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Storage {
    Ehr,
    Contribution,
    VersionedObject,
    ObjectVersion,
}

impl Storage {
    fn table(self) -> &'static str {
        match self {
            Self::Ehr => "ehr",
            Self::Contribution => "contribution",
            Self::VersionedObject => "versioned_object",
            Self::ObjectVersion => "object_version",
        }
    }

    fn row_alias(self) -> &'static str {
        match self {
            Self::Ehr => "e",
            Self::Contribution => "c",
            Self::VersionedObject => "vo",
            Self::ObjectVersion => "ov",
        }
    }

    fn columns(self) -> &'static str {
        match self {
            Self::Ehr => {
                "e.id::text AS id, e.id AS ehr_id, NULL::uuid AS versioned_object_id, NULL::uuid AS contribution_id, e.data"
            }
            Self::Contribution => {
                "c.id::text AS id, c.ehr_id, NULL::uuid AS versioned_object_id, c.id AS contribution_id, c.data"
            }
            Self::VersionedObject => {
                "vo.id::text AS id, vo.ehr_id, vo.id AS versioned_object_id, NULL::uuid AS contribution_id, vo.data"
            }
            Self::ObjectVersion => {
                "ov.id, ov.ehr_id, ov.versioned_object_id, ov.contribution_id, ov.data"
            }
        }
    }

    /// Whether rows carry a `type` discriminator column.
    fn is_typed(self) -> bool {
        matches!(self, Self::VersionedObject | Self::ObjectVersion)
    }
}

/// How a child row is tied to its parent source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinKey {
    EhrId,
    VersionedObjectId,
    ContributionId,
    /// Some version of the versioned object belongs to the contribution.
    VersionInContribution,
    /// The folder lists the composition's versioned object in its items.
    FolderItem,
    /// The role's performer references the actor.
    Performer,
}

impl JoinKey {
    fn condition(self, row: &str, parent: &Source, schema: &str) -> String {
        let p = &parent.table;
        match self {
            Self::EhrId => format!("{row}.ehr_id = {p}.ehr_id"),
            Self::VersionedObjectId => {
                format!("{row}.versioned_object_id = {p}.versioned_object_id")
            }
            Self::ContributionId => format!("{row}.contribution_id = {p}.contribution_id"),
            Self::VersionInContribution => format!(
                "EXISTS (SELECT 1 FROM {schema}.object_version cv WHERE cv.versioned_object_id = {row}.id AND cv.contribution_id = {p}.contribution_id)"
            ),
            Self::FolderItem => format!(
                "jsonb_path_exists({p}.data, '$.**.items.id.value ? (@ == $id)', jsonb_build_object('id', {row}.versioned_object_id::text))"
            ),
            Self::Performer => {
                format!("{row}.data #>> '{{performer,id,value}}' = {p}.versioned_object_id::text")
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct TableStrategy {
    pub model: &'static str,
    storage: Storage,
    parents: &'static [(&'static str, JoinKey)],
}

const VERSIONED_CONTAINER_PARENTS: &[(&str, JoinKey)] = &[
    ("EHR", JoinKey::EhrId),
    ("CONTRIBUTION", JoinKey::VersionInContribution),
];

const ACTOR_PARENTS: &[(&str, JoinKey)] = &[
    ("VERSIONED_PARTY", JoinKey::VersionedObjectId),
    ("CONTRIBUTION", JoinKey::ContributionId),
];

const STRATEGIES: &[TableStrategy] = &[
    TableStrategy {
        model: "EHR",
        storage: Storage::Ehr,
        parents: &[],
    },
    TableStrategy {
        model: "CONTRIBUTION",
        storage: Storage::Contribution,
        parents: &[("EHR", JoinKey::EhrId)],
    },
    TableStrategy {
        model: "VERSIONED_EHR_STATUS",
        storage: Storage::VersionedObject,
        parents: VERSIONED_CONTAINER_PARENTS,
    },
    TableStrategy {
        model: "VERSIONED_EHR_ACCESS",
        storage: Storage::VersionedObject,
        parents: VERSIONED_CONTAINER_PARENTS,
    },
    TableStrategy {
        model: "VERSIONED_COMPOSITION",
        storage: Storage::VersionedObject,
        parents: VERSIONED_CONTAINER_PARENTS,
    },
    TableStrategy {
        model: "VERSIONED_FOLDER",
        storage: Storage::VersionedObject,
        parents: VERSIONED_CONTAINER_PARENTS,
    },
    TableStrategy {
        model: "VERSIONED_PARTY",
        storage: Storage::VersionedObject,
        parents: &[("CONTRIBUTION", JoinKey::VersionInContribution)],
    },
    TableStrategy {
        model: "COMPOSITION",
        storage: Storage::ObjectVersion,
        parents: &[
            ("EHR", JoinKey::EhrId),
            ("VERSIONED_COMPOSITION", JoinKey::VersionedObjectId),
            ("CONTRIBUTION", JoinKey::ContributionId),
            ("FOLDER", JoinKey::FolderItem),
        ],
    },
    TableStrategy {
        model: "EHR_STATUS",
        storage: Storage::ObjectVersion,
        parents: &[
            ("EHR", JoinKey::EhrId),
            ("VERSIONED_EHR_STATUS", JoinKey::VersionedObjectId),
            ("CONTRIBUTION", JoinKey::ContributionId),
        ],
    },
    TableStrategy {
        model: "EHR_ACCESS",
        storage: Storage::ObjectVersion,
        parents: &[
            ("EHR", JoinKey::EhrId),
            ("VERSIONED_EHR_ACCESS", JoinKey::VersionedObjectId),
            ("CONTRIBUTION", JoinKey::ContributionId),
        ],
    },
    TableStrategy {
        model: "FOLDER",
        storage: Storage::ObjectVersion,
        parents: &[
            ("EHR", JoinKey::EhrId),
            ("VERSIONED_FOLDER", JoinKey::VersionedObjectId),
            ("CONTRIBUTION", JoinKey::ContributionId),
        ],
    },
    TableStrategy {
        model: "ROLE",
        storage: Storage::ObjectVersion,
        parents: &[
            ("VERSIONED_PARTY", JoinKey::VersionedObjectId),
            ("CONTRIBUTION", JoinKey::ContributionId),
            ("PERSON", JoinKey::Performer),
            ("AGENT", JoinKey::Performer),
            ("ORGANISATION", JoinKey::Performer),
            ("GROUP", JoinKey::Performer),
        ],
    },
    TableStrategy {
        model: "PERSON",
        storage: Storage::ObjectVersion,
        parents: ACTOR_PARENTS,
    },
    TableStrategy {
        model: "AGENT",
        storage: Storage::ObjectVersion,
        parents: ACTOR_PARENTS,
    },
    TableStrategy {
        model: "ORGANISATION",
        storage: Storage::ObjectVersion,
        parents: ACTOR_PARENTS,
    },
    TableStrategy {
        model: "GROUP",
        storage: Storage::ObjectVersion,
        parents: ACTOR_PARENTS,
    },
];

/// Look up the dedicated strategy for a class, if it has one.
pub(crate) fn dedicated(model: &str) -> Option<&'static TableStrategy> {
    STRATEGIES.iter().find(|s| s.model == model)
}

/// Options applied to a dedicated table expression.
#[derive(Debug, Default)]
pub(crate) struct TableOptions<'a> {
    pub parent: Option<(JoinKey, &'a Source)>,
    /// Node predicate filter over the document root.
    pub filter: Option<&'a str>,
    pub all_versions: bool,
}

impl TableStrategy {
    pub fn join_key(&self, parent_model: &str) -> Option<JoinKey> {
        self.parents
            .iter()
            .find(|(model, _)| *model == parent_model)
            .map(|(_, key)| *key)
    }

    pub fn is_versioned(&self) -> bool {
        self.storage == Storage::ObjectVersion
    }

    /// Render the table expression; `schema` must already be escaped.
    pub fn table_expression(&self, schema: &str, options: &TableOptions<'_>) -> String {
        let row = self.storage.row_alias();
        let mut conditions = Vec::new();
        if self.storage.is_typed() {
            conditions.push(format!("{row}.type = {}", quote_literal(self.model)));
        }
        if let Some((key, parent)) = options.parent {
            conditions.push(key.condition(row, parent, schema));
        }
        if let Some(filter) = options.filter {
            conditions.push(format!(
                "jsonb_path_exists({row}.data, {})",
                JsonPath::root().filter(filter).to_sql()
            ));
        }

        let latest = self.is_versioned() && !options.all_versions;
        let mut sql = if latest {
            format!("SELECT DISTINCT ON ({row}.versioned_object_id) ")
        } else {
            "SELECT ".to_string()
        };
        sql.push_str(self.storage.columns());
        sql.push_str(&format!(" FROM {schema}.{} {row}", self.storage.table()));
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if latest {
            sql.push_str(&format!(
                " ORDER BY {row}.versioned_object_id, {row}.created_at DESC"
            ));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(model: &str) -> Source {
        Source {
            model: model.to_string(),
            table: "source_0".to_string(),
            alias: None,
        }
    }

    #[test]
    fn test_every_first_class_model_has_a_strategy() {
        for model in [
            "EHR",
            "CONTRIBUTION",
            "VERSIONED_EHR_STATUS",
            "VERSIONED_EHR_ACCESS",
            "VERSIONED_COMPOSITION",
            "VERSIONED_FOLDER",
            "VERSIONED_PARTY",
            "COMPOSITION",
            "EHR_STATUS",
            "EHR_ACCESS",
            "FOLDER",
            "ROLE",
            "PERSON",
            "AGENT",
            "ORGANISATION",
            "GROUP",
        ] {
            assert!(dedicated(model).is_some(), "{model}");
        }
        assert!(dedicated("OBSERVATION").is_none());
    }

    #[test]
    fn test_ehr_root_expression() {
        let strategy = dedicated("EHR").unwrap();
        assert_eq!(
            strategy.table_expression("\"openehr\"", &TableOptions::default()),
            "SELECT e.id::text AS id, e.id AS ehr_id, NULL::uuid AS versioned_object_id, NULL::uuid AS contribution_id, e.data FROM \"openehr\".ehr e"
        );
    }

    #[test]
    fn test_composition_under_ehr_latest_version() {
        let strategy = dedicated("COMPOSITION").unwrap();
        let ehr = parent("EHR");
        let key = strategy.join_key("EHR").unwrap();
        let sql = strategy.table_expression(
            "\"openehr\"",
            &TableOptions {
                parent: Some((key, &ehr)),
                ..Default::default()
            },
        );
        assert!(sql.starts_with("SELECT DISTINCT ON (ov.versioned_object_id) "));
        assert!(sql.contains("FROM \"openehr\".object_version ov"));
        assert!(sql.contains("WHERE ov.type = 'COMPOSITION' AND ov.ehr_id = source_0.ehr_id"));
        assert!(sql.ends_with("ORDER BY ov.versioned_object_id, ov.created_at DESC"));
    }

    #[test]
    fn test_all_versions_and_filter() {
        let strategy = dedicated("COMPOSITION").unwrap();
        let sql = strategy.table_expression(
            "\"openehr\"",
            &TableOptions {
                filter: Some("@.archetype_node_id == \"x\""),
                all_versions: true,
                ..Default::default()
            },
        );
        assert!(!sql.contains("DISTINCT ON"));
        assert!(sql.contains("jsonb_path_exists(ov.data, '$ ? (@.archetype_node_id == \"x\")')"));
    }

    #[test]
    fn test_legal_parents() {
        let composition = dedicated("COMPOSITION").unwrap();
        assert_eq!(composition.join_key("FOLDER"), Some(JoinKey::FolderItem));
        assert_eq!(composition.join_key("COMPOSITION"), None);
        let role = dedicated("ROLE").unwrap();
        assert_eq!(role.join_key("PERSON"), Some(JoinKey::Performer));
        assert!(dedicated("EHR").unwrap().join_key("CONTRIBUTION").is_none());
        assert!(!dedicated("VERSIONED_COMPOSITION").unwrap().is_versioned());
    }

    #[test]
    fn test_join_conditions() {
        let folder = parent("FOLDER");
        let sql = JoinKey::FolderItem.condition("ov", &folder, "\"openehr\"");
        assert!(sql.contains("jsonb_build_object('id', ov.versioned_object_id::text)"));
        let sql = JoinKey::Performer.condition("ov", &folder, "\"openehr\"");
        assert_eq!(
            sql,
            "ov.data #>> '{performer,id,value}' = source_0.versioned_object_id::text"
        );
    }
}
