use metaspace_common::{DocumentError, Entity, EntityUuid};
use metaspace_ecs::ComponentStoreError;

/// Structural errors of the entity tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("UUID {0} is already in the tree")]
    DuplicateUuid(EntityUuid),
    #[error("entity {0} already has a node")]
    DuplicateEntity(Entity),
    #[error("node {0} has no parent; the tree already has a root")]
    MissingParent(EntityUuid),
    #[error("parent {0} is not in the tree")]
    ParentNotFound(String),
    #[error("entity {0} is not in the tree")]
    NodeNotFound(Entity),
    #[error("the root node can not be removed or moved")]
    RootRemoval,
    #[error("moving {entity} under {parent} would create a cycle")]
    Cycle { entity: Entity, parent: Entity },
}

/// Errors raised while attaching a single component.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("invalid props for `{component}`: {source}")]
    InvalidProps {
        component: String,
        source: serde_json::Error,
    },
    #[error("component `{component}` rejected its props: {reason}")]
    Rejected { component: String, reason: String },
    #[error(transparent)]
    Store(#[from] ComponentStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("a scene load is already in progress")]
    LoadInProgress,
    #[error("entity {0} is not alive")]
    UnknownEntity(Entity),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
