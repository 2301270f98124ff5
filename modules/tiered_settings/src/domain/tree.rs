//! Settings tree description and discovery
//!
//! Every [`SettingsGroup`] describes its members through a [`GroupBuilder`]:
//! leaves with their defaults and constraints, and nested groups with accessors.
//! [`SettingsTree::discover`] walks these descriptions breadth-first from the root,
//! validates them, and derives a [`GroupAccessor`] for every nested group position.
//!
//! Descriptions are type-erased behind [`GroupShape`] so the tree can hold groups
//! of different types; values cross the erased boundary as `Arc<dyn Any>` and are
//! downcast back at the typed edges.

use crate::contract::{
    DefaultRule, DefinitionError, Dimension, SettingDefinition, SettingValue, SettingsError,
    SettingsGroup,
};
use crate::domain::validation::Constraint;
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) type AnyGroup = Arc<dyn Any + Send + Sync>;

/// Parses and validates the text of one setting.
pub(crate) type ValueCheck = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

type Assign<G> = Box<dyn Fn(&mut G, &str) -> Result<(), String> + Send + Sync>;

/// Declaration of a leaf setting: global default, tiered defaults and an optional constraint.
pub struct Setting<V, T, D> {
    default: V,
    description: Option<String>,
    allow_overrides: bool,
    rules: Vec<DefaultRule<T, D>>,
    constraint: Option<serde_json::Value>,
}

impl<V: SettingValue, T: Dimension, D: Dimension> Setting<V, T, D> {
    pub fn new(default: V) -> Self {
        Self {
            default,
            description: None,
            allow_overrides: true,
            rules: Vec::new(),
            constraint: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Forbid overrides wherever the global default applies.
    pub fn without_overrides(mut self) -> Self {
        self.allow_overrides = false;
        self
    }

    pub fn tier(self, tier: T, value: V) -> Self {
        let text = value.render_value();
        self.rule(DefaultRule::tier(tier, text))
    }

    pub fn data_center(self, data_center: D, value: V) -> Self {
        let text = value.render_value();
        self.rule(DefaultRule::data_center(data_center, text))
    }

    pub fn tier_data_center(self, tier: T, data_center: D, value: V) -> Self {
        let text = value.render_value();
        self.rule(DefaultRule::tier_data_center(tier, data_center, text))
    }

    /// Add a textual default rule; its value is validated at discovery.
    pub fn rule(mut self, rule: DefaultRule<T, D>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Restrict values with a JSON Schema applied to the parsed value.
    pub fn constraint(mut self, schema: serde_json::Value) -> Self {
        self.constraint = Some(schema);
        self
    }
}

struct LeafShape<G: SettingsGroup> {
    name: &'static str,
    definition: LeafDefinition<G::Tier, G::DataCenter>,
    assign: Assign<G>,
}

/// Leaf description as seen through the erased shape.
#[derive(Clone)]
pub(crate) struct LeafDefinition<T, D> {
    pub name: &'static str,
    pub kind: crate::contract::ValueKind,
    pub description: Option<String>,
    pub default_value: String,
    pub allow_overrides: bool,
    pub rules: Vec<DefaultRule<T, D>>,
    pub constraint_error: Option<String>,
    pub check: ValueCheck,
}

struct ChildShape<G: SettingsGroup> {
    member: ChildMember<G::Tier, G::DataCenter>,
    get: Box<dyn Fn(&G) -> AnyGroup + Send + Sync>,
    set: Box<dyn Fn(&mut G, AnyGroup) -> bool + Send + Sync>,
}

/// Nested group description as seen through the erased shape.
#[derive(Clone)]
pub(crate) struct ChildMember<T, D> {
    pub name: &'static str,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub describe: fn() -> Arc<dyn GroupShape<T, D>>,
}

/// Collects the members of one settings group.
pub struct GroupBuilder<G: SettingsGroup> {
    leaves: Vec<LeafShape<G>>,
    children: Vec<ChildShape<G>>,
}

impl<G: SettingsGroup> GroupBuilder<G> {
    fn new() -> Self {
        Self {
            leaves: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Declare a leaf setting backed by `field`.
    pub fn setting<V: SettingValue>(
        &mut self,
        name: &'static str,
        field: fn(&mut G) -> &mut V,
        setting: Setting<V, G::Tier, G::DataCenter>,
    ) -> &mut Self {
        let (constraint, constraint_error) = match setting.constraint {
            Some(schema) => match Constraint::compile(schema) {
                Ok(c) => (Some(Arc::new(c)), None),
                Err(e) => (None, Some(e)),
            },
            None => (None, None),
        };

        let parse = {
            let constraint = constraint.clone();
            move |text: &str| -> Result<V, String> {
                let value = V::parse_value(text)?;
                if let Some(constraint) = &constraint {
                    constraint.check(&value.to_json())?;
                }
                Ok(value)
            }
        };
        let check_parse = parse.clone();

        self.leaves.push(LeafShape {
            name,
            definition: LeafDefinition {
                name,
                kind: V::KIND,
                description: setting.description,
                default_value: setting.default.render_value(),
                allow_overrides: setting.allow_overrides,
                rules: setting.rules,
                constraint_error,
                check: Arc::new(move |text| check_parse(text).map(|_| ())),
            },
            assign: Box::new(move |group, text| {
                *field(group) = parse(text)?;
                Ok(())
            }),
        });
        self
    }

    /// Declare a nested group held in an `Arc<C>` field.
    pub fn group<C>(
        &mut self,
        name: &'static str,
        get: fn(&G) -> &Arc<C>,
        get_mut: fn(&mut G) -> &mut Arc<C>,
    ) -> &mut Self
    where
        C: SettingsGroup<Tier = G::Tier, DataCenter = G::DataCenter>,
    {
        self.children.push(ChildShape {
            member: ChildMember {
                name,
                type_id: TypeId::of::<C>(),
                type_name: type_name::<C>(),
                describe: describe_group::<C>,
            },
            get: Box::new(move |group| {
                let child: AnyGroup = Arc::<C>::clone(get(group));
                child
            }),
            set: Box::new(move |group, value| match value.downcast::<C>() {
                Ok(child) => {
                    *get_mut(group) = child;
                    true
                }
                Err(_) => false,
            }),
        });
        self
    }
}

fn describe_group<G: SettingsGroup>() -> Arc<dyn GroupShape<G::Tier, G::DataCenter>> {
    let mut builder = GroupBuilder::<G>::new();
    G::describe(&mut builder);
    Arc::new(builder)
}

/// Failure to build one group from leaf texts.
#[derive(Debug)]
pub(crate) enum BuildFailure {
    /// The leaf at this index (within the group) rejected its text
    Leaf { leaf: usize, reason: String },
    /// The group's children did not line up with its description
    Shape(String),
}

/// Type-erased view of a group description.
pub(crate) trait GroupShape<T, D>: Send + Sync {
    fn group_type(&self) -> TypeId;

    fn group_type_name(&self) -> &'static str;

    fn leaves(&self) -> Vec<LeafDefinition<T, D>>;

    fn children(&self) -> Vec<ChildMember<T, D>>;

    /// Build a fresh group from leaf texts (in leaf order) and already built children.
    fn build(&self, leaf_values: &[&str], children: Vec<AnyGroup>) -> Result<AnyGroup, BuildFailure>;

    /// Read the nested group in slot `child` of `parent`.
    fn project(&self, parent: &(dyn Any + Send + Sync), child: usize) -> Option<AnyGroup>;
}

impl<G: SettingsGroup> GroupShape<G::Tier, G::DataCenter> for GroupBuilder<G> {
    fn group_type(&self) -> TypeId {
        TypeId::of::<G>()
    }

    fn group_type_name(&self) -> &'static str {
        type_name::<G>()
    }

    fn leaves(&self) -> Vec<LeafDefinition<G::Tier, G::DataCenter>> {
        self.leaves.iter().map(|leaf| leaf.definition.clone()).collect()
    }

    fn children(&self) -> Vec<ChildMember<G::Tier, G::DataCenter>> {
        self.children.iter().map(|child| child.member.clone()).collect()
    }

    fn build(&self, leaf_values: &[&str], children: Vec<AnyGroup>) -> Result<AnyGroup, BuildFailure> {
        if leaf_values.len() != self.leaves.len() || children.len() != self.children.len() {
            return Err(BuildFailure::Shape(format!(
                "`{}` expects {} settings and {} groups",
                type_name::<G>(),
                self.leaves.len(),
                self.children.len()
            )));
        }

        let mut group = G::default();
        for (index, (leaf, text)) in self.leaves.iter().zip(leaf_values).enumerate() {
            (leaf.assign)(&mut group, text).map_err(|reason| BuildFailure::Leaf { leaf: index, reason })?;
        }
        for (shape, child) in self.children.iter().zip(children) {
            if !(shape.set)(&mut group, child) {
                return Err(BuildFailure::Shape(format!(
                    "group `{}` expected a `{}`",
                    shape.member.name, shape.member.type_name
                )));
            }
        }
        Ok(Arc::new(group))
    }

    fn project(&self, parent: &(dyn Any + Send + Sync), child: usize) -> Option<AnyGroup> {
        let group = parent.downcast_ref::<G>()?;
        self.children.get(child).map(|shape| (shape.get)(group))
    }
}

/// One hop from a group to a nested group.
pub(crate) struct AccessStep<T, D> {
    shape: Arc<dyn GroupShape<T, D>>,
    child: usize,
}

impl<T, D> Clone for AccessStep<T, D> {
    fn clone(&self) -> Self {
        Self {
            shape: Arc::clone(&self.shape),
            child: self.child,
        }
    }
}

/// Follow `steps` from `root`; only reference counts are touched.
pub(crate) fn follow_steps<R, T, D>(steps: &[AccessStep<T, D>], root: &Arc<R>) -> Option<AnyGroup>
where
    R: Any + Send + Sync,
{
    let mut current: AnyGroup = root.clone();
    for step in steps {
        current = step.shape.project(&*current, step.child)?;
    }
    Some(current)
}

/// Typed accessor from the root `S` to the group `C` at one position in the tree.
pub struct GroupAccessor<S: SettingsGroup, C> {
    path: Arc<str>,
    steps: Arc<[AccessStep<S::Tier, S::DataCenter>]>,
    _types: PhantomData<fn(&S) -> Arc<C>>,
}

impl<S: SettingsGroup, C: SettingsGroup> GroupAccessor<S, C> {
    /// Dotted member path from the root; empty for the root itself.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, root: &Arc<S>) -> Option<Arc<C>> {
        follow_steps(&self.steps, root)?.downcast::<C>().ok()
    }
}

impl<S: SettingsGroup, C> Clone for GroupAccessor<S, C> {
    fn clone(&self) -> Self {
        Self {
            path: Arc::clone(&self.path),
            steps: Arc::clone(&self.steps),
            _types: PhantomData,
        }
    }
}

impl<S: SettingsGroup, C> fmt::Debug for GroupAccessor<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupAccessor")
            .field("group", &type_name::<C>())
            .field("path", &self.path)
            .finish()
    }
}

/// A group position discovered in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Dotted member path from the root
    pub path: String,
}

struct GroupNode<T, D> {
    shape: Arc<dyn GroupShape<T, D>>,
    path: String,
    children: Vec<usize>,
    leaves: Vec<usize>,
    steps: Arc<[AccessStep<T, D>]>,
}

pub(crate) struct SettingEntry<T, D> {
    pub definition: SettingDefinition<T, D>,
    pub check: ValueCheck,
}

/// The validated structure of a settings root: every group position and every leaf.
pub struct SettingsTree<S: SettingsGroup> {
    nodes: Vec<GroupNode<S::Tier, S::DataCenter>>,
    settings: Vec<SettingEntry<S::Tier, S::DataCenter>>,
    by_name: HashMap<String, usize>,
    by_type: HashMap<TypeId, Vec<usize>>,
}

impl<S: SettingsGroup> SettingsTree<S> {
    /// Walk the root's description breadth-first and validate every group and leaf.
    pub fn discover() -> Result<Self, DefinitionError> {
        let root = describe_group::<S>();
        let mut nodes = vec![GroupNode {
            shape: root,
            path: String::new(),
            children: Vec::new(),
            leaves: Vec::new(),
            steps: Arc::from(Vec::new()),
        }];
        let mut lineage: Vec<Vec<TypeId>> = vec![vec![TypeId::of::<S>()]];
        let mut queue = VecDeque::from([0usize]);

        while let Some(index) = queue.pop_front() {
            let shape = Arc::clone(&nodes[index].shape);
            let leaves = shape.leaves();
            let children = shape.children();
            check_member_names(&nodes[index].path, &*shape, &leaves, &children)?;

            for (slot, child) in children.into_iter().enumerate() {
                let path = join_path(&nodes[index].path, child.name);
                if lineage[index].contains(&child.type_id) {
                    return Err(DefinitionError::CyclicGroup {
                        path,
                        type_name: child.type_name,
                    });
                }

                let mut steps = nodes[index].steps.to_vec();
                steps.push(AccessStep {
                    shape: Arc::clone(&shape),
                    child: slot,
                });

                let mut ancestors = lineage[index].clone();
                ancestors.push(child.type_id);
                lineage.push(ancestors);

                let child_index = nodes.len();
                nodes.push(GroupNode {
                    shape: (child.describe)(),
                    path,
                    children: Vec::new(),
                    leaves: Vec::new(),
                    steps: Arc::from(steps),
                });
                nodes[index].children.push(child_index);
                queue.push_back(child_index);
            }
        }

        let mut settings = Vec::new();
        let mut by_name = HashMap::new();
        for node in nodes.iter_mut() {
            for leaf in node.shape.leaves() {
                let entry = validate_leaf(&node.path, leaf)?;
                let name = entry.definition.name.clone();
                if by_name.insert(name.clone(), settings.len()).is_some() {
                    return Err(DefinitionError::DuplicateSetting { name });
                }
                node.leaves.push(settings.len());
                settings.push(entry);
            }
        }

        let mut by_type: HashMap<TypeId, Vec<usize>> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            by_type.entry(node.shape.group_type()).or_default().push(index);
        }

        tracing::debug!(
            root = type_name::<S>(),
            groups = nodes.len(),
            settings = settings.len(),
            "Discovered settings tree"
        );

        Ok(Self {
            nodes,
            settings,
            by_name,
            by_type,
        })
    }

    /// Every nested group position in breadth-first order. The root is not listed.
    pub fn groups(&self) -> impl Iterator<Item = GroupEntry> + '_ {
        self.nodes.iter().skip(1).map(|node| GroupEntry {
            type_id: node.shape.group_type(),
            type_name: node.shape.group_type_name(),
            path: node.path.clone(),
        })
    }

    /// Accessor for the only position of `C`. `S` itself resolves to the root.
    pub fn accessor<C: SettingsGroup>(&self) -> Result<GroupAccessor<S, C>, SettingsError> {
        let node = self.node_of::<C>()?;
        Ok(self.accessor_for(node))
    }

    /// Accessor for `C` at a dotted path.
    pub fn accessor_at<C: SettingsGroup>(&self, path: &str) -> Result<GroupAccessor<S, C>, SettingsError> {
        let node = self.node_at::<C>(path)?;
        Ok(self.accessor_for(node))
    }

    /// Every leaf definition, ordered by discovery.
    pub fn settings(&self) -> impl Iterator<Item = &SettingDefinition<S::Tier, S::DataCenter>> {
        self.settings.iter().map(|entry| &entry.definition)
    }

    pub fn setting(&self, name: &str) -> Option<&SettingDefinition<S::Tier, S::DataCenter>> {
        self.entry(name).map(|entry| &entry.definition)
    }

    pub fn setting_count(&self) -> usize {
        self.settings.len()
    }

    pub(crate) fn group_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn entries(&self) -> &[SettingEntry<S::Tier, S::DataCenter>] {
        &self.settings
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&SettingEntry<S::Tier, S::DataCenter>> {
        self.by_name.get(name).map(|&index| &self.settings[index])
    }

    pub(crate) fn node_of<C: 'static>(&self) -> Result<usize, SettingsError> {
        match self.by_type.get(&TypeId::of::<C>()).map(Vec::as_slice) {
            Some([node]) => Ok(*node),
            Some(nodes) if nodes.len() > 1 => Err(SettingsError::AmbiguousGroup {
                type_name: type_name::<C>(),
                paths: nodes
                    .iter()
                    .map(|&n| self.nodes[n].path.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            _ => Err(SettingsError::UnknownGroup {
                type_name: type_name::<C>(),
            }),
        }
    }

    pub(crate) fn node_at<C: 'static>(&self, path: &str) -> Result<usize, SettingsError> {
        self.by_type
            .get(&TypeId::of::<C>())
            .and_then(|nodes| nodes.iter().copied().find(|&n| self.nodes[n].path == path))
            .ok_or_else(|| SettingsError::UnknownGroupPath {
                type_name: type_name::<C>(),
                path: path.to_string(),
            })
    }

    /// Resolve the group at `node` inside a materialized root.
    pub(crate) fn project(&self, node: usize, root: &Arc<S>) -> Option<AnyGroup> {
        follow_steps(&self.nodes.get(node)?.steps, root)
    }

    /// Build a root from the text of every setting (indexed like [`Self::entries`]).
    ///
    /// Groups are built bottom-up in reverse breadth-first order so children exist
    /// before their parents.
    pub(crate) fn build_root(&self, values: &[&str]) -> Result<Arc<S>, SettingsError> {
        let mut built: Vec<Option<AnyGroup>> = vec![None; self.nodes.len()];

        for index in (0..self.nodes.len()).rev() {
            let node = &self.nodes[index];
            let leaf_values: Vec<&str> = node.leaves.iter().map(|&leaf| values[leaf]).collect();
            let children = node
                .children
                .iter()
                .map(|&child| built[child].take())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| SettingsError::internal(format!("group `{}` built out of order", node.path)))?;

            let group = node.shape.build(&leaf_values, children).map_err(|failure| match failure {
                BuildFailure::Leaf { leaf, reason } => {
                    let setting = node.leaves[leaf];
                    SettingsError::InvalidValue {
                        name: self.settings[setting].definition.name.clone(),
                        value: values[setting].to_string(),
                        reason,
                    }
                }
                BuildFailure::Shape(message) => SettingsError::internal(message),
            })?;
            built[index] = Some(group);
        }

        built
            .first_mut()
            .and_then(Option::take)
            .and_then(|root| root.downcast::<S>().ok())
            .ok_or_else(|| SettingsError::internal(format!("root `{}` was not built", type_name::<S>())))
    }

    fn accessor_for<C>(&self, node: usize) -> GroupAccessor<S, C> {
        let node = &self.nodes[node];
        GroupAccessor {
            path: Arc::from(node.path.as_str()),
            steps: Arc::clone(&node.steps),
            _types: PhantomData,
        }
    }
}

impl<S: SettingsGroup> fmt::Debug for SettingsTree<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsTree")
            .field("root", &type_name::<S>())
            .field("groups", &self.nodes.len())
            .field("settings", &self.settings.len())
            .finish()
    }
}

fn join_path(parent: &str, member: &str) -> String {
    if parent.is_empty() {
        member.to_string()
    } else {
        format!("{}.{}", parent, member)
    }
}

fn check_member_names<T, D>(
    path: &str,
    shape: &dyn GroupShape<T, D>,
    leaves: &[LeafDefinition<T, D>],
    children: &[ChildMember<T, D>],
) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    let names = leaves.iter().map(|l| l.name).chain(children.iter().map(|c| c.name));
    for name in names {
        if !seen.insert(name) {
            let group = if path.is_empty() {
                shape.group_type_name().to_string()
            } else {
                path.to_string()
            };
            return Err(DefinitionError::DuplicateMember {
                group,
                member: name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_leaf<T: Dimension, D: Dimension>(
    path: &str,
    leaf: LeafDefinition<T, D>,
) -> Result<SettingEntry<T, D>, DefinitionError> {
    let name = join_path(path, leaf.name);

    if let Some(reason) = leaf.constraint_error {
        return Err(DefinitionError::InvalidConstraint { name, reason });
    }

    let invalid = |value: &str, reason: String| DefinitionError::InvalidDefault {
        name: name.clone(),
        value: value.to_string(),
        reason,
    };
    (leaf.check)(&leaf.default_value).map_err(|reason| invalid(&leaf.default_value, reason))?;

    let mut coordinates = HashSet::new();
    for rule in &leaf.rules {
        if !coordinates.insert((rule.tier, rule.data_center)) {
            return Err(DefinitionError::DuplicateRule {
                name: name.clone(),
                coordinate: rule.describe_coordinate(),
            });
        }
        (leaf.check)(&rule.value).map_err(|reason| invalid(&rule.value, reason))?;
    }

    Ok(SettingEntry {
        definition: SettingDefinition {
            name,
            kind: leaf.kind,
            description: leaf.description,
            default_value: leaf.default_value,
            allow_overrides: leaf.allow_overrides,
            tiered_defaults: leaf.rules,
        },
        check: leaf.check,
    })
}
