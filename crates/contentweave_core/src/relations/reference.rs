//! References between content items.
//!
//! # Responsibility
//! - Hold a pointer-by-identity (`Reference`) whose summary resolves lazily.
//! - Restrict references to assignable types (`TypedReference`).
//! - Run reverse lookups through a pluggable getter or a predicate builder.
//!
//! # Invariants
//! - The cached summary is dropped whenever the id or data type changes.
//! - A fixed-type reference serializes as `<id>:`.

use super::ReferenceError;
use crate::model::content::{Content, Summary};
use crate::model::item_id::{ItemId, ItemVersionedId, RawId};
use crate::model::property_path::PropertyPath;
use crate::model::version::ItemVersion;
use crate::model::TypeName;
use crate::repo::ContainerStore;
use crate::schema::content_type::ContentTypeRegistry;
use crate::service::collator::{CollateResult, ContentCollator};
use crate::service::version_context::{VersionContext, VersioningMode};
use log::info;
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Resolves item summaries for references.
pub trait SummaryResolver {
    fn resolve_summary(&self, ctx: &VersionContext, id: &ItemId) -> CollateResult<Option<Summary>>;
}

impl<S: ContainerStore> SummaryResolver for ContentCollator<S> {
    fn resolve_summary(&self, ctx: &VersionContext, id: &ItemId) -> CollateResult<Option<Summary>> {
        Ok(self
            .get_summaries_by_ids(ctx, std::slice::from_ref(id))?
            .into_iter()
            .next())
    }
}

/// Custom reverse-reference lookup, e.g. backed by an index table.
pub trait ReferenceGetter {
    fn referencing_items(
        &self,
        target: &ItemVersionedId,
        types: &[TypeName],
        property: &PropertyPath,
    ) -> Result<Vec<Summary>, ReferenceError>;
}

/// Filter over collated content used by the default reverse lookup.
pub type ContentFilter = Box<dyn Fn(&Content) -> bool>;

/// Builds the filter "reference at `property` points at `target`".
pub trait PredicateBuilder {
    fn build(&self, property: &PropertyPath, target: &ItemId) -> ContentFilter;
}

/// Default predicate: the value at the property path is a reference, in
/// object or serialized string form, whose item id equals the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEqualityPredicate;

impl PredicateBuilder for ReferenceEqualityPredicate {
    fn build(&self, property: &PropertyPath, target: &ItemId) -> ContentFilter {
        let property = property.clone();
        let target = target.clone();
        Box::new(move |content: &Content| {
            property
                .get(&content.data)
                .and_then(Reference::from_value)
                .and_then(|reference| reference.item_id())
                .is_some_and(|id| id == target)
        })
    }
}

/// Strategy for `get_references_from`.
#[derive(Clone)]
pub enum ReferenceLookup {
    Getter(Arc<dyn ReferenceGetter>),
    Predicate(Arc<dyn PredicateBuilder>),
}

impl Default for ReferenceLookup {
    fn default() -> Self {
        Self::Predicate(Arc::new(ReferenceEqualityPredicate))
    }
}

/// Items of `referencing_type` (a type or an interface) whose `property`
/// references `target`, as summaries in the target's version.
pub fn get_references_from<S: ContainerStore>(
    collator: &ContentCollator<S>,
    ctx: &mut VersionContext,
    target: &ItemVersionedId,
    referencing_type: &str,
    property: &str,
    lookup: &ReferenceLookup,
) -> Result<Vec<Summary>, ReferenceError> {
    let registry = collator.registry();
    let types = registry.assignable_types(referencing_type);
    if types.is_empty() {
        return Err(ReferenceError::InvalidArgument(format!(
            "no content type is assignable to `{referencing_type}`"
        )));
    }
    let property = PropertyPath::parse(property)
        .map_err(|err| ReferenceError::InvalidArgument(err.to_string()))?;
    for name in &types {
        let declared = registry
            .get(name)
            .is_some_and(|def| def.is_reference_field(&property));
        if !declared {
            return Err(ReferenceError::InvalidArgument(format!(
                "property `{property}` of {name} is not a reference field"
            )));
        }
    }

    let summaries = match lookup {
        ReferenceLookup::Getter(getter) => getter.referencing_items(target, &types, &property)?,
        ReferenceLookup::Predicate(builder) => {
            let filter = builder.build(&property, &target.item_id);
            ctx.with_scope(VersioningMode::Specific, target.version.clone(), |scoped| {
                collator.query_summaries(scoped, &types, |content| filter(content))
            })?
        }
    };
    info!(
        "event=references_from module=relations status=ok target={} property={property} found={}",
        target.item_id,
        summaries.len()
    );
    Ok(summaries)
}

/// Untyped reference to another content item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip)]
    extra: Option<String>,
    #[serde(skip)]
    summary: OnceCell<Option<Summary>>,
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type && self.id == other.id && self.extra == other.extra
    }
}

impl Reference {
    pub fn new(data_type: &str, id: &str) -> Self {
        Self {
            data_type: non_blank(data_type),
            id: non_blank(id),
            ..Self::default()
        }
    }

    pub fn from_item_id(item_id: &ItemId) -> Self {
        Self::new(item_id.content_type().as_str(), &item_id.id().to_string())
    }

    /// Reads a reference stored in content, as an object or a serialized string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(serialized) => {
                let mut reference = Self::default();
                reference.set_serialized_value(serialized).ok()?;
                Some(reference)
            }
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    pub fn extra(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    pub fn set_id(&mut self, id: Option<&str>) {
        self.id = id.and_then(non_blank);
        self.summary = OnceCell::new();
    }

    pub fn set_data_type(&mut self, data_type: Option<&str>) {
        self.data_type = data_type.and_then(non_blank);
        self.summary = OnceCell::new();
    }

    /// Item id, or `None` while either part is missing.
    pub fn item_id(&self) -> Option<ItemId> {
        let data_type = TypeName::new(self.data_type.as_deref()?).ok()?;
        let id = RawId::parse(self.id.as_deref()?)?;
        ItemId::new(data_type, id).ok()
    }

    /// `<id>:<Type>` followed by the extra payload after a space, or an
    /// empty string for an empty reference.
    pub fn serialized_value(&self) -> String {
        match (self.item_id(), self.extra.as_deref()) {
            (None, _) => String::new(),
            (Some(item_id), Some(extra)) => format!("{item_id} {extra}"),
            (Some(item_id), None) => item_id.to_string(),
        }
    }

    pub fn set_serialized_value(&mut self, value: &str) -> Result<(), ReferenceError> {
        let (stripped, extra) = value.split_once(' ').unwrap_or((value, ""));
        self.summary = OnceCell::new();
        self.extra = non_blank(extra);
        if stripped.trim().is_empty() {
            self.id = None;
            self.data_type = None;
            return Ok(());
        }
        let item_id: ItemId = stripped.parse()?;
        self.id = Some(item_id.id().to_string());
        self.data_type = Some(item_id.content_type().to_string());
        Ok(())
    }

    /// Summary of the referenced item, resolved once and cached.
    pub fn summary(
        &self,
        resolver: &dyn SummaryResolver,
        ctx: &VersionContext,
    ) -> Result<Option<&Summary>, ReferenceError> {
        let Some(item_id) = self.item_id() else {
            return Ok(None);
        };
        let cached = self
            .summary
            .get_or_try_init(|| resolver.resolve_summary(ctx, &item_id))?;
        Ok(cached.as_ref())
    }

    /// Whether the reference points at nothing that resolves.
    pub fn is_empty(
        &self,
        resolver: &dyn SummaryResolver,
        ctx: &VersionContext,
    ) -> Result<bool, ReferenceError> {
        Ok(self.summary(resolver, ctx)?.is_none())
    }

    /// Title of the referenced item, empty when the reference is empty.
    pub fn title(
        &self,
        resolver: &dyn SummaryResolver,
        ctx: &VersionContext,
    ) -> Result<String, ReferenceError> {
        Ok(self
            .summary(resolver, ctx)?
            .map(|summary| summary.title.clone())
            .unwrap_or_default())
    }

    /// Items whose `property` references this item in `version`.
    pub fn get_referencing_items<S: ContainerStore>(
        &self,
        collator: &ContentCollator<S>,
        ctx: &mut VersionContext,
        version: ItemVersion,
        referencing_type: &str,
        property: &str,
        lookup: &ReferenceLookup,
    ) -> Result<Vec<Summary>, ReferenceError> {
        let Some(item_id) = self.item_id() else {
            return Ok(Vec::new());
        };
        let target = ItemVersionedId::new(item_id, version);
        get_references_from(collator, ctx, &target, referencing_type, property, lookup)
    }
}

/// Reference restricted to the content types assignable to a target type or
/// interface.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedReference {
    target: String,
    fixed: bool,
    assignable: Vec<TypeName>,
    inner: Reference,
}

impl TypedReference {
    pub fn new(registry: &ContentTypeRegistry, target: &str) -> Result<Self, ReferenceError> {
        let target = target.trim().to_string();
        let assignable = registry.assignable_types(&target);
        if assignable.is_empty() {
            return Err(ReferenceError::InvalidArgument(format!(
                "no content type is assignable to `{target}`"
            )));
        }
        let fixed = registry.get(&TypeName::from(target.as_str())).is_some();
        let mut inner = Reference::default();
        if fixed {
            inner.set_data_type(Some(&target));
        }
        Ok(Self {
            target,
            fixed,
            assignable,
            inner,
        })
    }

    /// Whether only one content type can be referenced.
    pub fn fixed_data_type(&self) -> bool {
        self.fixed
    }

    pub fn assignable_types(&self) -> &[TypeName] {
        &self.assignable
    }

    pub fn reference(&self) -> &Reference {
        &self.inner
    }

    pub fn data_type(&self) -> Option<&str> {
        if self.fixed {
            Some(self.target.as_str())
        } else {
            self.inner.data_type()
        }
    }

    pub fn set_data_type(&mut self, data_type: Option<&str>) -> Result<(), ReferenceError> {
        if let Some(name) = data_type.and_then(non_blank) {
            if !self.assignable.iter().any(|t| t.as_str() == name) {
                return Err(ReferenceError::InvalidArgument(format!(
                    "reference to `{}` cannot have data type `{name}`",
                    self.target
                )));
            }
        }
        if !self.fixed {
            self.inner.set_data_type(data_type);
        }
        Ok(())
    }

    pub fn set_id(&mut self, id: Option<&str>) {
        self.inner.set_id(id);
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.inner.item_id()
    }

    pub fn serialized_value(&self) -> String {
        if self.fixed {
            return format!("{}:", self.inner.id().unwrap_or_default());
        }
        self.inner.serialized_value()
    }

    pub fn set_serialized_value(&mut self, value: &str) -> Result<(), ReferenceError> {
        if self.fixed {
            if let Some((id, _)) = value.split_once(':') {
                self.inner.set_id(Some(id));
                return Ok(());
            }
        }
        let mut parsed = Reference::default();
        parsed.set_serialized_value(value)?;
        self.set_data_type(parsed.data_type())?;
        self.inner = parsed;
        if self.fixed {
            self.inner.set_data_type(Some(&self.target));
        }
        Ok(())
    }

    pub fn summary(
        &self,
        resolver: &dyn SummaryResolver,
        ctx: &VersionContext,
    ) -> Result<Option<&Summary>, ReferenceError> {
        self.inner.summary(resolver, ctx)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Reference, SummaryResolver, TypedReference};
    use crate::model::content::Summary;
    use crate::model::item_id::ItemId;
    use crate::model::version::ItemVersion;
    use crate::schema::content_type::{ContentTypeDef, ContentTypeRegistry};
    use crate::service::collator::CollateResult;
    use crate::service::version_context::VersionContext;
    use serde_json::json;
    use std::cell::Cell;

    struct CountingResolver {
        calls: Cell<usize>,
    }

    impl SummaryResolver for CountingResolver {
        fn resolve_summary(
            &self,
            _ctx: &VersionContext,
            id: &ItemId,
        ) -> CollateResult<Option<Summary>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Some(Summary {
                item_id: id.clone(),
                path: "/x".to_string(),
                version: ItemVersion::new(),
                title: format!("title {}", self.calls.get()),
            }))
        }
    }

    fn registry() -> ContentTypeRegistry {
        ContentTypeRegistry::new()
            .with(ContentTypeDef::new("Shop.Product").implements("Linkable"))
            .and_then(|r| r.with(ContentTypeDef::new("Shop.Page").implements("Linkable")))
            .unwrap()
    }

    #[test]
    fn serialized_value_carries_extra_payload() {
        let mut reference = Reference::default();
        reference
            .set_serialized_value("42:Shop.Product featured")
            .unwrap();
        assert_eq!(reference.id(), Some("42"));
        assert_eq!(reference.data_type(), Some("Shop.Product"));
        assert_eq!(reference.extra(), Some("featured"));
        assert_eq!(reference.serialized_value(), "42:Shop.Product featured");

        reference.set_serialized_value("").unwrap();
        assert!(reference.item_id().is_none());
        assert_eq!(reference.serialized_value(), "");
        assert!(reference.set_serialized_value("bad").is_err());
    }

    #[test]
    fn summary_is_cached_until_id_changes() {
        let resolver = CountingResolver { calls: Cell::new(0) };
        let ctx = VersionContext::default();
        let mut reference = Reference::new("Shop.Product", "7");

        assert_eq!(reference.title(&resolver, &ctx).unwrap(), "title 1");
        assert_eq!(reference.title(&resolver, &ctx).unwrap(), "title 1");
        assert_eq!(resolver.calls.get(), 1);

        reference.set_id(Some("8"));
        assert_eq!(reference.title(&resolver, &ctx).unwrap(), "title 2");
        assert!(!reference.is_empty(&resolver, &ctx).unwrap());
    }

    #[test]
    fn empty_reference_never_resolves() {
        let resolver = CountingResolver { calls: Cell::new(0) };
        let ctx = VersionContext::default();
        let reference = Reference::default();
        assert!(reference.is_empty(&resolver, &ctx).unwrap());
        assert_eq!(reference.title(&resolver, &ctx).unwrap(), "");
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn reference_reads_object_and_string_forms() {
        let object = Reference::from_value(&json!({"DataType": "Shop.Page", "Id": "3"})).unwrap();
        let string = Reference::from_value(&json!("3:Shop.Page")).unwrap();
        assert_eq!(object.item_id(), string.item_id());
        assert!(Reference::from_value(&json!(3)).is_none());
        assert_eq!(
            serde_json::to_value(&object).unwrap(),
            json!({"DataType": "Shop.Page", "Id": "3"})
        );
    }

    #[test]
    fn fixed_type_reference_serializes_id_only() {
        let registry = registry();
        let mut reference = TypedReference::new(&registry, "Shop.Product").unwrap();
        assert!(reference.fixed_data_type());
        reference.set_serialized_value("12:").unwrap();
        assert_eq!(reference.serialized_value(), "12:");
        assert_eq!(reference.data_type(), Some("Shop.Product"));
        assert_eq!(reference.item_id().unwrap().to_string(), "12:Shop.Product");
    }

    #[test]
    fn interface_reference_rejects_unassignable_types() {
        let registry = registry();
        let mut reference = TypedReference::new(&registry, "Linkable").unwrap();
        assert!(!reference.fixed_data_type());
        assert_eq!(reference.assignable_types().len(), 2);
        reference.set_serialized_value("5:Shop.Page").unwrap();
        assert_eq!(reference.serialized_value(), "5:Shop.Page");
        assert!(reference.set_data_type(Some("Blog.Post")).is_err());
        assert!(reference.set_serialized_value("5:Blog.Post").is_err());
        assert!(TypedReference::new(&registry, "Missing").is_err());
    }
}
